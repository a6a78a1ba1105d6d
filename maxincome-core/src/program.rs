//! The solver boundary.
//!
//! [`Program`] is the in-memory optimization model: decision variables, a
//! maximized objective expression, and linear constraints. Construction is a
//! pure sequence of additions; the single blocking call is [`Program::solve`],
//! which hands the model to the backing MIP solver and returns a [`Solved`]
//! view for reading variable values back out.
//!
//! Variable definitions and constraints are also recorded on the way in, so
//! the assembled model can be inspected (bounds, coefficients, relation
//! kinds) without reaching into solver internals.

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver, variable,
};
use thiserror::Error;
use tracing::debug;

/// Constraint relation kinds supported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Continuous,
    Binary,
}

/// Recorded definition of one decision variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableDef {
    pub kind: VariableKind,
    pub lower: f64,
    pub upper: f64,
}

/// A recorded constraint in normalized form: `lhs relation rhs`, with a
/// constant right-hand side.
#[derive(Clone)]
pub struct ProgramConstraint {
    pub lhs: Expression,
    pub relation: Relation,
    pub rhs: f64,
}

/// Errors reported by the solve step.
///
/// Infeasibility is a property of the input data and unboundedness a
/// modeling defect; neither is retried. [`SolveError::NoSolution`] is the
/// "no solution found, try again with more effort" status, surfaced upward
/// without any retry decision here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("the model has no feasible solution")]
    Infeasible,

    #[error("the objective is unbounded")]
    Unbounded,

    #[error("no solution was found: {0}")]
    NoSolution(String),
}

/// An optimization model under construction, exclusively owned until solved.
pub struct Program {
    vars: ProblemVariables,
    defs: Vec<VariableDef>,
    constraints: Vec<ProgramConstraint>,
    objective: Expression,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Self {
            vars: ProblemVariables::new(),
            defs: Vec::new(),
            constraints: Vec::new(),
            objective: Expression::from(0),
        }
    }

    /// Register a continuous decision variable with bounds `[lower, upper]`.
    pub fn add_continuous(&mut self, lower: f64, upper: f64) -> Variable {
        let var = self.vars.add(variable().min(lower).max(upper));
        self.defs.push(VariableDef {
            kind: VariableKind::Continuous,
            lower,
            upper,
        });
        debug!(lower, upper, "added continuous variable");
        var
    }

    /// Register a binary decision variable (bounds fixed at `[0, 1]`).
    pub fn add_binary(&mut self) -> Variable {
        let var = self.vars.add(variable().binary());
        self.defs.push(VariableDef {
            kind: VariableKind::Binary,
            lower: 0.0,
            upper: 1.0,
        });
        debug!("added binary variable");
        var
    }

    /// Add a linear constraint `lhs relation rhs`.
    pub fn add_constraint(&mut self, lhs: Expression, relation: Relation, rhs: f64) {
        debug!(?relation, rhs, "added constraint");
        self.constraints.push(ProgramConstraint { lhs, relation, rhs });
    }

    /// Accumulate a term into the (maximized) objective expression.
    pub fn add_to_objective(&mut self, term: Expression) {
        self.objective += term;
    }

    pub fn objective(&self) -> &Expression {
        &self.objective
    }

    pub fn constraints(&self) -> &[ProgramConstraint] {
        &self.constraints
    }

    pub fn variable_defs(&self) -> &[VariableDef] {
        &self.defs
    }

    pub fn num_variables(&self) -> usize {
        self.defs.len()
    }

    /// Hand the model to the solver. Blocking, single-shot; the model is
    /// consumed whatever the outcome.
    pub fn solve(self) -> Result<Solved, SolveError> {
        let Program {
            vars,
            defs: _,
            constraints,
            objective,
        } = self;

        let mut model = vars.maximise(objective).using(default_solver);
        for c in constraints {
            let built = match c.relation {
                Relation::LessEq => constraint::leq(c.lhs, c.rhs),
                Relation::Eq => constraint::eq(c.lhs, c.rhs),
            };
            model = model.with(built);
        }

        match model.solve() {
            Ok(solution) => Ok(Solved {
                solution: Box::new(solution),
            }),
            Err(ResolutionError::Infeasible) => Err(SolveError::Infeasible),
            Err(ResolutionError::Unbounded) => Err(SolveError::Unbounded),
            Err(other) => Err(SolveError::NoSolution(other.to_string())),
        }
    }
}

/// A solved model. Only exists after an optimal solve, so reading values is
/// always valid.
pub struct Solved {
    solution: Box<dyn Solution>,
}

impl Solved {
    pub fn value(&self, var: Variable) -> f64 {
        self.solution.value(var)
    }
}

impl std::fmt::Debug for Solved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solved").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use good_lp::IntoAffineExpression;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn records_variable_definitions_in_creation_order() {
        let mut program = Program::new();
        program.add_continuous(0.0, 6000.0);
        program.add_binary();

        assert_eq!(
            program.variable_defs(),
            &[
                VariableDef {
                    kind: VariableKind::Continuous,
                    lower: 0.0,
                    upper: 6000.0,
                },
                VariableDef {
                    kind: VariableKind::Binary,
                    lower: 0.0,
                    upper: 1.0,
                },
            ]
        );
    }

    #[test]
    fn solves_a_trivial_bounded_maximization() {
        let mut program = Program::new();
        let x = program.add_continuous(0.0, 10.0);
        program.add_to_objective(x * 2.0);
        program.add_constraint(Expression::from(x), Relation::LessEq, 5.0);

        let solved = program.solve().unwrap();

        assert!((solved.value(x) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn equality_constraints_pin_the_solution() {
        let mut program = Program::new();
        let x = program.add_continuous(0.0, 10.0);
        let y = program.add_continuous(0.0, 10.0);
        program.add_to_objective(Expression::from(x) + y * 0.5);
        program.add_constraint(Expression::from(x) + y, Relation::Eq, 4.0);

        let solved = program.solve().unwrap();

        assert!((solved.value(x) - 4.0).abs() < 1e-6);
        assert!(solved.value(y).abs() < 1e-6);
    }

    #[test]
    fn infeasible_model_is_reported_as_such() {
        let mut program = Program::new();
        let x = program.add_continuous(0.0, 10.0);
        program.add_to_objective(Expression::from(x));
        program.add_constraint(Expression::from(x), Relation::Eq, 20.0);

        assert_eq!(program.solve().unwrap_err(), SolveError::Infeasible);
    }

    #[test]
    fn unbounded_objective_is_reported_as_such() {
        let mut program = Program::new();
        let x = program.add_continuous(0.0, f64::INFINITY);
        program.add_to_objective(Expression::from(x));

        assert_eq!(program.solve().unwrap_err(), SolveError::Unbounded);
    }

    #[test]
    fn binary_variables_take_integer_values() {
        // maximize x + 10z with x <= 5z: z must flip to 1 for x to move.
        let mut program = Program::new();
        let x = program.add_continuous(0.0, 5.0);
        let z = program.add_binary();
        program.add_to_objective(Expression::from(x) + z * 10.0);
        program.add_constraint(Expression::from(x) - z * 5.0, Relation::LessEq, 0.0);

        let solved = program.solve().unwrap();

        assert!((solved.value(z) - 1.0).abs() < 1e-6);
        assert!((solved.value(x) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn objective_accumulates_coefficients_per_variable() {
        let mut program = Program::new();
        let x = program.add_continuous(0.0, 1.0);
        program.add_to_objective(x * 0.85);
        program.add_to_objective(x * 0.10);

        let coefficients: std::collections::HashMap<_, _> =
            program.objective().linear_coefficients().collect();

        assert!((coefficients[&x] - 0.95).abs() < 1e-12);
    }
}

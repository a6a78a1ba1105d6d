use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use maxincome_core::{PlanInput, PlanModel, PlanSolution, PlannerOptions, ScheduleSet, SolveError};
use maxincome_data::{PlanLoader, ScheduleLoader};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Optimize the allocation of multi-year income across progressive tax
/// brackets, maximizing total after-tax income discounted to present value.
///
/// With no plan arguments, runs the built-in sample: years 2012-2014 with
/// revenues 30000/100000/40000, a 5.5% interest rate, and 2013 as the
/// reference year.
#[derive(Parser, Debug)]
#[command(name = "maxincome")]
#[command(version, about, long_about = None)]
struct Args {
    /// Plan years as YEAR=REVENUE pairs, e.g. --year 2013=100000 (repeatable)
    #[arg(short, long = "year", value_name = "YEAR=REVENUE", value_parser = parse_year_revenue)]
    years: Vec<(i32, Decimal)>,

    /// CSV file with year,revenue columns (alternative to --year)
    #[arg(long, value_name = "FILE", conflicts_with = "years")]
    plan_csv: Option<PathBuf>,

    /// Annual interest rate used to discount future income
    #[arg(short, long, default_value = "0.055")]
    interest_rate: Decimal,

    /// Year from which discounting offsets are measured
    /// (defaults to the first plan year)
    #[arg(short, long)]
    reference_year: Option<i32>,

    /// CSV of bracket schedules (effective_year,lower,upper,rate);
    /// defaults to the built-in historical tables
    #[arg(short, long, value_name = "FILE")]
    brackets: Option<PathBuf>,

    /// Whether to force brackets to fill in income order
    #[arg(long, value_enum, default_value_t = OrderingMode::Auto)]
    enforce_ordering: OrderingMode,

    /// Print the solution as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderingMode {
    /// Enforce only when a schedule has non-monotonic marginal rates
    Auto,
    On,
    Off,
}

impl OrderingMode {
    fn as_option(self) -> Option<bool> {
        match self {
            OrderingMode::Auto => None,
            OrderingMode::On => Some(true),
            OrderingMode::Off => Some(false),
        }
    }
}

fn parse_year_revenue(raw: &str) -> Result<(i32, Decimal), String> {
    let (year, revenue) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected YEAR=REVENUE, got '{raw}'"))?;
    let year = year
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid year '{year}': {e}"))?;
    let revenue = revenue
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid revenue '{revenue}': {e}"))?;
    Ok((year, revenue))
}

fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let (pairs, default_reference) = plan_pairs(&args)?;
    let reference_year = args
        .reference_year
        .or(default_reference)
        .or_else(|| pairs.first().map(|(year, _)| *year))
        .context("the plan contains no years")?;

    let schedules = match &args.brackets {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open: {}", path.display()))?;
            ScheduleLoader::load(file)
                .with_context(|| format!("Failed to load bracket schedules: {}", path.display()))?
        }
        None => ScheduleSet::australian_historical(),
    };

    let (years, revenues) = pairs.into_iter().unzip();
    let input = PlanInput {
        years,
        revenues,
        interest_rate: args.interest_rate,
        reference_year,
    };
    let options = PlannerOptions {
        enforce_bracket_ordering: args.enforce_ordering.as_option(),
        ..PlannerOptions::default()
    };

    let model = PlanModel::build(&schedules, &input, &options)
        .context("Failed to build the allocation model")?;

    match model.solve() {
        Ok(solution) => {
            println!("Optimal solution exists and found.");
            report(&solution, args.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(SolveError::Infeasible) => {
            println!("The problem has no feasible solution.");
            Ok(ExitCode::FAILURE)
        }
        Err(SolveError::Unbounded) => {
            println!("The objective is unbounded.");
            Ok(ExitCode::FAILURE)
        }
        Err(SolveError::NoSolution(reason)) => {
            println!("Feasible solution hasn't been found (but may exist): {reason}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Resolve the plan from arguments, falling back to the built-in sample.
/// Returns the (year, revenue) pairs and, for the sample, its reference year.
fn plan_pairs(args: &Args) -> Result<(Vec<(i32, Decimal)>, Option<i32>)> {
    if let Some(path) = &args.plan_csv {
        let file =
            File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
        let records = PlanLoader::parse(file)
            .with_context(|| format!("Failed to parse plan CSV: {}", path.display()))?;
        let pairs = records.into_iter().map(|r| (r.year, r.revenue)).collect();
        return Ok((pairs, None));
    }

    if !args.years.is_empty() {
        return Ok((args.years.clone(), None));
    }

    info!("no plan given; using the built-in sample");
    let sample = vec![
        (2012, Decimal::from(30_000)),
        (2013, Decimal::from(100_000)),
        (2014, Decimal::from(40_000)),
    ];
    Ok((sample, Some(2013)))
}

fn report(solution: &PlanSolution, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(solution).context("Failed to render JSON output")?;
        println!("{rendered}");
        return Ok(());
    }

    for year in &solution.years {
        println!("year {}:", year.calendar_year);
        for (index, bracket) in year.brackets.iter().enumerate() {
            println!("  bracket {} income: {}", index + 1, bracket.income);
        }
        println!("  total income: {}", year.total_income);
        println!();
    }
    println!("total income: {}", solution.total_income);
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parses_year_revenue_pairs() {
        assert_eq!(
            parse_year_revenue("2013=100000"),
            Ok((2013, dec!(100000)))
        );
        assert_eq!(
            parse_year_revenue(" 2014 = 40000.50 "),
            Ok((2014, dec!(40000.50)))
        );
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(parse_year_revenue("2013").is_err());
        assert!(parse_year_revenue("year=100").is_err());
        assert!(parse_year_revenue("2013=lots").is_err());
    }

    #[test]
    fn args_parse_the_sample_invocation() {
        let args = Args::parse_from([
            "maxincome",
            "--year",
            "2012=30000",
            "--year",
            "2013=100000",
            "--interest-rate",
            "0.055",
            "--reference-year",
            "2013",
        ]);

        assert_eq!(args.years.len(), 2);
        assert_eq!(args.interest_rate, dec!(0.055));
        assert_eq!(args.reference_year, Some(2013));
    }
}

//! CSV loading of bracket schedules and income plans.
//!
//! Bracket tables are data, not code: any future schedule ships as a CSV
//! instead of an embedded conditional. The plan CSV is the year/revenue
//! input the optimizer runs over.

use std::collections::BTreeMap;
use std::io::Read;

use maxincome_core::{BracketSchedule, ScheduleError, ScheduleSet, TaxBracket};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading CSV data.
#[derive(Debug, Error)]
pub enum ScheduleLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error("No records found in input")]
    Empty,
}

impl From<csv::Error> for ScheduleLoaderError {
    fn from(err: csv::Error) -> Self {
        ScheduleLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from a bracket schedule CSV file.
///
/// Columns:
/// - `effective_year`: first calendar year the schedule applies to
/// - `lower`: lower income bound of the bracket
/// - `upper`: upper income bound (empty for an unbounded top bracket)
/// - `rate`: marginal tax rate as a decimal (e.g. 0.325 for 32.5%)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BracketScheduleRecord {
    pub effective_year: i32,
    pub lower: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Loader for bracket schedule CSV data.
pub struct ScheduleLoader;

impl ScheduleLoader {
    /// Parse bracket schedule records from a CSV reader.
    ///
    /// The reader can be any type that implements `Read`, such as a file or
    /// a string slice.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BracketScheduleRecord>, ScheduleLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BracketScheduleRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Group parsed records by effective year and validate each group into
    /// a [`BracketSchedule`], producing a complete [`ScheduleSet`].
    ///
    /// Within a group, brackets keep their file order; contiguity and rate
    /// range are checked by the schedule constructor.
    pub fn build_set(
        records: Vec<BracketScheduleRecord>,
    ) -> Result<ScheduleSet, ScheduleLoaderError> {
        if records.is_empty() {
            return Err(ScheduleLoaderError::Empty);
        }

        let mut grouped: BTreeMap<i32, Vec<TaxBracket>> = BTreeMap::new();
        for record in records {
            grouped
                .entry(record.effective_year)
                .or_default()
                .push(TaxBracket::new(record.lower, record.upper, record.rate));
        }

        let mut entries = Vec::with_capacity(grouped.len());
        for (effective_year, brackets) in grouped {
            entries.push((effective_year, BracketSchedule::new(brackets)?));
        }

        Ok(ScheduleSet::new(entries)?)
    }

    /// Parse and validate in one step.
    pub fn load<R: Read>(reader: R) -> Result<ScheduleSet, ScheduleLoaderError> {
        Self::build_set(Self::parse(reader)?)
    }
}

/// A single record from a plan CSV file: `year,revenue`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PlanRecord {
    pub year: i32,
    pub revenue: Decimal,
}

/// Loader for year/revenue plan CSV data.
pub struct PlanLoader;

impl PlanLoader {
    pub fn parse<R: Read>(reader: R) -> Result<Vec<PlanRecord>, ScheduleLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: PlanRecord = result?;
            records.push(record);
        }

        if records.is_empty() {
            return Err(ScheduleLoaderError::Empty);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    const HISTORICAL_CSV: &str = "\
effective_year,lower,upper,rate
1900,0,6000,0
1900,6000,37000,0.15
1900,37000,80000,0.30
1900,80000,180000,0.37
1900,180000,,0.45
2013,0,18200,0
2013,18200,37000,0.19
2013,37000,80000,0.325
2013,80000,180000,0.37
2013,180000,,0.45
";

    #[test]
    fn parses_records_with_empty_upper_as_unbounded() {
        let records = ScheduleLoader::parse(HISTORICAL_CSV.as_bytes()).unwrap();

        assert_eq!(records.len(), 10);
        assert_eq!(
            records[4],
            BracketScheduleRecord {
                effective_year: 1900,
                lower: dec!(180000),
                upper: None,
                rate: dec!(0.45),
            }
        );
    }

    #[test]
    fn builds_a_schedule_set_grouped_by_effective_year() {
        let set = ScheduleLoader::load(HISTORICAL_CSV.as_bytes()).unwrap();

        assert_eq!(set.schedule_for(2012).brackets()[0].upper, Some(dec!(6000)));
        assert_eq!(
            set.schedule_for(2013).brackets()[0].upper,
            Some(dec!(18200))
        );
        assert_eq!(set.schedule_for(2013).len(), 5);
    }

    #[test]
    fn loaded_csv_matches_the_builtin_historical_tables() {
        let set = ScheduleLoader::load(HISTORICAL_CSV.as_bytes()).unwrap();
        let builtin = maxincome_core::ScheduleSet::australian_historical();

        for year in [2011, 2012, 2013, 2014, 2030] {
            assert_eq!(set.schedule_for(year), builtin.schedule_for(year));
        }
    }

    #[test]
    fn rejects_malformed_rate() {
        let csv = "effective_year,lower,upper,rate\n2013,0,1000,abc\n";
        let result = ScheduleLoader::parse(csv.as_bytes());

        assert!(matches!(result, Err(ScheduleLoaderError::CsvParse(_))));
    }

    #[test]
    fn rejects_invalid_schedule_shape() {
        let csv = "effective_year,lower,upper,rate\n2013,0,1000,0.1\n2013,5000,,0.2\n";
        let result = ScheduleLoader::load(csv.as_bytes());

        assert!(matches!(
            result,
            Err(ScheduleLoaderError::InvalidSchedule(ScheduleError::Gap { .. }))
        ));
    }

    #[test]
    fn rejects_empty_schedule_input() {
        let csv = "effective_year,lower,upper,rate\n";
        let result = ScheduleLoader::load(csv.as_bytes());

        assert!(matches!(result, Err(ScheduleLoaderError::Empty)));
    }

    #[test]
    fn parses_plan_records() {
        let csv = "year,revenue\n2012,30000\n2013,100000\n2014,40000\n";
        let records = PlanLoader::parse(csv.as_bytes()).unwrap();

        assert_eq!(
            records,
            vec![
                PlanRecord {
                    year: 2012,
                    revenue: dec!(30000),
                },
                PlanRecord {
                    year: 2013,
                    revenue: dec!(100000),
                },
                PlanRecord {
                    year: 2014,
                    revenue: dec!(40000),
                },
            ]
        );
    }

    #[test]
    fn rejects_empty_plan() {
        let csv = "year,revenue\n";

        assert!(matches!(
            PlanLoader::parse(csv.as_bytes()),
            Err(ScheduleLoaderError::Empty)
        ));
    }
}

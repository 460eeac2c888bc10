use crate::engine::{SourceSpec, Sources};
use crate::errors::FiscalError;
use crate::parser::LocaleConvention;
use crate::range::{YearRange, DEFAULT_END_YEAR, DEFAULT_START_YEAR};
use crate::schema::{
    SourceSchema, DEFAULT_EXPENSE_COLUMN, DEFAULT_REVENUE_COLUMN, DEFAULT_YEAR_COLUMN,
};
use clap::{value_t, App, Arg, ArgMatches};
use std::ffi::OsString;

/// Which report to write to stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Table,
    Chart,
}

pub struct Args {
    pub revenue_file: String,
    pub expense_file: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub encoding: String,
    pub revenue_year_column: String,
    pub revenue_value_column: String,
    pub expense_year_column: String,
    pub expense_value_column: String,
    pub output: OutputKind,
}

impl Args {
    pub fn parse() -> Self {
        Self::from_matches(&Self::app().get_matches()).unwrap_or_else(|err| err.exit())
    }

    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::from_matches(&Self::app().get_matches_from_safe(iter)?)
    }

    fn app() -> App<'static, 'static> {
        App::new("fiscal_result")
            .version("0.1.0")
            .about("computes the yearly fiscal result from revenue and expense exports")
            .arg(Arg::with_name("revenue_file")
                .takes_value(true).required(true).help("path of the revenue CSV file"))
            .arg(Arg::with_name("expense_file")
                .takes_value(true).required(true).help("path of the expense CSV file"))
            .arg(Arg::with_name("start_year")
                .long("start-year").takes_value(true)
                .help("first fiscal year to report [default: 2014, clamped to the data]"))
            .arg(Arg::with_name("end_year")
                .long("end-year").takes_value(true)
                .help("last fiscal year to report [default: 2024, clamped to the data]"))
            .arg(Arg::with_name("encoding")
                .long("encoding").takes_value(true).default_value("windows-1252")
                .help("text encoding of both source files"))
            .arg(Arg::with_name("revenue_year_column")
                .long("revenue-year-column").takes_value(true).default_value(DEFAULT_YEAR_COLUMN))
            .arg(Arg::with_name("revenue_value_column")
                .long("revenue-value-column").takes_value(true).default_value(DEFAULT_REVENUE_COLUMN))
            .arg(Arg::with_name("expense_year_column")
                .long("expense-year-column").takes_value(true).default_value(DEFAULT_YEAR_COLUMN))
            .arg(Arg::with_name("expense_value_column")
                .long("expense-value-column").takes_value(true).default_value(DEFAULT_EXPENSE_COLUMN))
            .arg(Arg::with_name("output")
                .long("output").takes_value(true)
                .possible_values(&["table", "chart"]).default_value("table")
                .help("report to write to stdout"))
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let year = |name: &str| -> Result<Option<i32>, clap::Error> {
            if matches.is_present(name) {
                Ok(Some(value_t!(matches, name, i32)?))
            } else {
                Ok(None)
            }
        };
        let text = |name: &str| matches.value_of(name).unwrap_or_default().to_string();

        Ok(Self {
            revenue_file: text("revenue_file"),
            expense_file: text("expense_file"),
            start_year: year("start_year")?,
            end_year: year("end_year")?,
            encoding: text("encoding"),
            revenue_year_column: text("revenue_year_column"),
            revenue_value_column: text("revenue_value_column"),
            expense_year_column: text("expense_year_column"),
            expense_value_column: text("expense_value_column"),
            output: match matches.value_of("output") {
                Some("chart") => OutputKind::Chart,
                _ => OutputKind::Table,
            },
        })
    }

    /// The sources described by the arguments.
    pub fn sources(&self) -> Result<Sources, FiscalError> {
        Ok(Sources {
            revenue: SourceSpec::new(
                &self.revenue_file,
                SourceSchema::new(&self.revenue_year_column, &self.revenue_value_column),
            ),
            expense: SourceSpec::new(
                &self.expense_file,
                SourceSchema::new(&self.expense_year_column, &self.expense_value_column),
            ),
            convention: LocaleConvention::default().with_encoding_label(&self.encoding)?,
        })
    }

    /// The requested interval, or `None` to use the default. A missing bound
    /// falls back to the default for that bound. An interval that starts
    /// after it ends is rejected here.
    pub fn year_range(&self) -> Result<Option<YearRange>, FiscalError> {
        match (self.start_year, self.end_year) {
            (None, None) => Ok(None),
            (start, end) => YearRange::new(
                start.unwrap_or(DEFAULT_START_YEAR),
                end.unwrap_or(DEFAULT_END_YEAR),
            )
            .map(Some),
        }
    }
}

use crate::cache::SourceCache;
use crate::errors::{FiscalError, ParseWarning};
use crate::format::{chart_series, chart_title, table_rows, ChartPoint, DisplayRecord};
use crate::merge::{merge, FiscalRecord};
use crate::parser::{LocaleConvention, SourceRecord};
use crate::range::{filter, YearRange};
use crate::schema::SourceSchema;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A source file and the column layout it is expected to have.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub schema: SourceSchema,
}

impl SourceSpec {
    pub fn new(path: impl Into<PathBuf>, schema: SourceSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    /// Reads, validates and coerces the source into (year, value) records.
    ///
    /// Validation runs before any numeric coercion, so a file with the wrong
    /// layout never reaches the arithmetic.
    fn load(
        &self,
        convention: &LocaleConvention,
    ) -> Result<(String, Vec<SourceRecord>, Vec<ParseWarning>), FiscalError> {
        let table = convention.read_table(&self.path)?;
        let table = self.schema.validate(table)?;
        let (records, warnings) = convention.coerce_records(
            &table,
            &self.schema.year_column,
            &self.schema.value_column,
        )?;

        info!(
            source = %table.source_name,
            rows = records.len(),
            warnings = warnings.len(),
            "loaded source"
        );

        Ok((table.source_name, records, warnings))
    }
}

/// Everything the fiscal dataset is computed from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sources {
    pub revenue: SourceSpec,
    pub expense: SourceSpec,
    pub convention: LocaleConvention,
}

impl Sources {
    /// Revenue and expense exports in their default layouts and locale.
    pub fn new(revenue: impl Into<PathBuf>, expense: impl Into<PathBuf>) -> Self {
        Self {
            revenue: SourceSpec::new(revenue, SourceSchema::revenue()),
            expense: SourceSpec::new(expense, SourceSchema::expense()),
            convention: LocaleConvention::default(),
        }
    }

    fn paths(&self) -> [&Path; 2] {
        [self.revenue.path.as_path(), self.expense.path.as_path()]
    }
}

/// The merged and derived fiscal records for a pair of sources, ordered by
/// year ascending, along with every cell that failed coercion on the way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FiscalDataset {
    records: Vec<FiscalRecord>,
    warnings: Vec<ParseWarning>,
}

impl FiscalDataset {
    pub fn new(mut records: Vec<FiscalRecord>, warnings: Vec<ParseWarning>) -> Self {
        records.sort_by_key(|record| record.year);
        Self { records, warnings }
    }

    pub fn records(&self) -> &[FiscalRecord] {
        &self.records
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// The first and last fiscal year in the dataset.
    pub fn bounds(&self) -> Option<YearRange> {
        YearRange::observed(&self.records)
    }

    /// Turns a requested interval into the one that is actually filtered.
    ///
    /// Without a request the default [2014, 2024] interval is clamped to the
    /// data. A request is restricted to the data's bounds; one that falls
    /// entirely outside them is passed through unchanged so that filtering
    /// reports it as empty.
    pub fn resolve_range(&self, requested: Option<YearRange>) -> Result<YearRange, FiscalError> {
        let bounds = match self.bounds() {
            Some(bounds) => bounds,
            None => {
                let range = requested.unwrap_or_else(YearRange::fixed_default);
                return Err(FiscalError::EmptyRange {
                    start: range.start(),
                    end: range.end(),
                });
            }
        };

        Ok(match requested {
            None => YearRange::default_for(bounds),
            Some(range) => range.clamp_to(bounds).unwrap_or(range),
        })
    }

    /// Selects the records of the requested interval.
    pub fn select(&self, requested: Option<YearRange>) -> Result<Selection, FiscalError> {
        let range = self.resolve_range(requested)?;
        let records = filter(&self.records, range)?;

        Ok(Selection { range, records })
    }
}

impl TryFrom<&Sources> for FiscalDataset {
    type Error = FiscalError;

    /// Parses, validates, merges and derives the dataset for `sources`. Any
    /// fatal error aborts the load and no partial dataset is returned.
    fn try_from(sources: &Sources) -> Result<Self, Self::Error> {
        let (revenue_name, revenue, mut warnings) = sources.revenue.load(&sources.convention)?;
        let (expense_name, expense, expense_warnings) =
            sources.expense.load(&sources.convention)?;
        warnings.extend(expense_warnings);

        let records = merge(&revenue_name, &revenue, &expense_name, &expense)?;
        info!(years = records.len(), "merged fiscal years");

        Ok(FiscalDataset::new(records, warnings))
    }
}

/// The records of one selected interval, ready to be presented.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    range: YearRange,
    records: Vec<FiscalRecord>,
}

impl Selection {
    pub fn range(&self) -> YearRange {
        self.range
    }

    pub fn records(&self) -> &[FiscalRecord] {
        &self.records
    }

    pub fn title(&self) -> String {
        chart_title(self.range)
    }

    /// Chart points ordered by year ascending.
    pub fn chart_series(&self) -> Vec<ChartPoint> {
        chart_series(&self.records)
    }

    /// Table rows ordered by year descending.
    pub fn table_rows(&self) -> Vec<DisplayRecord> {
        table_rows(&self.records)
    }
}

/// A FiscalLedger computes the fiscal result for a pair of sources and
/// renders reports over any year interval.
///
/// Loading is memoized: the parsed dataset is reused until one of the source
/// files changes. Filtering and formatting are recomputed on every report.
pub struct FiscalLedger {
    sources: Sources,
    cache: SourceCache<Sources, FiscalDataset>,
}

impl FiscalLedger {
    pub fn new(sources: Sources) -> Self {
        Self {
            sources,
            cache: SourceCache::new(),
        }
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    /// The dataset for the configured sources, loaded on first use or when a
    /// source has changed since the last load.
    pub fn dataset(&mut self) -> Result<Arc<FiscalDataset>, FiscalError> {
        let sources = &self.sources;
        self.cache
            .get_or_load(sources, &sources.paths(), || FiscalDataset::try_from(sources))
    }

    pub fn select(&mut self, requested: Option<YearRange>) -> Result<Selection, FiscalError> {
        let selection = self.dataset()?.select(requested)?;
        info!(
            title = %selection.title(),
            years = selection.records().len(),
            "selected fiscal years"
        );

        Ok(selection)
    }

    /// Attempts to generate the detail table report for the requested
    /// interval: one `;` delimited CSV row per year, newest first.
    pub fn generate_table_report(
        &mut self,
        requested: Option<YearRange>,
    ) -> Result<String, FiscalError> {
        write_report(&self.select(requested)?.table_rows())
    }

    /// Attempts to generate the chart series report for the requested
    /// interval: one `;` delimited CSV row per year, oldest first.
    pub fn generate_chart_report(
        &mut self,
        requested: Option<YearRange>,
    ) -> Result<String, FiscalError> {
        write_report(&self.select(requested)?.chart_series())
    }
}

fn write_report<T: Serialize>(rows: &[T]) -> Result<String, FiscalError> {
    let mut buf = Vec::new();
    {
        // Formatted amounts contain commas, so the report uses the same
        // delimiter as the sources.
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(&mut buf);

        for row in rows {
            wtr.serialize(row)?;
        }

        wtr.flush()?;
    }

    Ok(String::from_utf8(buf)?)
}

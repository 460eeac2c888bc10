use crate::errors::FiscalError;
use crate::parser::{ExpenseRecord, RevenueRecord, SourceRecord};
use rust_decimal::Decimal;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::warn;

/// Revenue and expense for one fiscal year, with the derived fiscal result.
///
/// Any of the amounts may be `None` when the underlying cell could not be
/// parsed. A `None` amount is "not available" and is never treated as zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FiscalRecord {
    pub year: i32,
    pub revenue: Option<Decimal>,
    pub expense: Option<Decimal>,
    pub result: Option<Decimal>,
}

/// A joined year that has not had its result derived yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergedYear {
    pub year: i32,
    pub revenue: Option<Decimal>,
    pub expense: Option<Decimal>,
}

impl MergedYear {
    /// Derives the fiscal result for this year.
    pub fn derive(self) -> FiscalRecord {
        let result = compute_result(self.revenue, self.expense);
        if result.is_none() && self.revenue.is_some() && self.expense.is_some() {
            warn!(
                year = self.year,
                "revenue minus expense overflows, result treated as not available"
            );
        }

        FiscalRecord {
            year: self.year,
            revenue: self.revenue,
            expense: self.expense,
            result,
        }
    }
}

/// Computes `revenue - expense`. Returns `None` if either side is not
/// available, or if the difference is outside the range of `Decimal`.
pub fn compute_result(revenue: Option<Decimal>, expense: Option<Decimal>) -> Option<Decimal> {
    revenue?.checked_sub(expense?)
}

/// Inner-joins the revenue and expense records on fiscal year and derives the
/// result of every matching year. Years present in only one source are
/// dropped. The output follows the order of the revenue records.
///
/// A year repeated within either source is rejected with
/// [`FiscalError::DuplicateYear`] rather than summed or overwritten.
pub fn merge(
    revenue_source: &str,
    revenue: &[RevenueRecord],
    expense_source: &str,
    expense: &[ExpenseRecord],
) -> Result<Vec<FiscalRecord>, FiscalError> {
    // Both sides are indexed so that duplicates are caught in either source,
    // even for years that would not survive the join.
    index_by_year(revenue_source, revenue)?;
    let expenses = index_by_year(expense_source, expense)?;

    let records = revenue
        .iter()
        .filter_map(|record| {
            expenses.get(&record.year).map(|expense| MergedYear {
                year: record.year,
                revenue: record.value,
                expense: *expense,
            })
        })
        .map(MergedYear::derive)
        .collect();

    Ok(records)
}

fn index_by_year(
    source_name: &str,
    records: &[SourceRecord],
) -> Result<HashMap<i32, Option<Decimal>>, FiscalError> {
    let mut index = HashMap::with_capacity(records.len());

    for record in records {
        match index.entry(record.year) {
            Entry::Occupied(_) => {
                return Err(FiscalError::DuplicateYear {
                    source_name: source_name.to_string(),
                    year: record.year,
                })
            }
            Entry::Vacant(vacancy) => {
                vacancy.insert(record.value);
            }
        };
    }

    Ok(index)
}

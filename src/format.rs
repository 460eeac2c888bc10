use crate::merge::FiscalRecord;
use crate::range::YearRange;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Rendered in place of any amount that could not be parsed or derived.
pub const NOT_AVAILABLE: &str = "N/A";

pub const CURRENCY_PREFIX: &str = "R$ ";

pub const SURPLUS_LABEL_COLOR: &str = "#001B44";
pub const DEFICIT_LABEL_COLOR: &str = "#660000";

/// Vertical label offsets, in pixels, relative to the plotted point.
pub const SURPLUS_LABEL_OFFSET: i32 = -15;
pub const DEFICIT_LABEL_OFFSET: i32 = 15;

const GROUPING_SEPARATOR: char = '.';
const DECIMAL_SEPARATOR: char = ',';
const FRACTION_DIGITS: u32 = 2;

/// Formats `value` with `.` grouping and `,` decimal separators and exactly
/// two fractional digits, e.g. `-1.234.567,89`. Midpoints round away from
/// zero.
pub fn format_number(value: Decimal) -> String {
    let rounded =
        value.round_dp_with_strategy(FRACTION_DIGITS, RoundingStrategy::MidpointAwayFromZero);
    let digits = format!("{:.2}", rounded.abs());
    let (integer, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut out = String::with_capacity(digits.len() + integer.len() / 3 + 1);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        out.push('-');
    }
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(GROUPING_SEPARATOR);
        }
        out.push(c);
    }
    out.push(DECIMAL_SEPARATOR);
    out.push_str(fraction);

    out
}

/// Formats an optional amount without a currency prefix.
pub fn format_amount(value: Option<Decimal>) -> String {
    value
        .map(format_number)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Formats an optional amount as currency text, e.g. `R$ 1.234,56`.
pub fn format_currency(value: Option<Decimal>) -> String {
    match value {
        Some(value) => format!("{}{}", CURRENCY_PREFIX, format_number(value)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Scales an amount to millions. No rounding is applied; only trailing
/// zeros are dropped.
pub fn to_millions(value: Decimal) -> Decimal {
    (value / Decimal::from(1_000_000)).normalize()
}

/// The table color class of a fiscal result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultTone {
    /// Revenue exceeded expense.
    Surplus,

    /// Expense exceeded revenue.
    Deficit,

    /// Revenue and expense matched exactly.
    Balanced,

    /// The result could not be derived.
    Unavailable,
}

impl ResultTone {
    pub fn of(result: Option<Decimal>) -> Self {
        match result {
            None => ResultTone::Unavailable,
            Some(value) if value > Decimal::ZERO => ResultTone::Surplus,
            Some(value) if value < Decimal::ZERO => ResultTone::Deficit,
            Some(_) => ResultTone::Balanced,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ResultTone::Surplus => "blue",
            ResultTone::Deficit => "red",
            ResultTone::Balanced => "black",
            ResultTone::Unavailable => "gray",
        }
    }
}

/// The presentation-ready projection of a [`FiscalRecord`], one table row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayRecord {
    pub year: i32,
    pub revenue_text: String,
    pub expense_text: String,
    pub result_text: String,
    pub result_magnitude_millions: Option<Decimal>,
    pub is_surplus: bool,
    pub result_color: &'static str,
}

impl From<&FiscalRecord> for DisplayRecord {
    fn from(record: &FiscalRecord) -> Self {
        Self {
            year: record.year,
            revenue_text: format_currency(record.revenue),
            expense_text: format_currency(record.expense),
            result_text: format_currency(record.result),
            result_magnitude_millions: record.result.map(to_millions),
            is_surplus: is_surplus(record.result),
            result_color: ResultTone::of(record.result).color(),
        }
    }
}

/// One point of the result chart, with its label hints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub year: i32,
    pub result_millions: Option<Decimal>,
    pub is_surplus: bool,
    pub label_text: String,
    pub label_offset: i32,
    pub label_color: &'static str,
}

impl From<&FiscalRecord> for ChartPoint {
    fn from(record: &FiscalRecord) -> Self {
        let millions = record.result.map(to_millions);
        let surplus = is_surplus(record.result);

        Self {
            year: record.year,
            result_millions: millions,
            is_surplus: surplus,
            label_text: format_amount(millions),
            label_offset: if surplus {
                SURPLUS_LABEL_OFFSET
            } else {
                DEFICIT_LABEL_OFFSET
            },
            label_color: if surplus {
                SURPLUS_LABEL_COLOR
            } else {
                DEFICIT_LABEL_COLOR
            },
        }
    }
}

fn is_surplus(result: Option<Decimal>) -> bool {
    result.is_some_and(|value| value > Decimal::ZERO)
}

/// The chart series for `records`, ordered by year ascending.
pub fn chart_series(records: &[FiscalRecord]) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = records.iter().map(ChartPoint::from).collect();
    points.sort_by_key(|point| point.year);
    points
}

/// The detail table for `records`, ordered by year descending.
pub fn table_rows(records: &[FiscalRecord]) -> Vec<DisplayRecord> {
    let mut rows: Vec<DisplayRecord> = records.iter().map(DisplayRecord::from).collect();
    rows.sort_by(|a, b| b.year.cmp(&a.year));
    rows
}

pub fn chart_title(range: YearRange) -> String {
    format!("Resultado Fiscal ({})", range)
}

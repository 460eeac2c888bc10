use crate::errors::FiscalError;
use crate::merge::FiscalRecord;
use std::fmt;
use std::fmt::Formatter;

pub const DEFAULT_START_YEAR: i32 = 2014;
pub const DEFAULT_END_YEAR: i32 = 2024;

/// An inclusive interval of fiscal years. `start <= end` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    /// Validates a user supplied interval. An interval whose start is after
    /// its end is rejected here, before it can reach the filter.
    pub fn new(start: i32, end: i32) -> Result<Self, FiscalError> {
        if start > end {
            return Err(FiscalError::InvalidRange { start, end });
        }

        Ok(Self { start, end })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }

    /// The smallest interval covering every year in `records`, or `None` for
    /// an empty sequence.
    pub fn observed(records: &[FiscalRecord]) -> Option<Self> {
        let start = records.iter().map(|r| r.year).min()?;
        let end = records.iter().map(|r| r.year).max()?;

        Some(Self { start, end })
    }

    /// Restricts this interval to `bounds`. Returns `None` when the two do
    /// not overlap.
    pub fn clamp_to(&self, bounds: YearRange) -> Option<Self> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);

        (start <= end).then_some(Self { start, end })
    }

    /// The fixed [2014, 2024] interval, before any clamping.
    pub fn fixed_default() -> Self {
        Self {
            start: DEFAULT_START_YEAR,
            end: DEFAULT_END_YEAR,
        }
    }

    /// The default selection: the fixed [2014, 2024] interval with each bound
    /// clamped into `bounds`. Unlike [`YearRange::clamp_to`] this never comes
    /// back empty; with data entirely outside the fixed interval it collapses
    /// onto the nearest observed year.
    pub fn default_for(bounds: YearRange) -> Self {
        let fixed = Self::fixed_default();

        Self {
            start: fixed.start.clamp(bounds.start, bounds.end),
            end: fixed.end.clamp(bounds.start, bounds.end),
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Returns the records whose year falls within `range`, in their original
/// order. An empty selection is reported as [`FiscalError::EmptyRange`] so
/// the caller can show a "no data" state instead of an empty chart.
pub fn filter(records: &[FiscalRecord], range: YearRange) -> Result<Vec<FiscalRecord>, FiscalError> {
    let selected: Vec<FiscalRecord> = records
        .iter()
        .filter(|record| range.contains(record.year))
        .copied()
        .collect();

    if selected.is_empty() {
        return Err(FiscalError::EmptyRange {
            start: range.start,
            end: range.end,
        });
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(year: i32) -> FiscalRecord {
        FiscalRecord {
            year,
            revenue: None,
            expense: None,
            result: None,
        }
    }

    fn decade() -> Vec<FiscalRecord> {
        (2014..=2024).map(record).collect()
    }

    #[test]
    fn should_reject_an_interval_that_starts_after_it_ends() {
        let err = YearRange::new(2020, 2019).unwrap_err();

        assert!(matches!(
            err,
            FiscalError::InvalidRange {
                start: 2020,
                end: 2019
            }
        ));
    }

    #[test]
    fn should_accept_a_single_year_interval() {
        let range = YearRange::new(2020, 2020).unwrap();

        assert!(range.contains(2020));
        assert!(!range.contains(2021));
    }

    #[test]
    fn should_signal_empty_range_for_a_non_overlapping_interval() {
        let err = filter(&decade(), YearRange::new(1900, 1901).unwrap()).unwrap_err();

        assert!(matches!(
            err,
            FiscalError::EmptyRange {
                start: 1900,
                end: 1901
            }
        ));
    }

    #[test]
    fn should_filter_inclusively() {
        let selected = filter(&decade(), YearRange::new(2016, 2018).unwrap()).unwrap();

        let years: Vec<i32> = selected.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2016, 2017, 2018]);
    }

    #[test]
    fn should_compute_observed_bounds() {
        let records = vec![record(2019), record(2015), record(2022)];

        assert_eq!(
            YearRange::observed(&records),
            Some(YearRange::new(2015, 2022).unwrap())
        );
        assert_eq!(YearRange::observed(&[]), None);
    }

    #[test]
    fn should_clamp_a_selection_to_the_observed_bounds() {
        let bounds = YearRange::new(2016, 2020).unwrap();

        assert_eq!(
            YearRange::new(2010, 2018).unwrap().clamp_to(bounds),
            Some(YearRange::new(2016, 2018).unwrap())
        );
        assert_eq!(YearRange::new(1900, 1901).unwrap().clamp_to(bounds), None);
    }

    #[test]
    fn should_clamp_the_default_interval_to_the_data() {
        // Data fully inside the fixed interval narrows it.
        assert_eq!(
            YearRange::default_for(YearRange::new(2016, 2020).unwrap()),
            YearRange::new(2016, 2020).unwrap()
        );

        // Data wider than the fixed interval keeps it.
        assert_eq!(
            YearRange::default_for(YearRange::new(2000, 2030).unwrap()),
            YearRange::new(2014, 2024).unwrap()
        );

        // Data entirely before the fixed interval collapses onto its last year.
        assert_eq!(
            YearRange::default_for(YearRange::new(2000, 2005).unwrap()),
            YearRange::new(2005, 2005).unwrap()
        );
    }

    fn interval() -> impl Strategy<Value = YearRange> {
        (2000i32..2040, 0i32..20).prop_map(|(start, len)| YearRange {
            start,
            end: start + len,
        })
    }

    proptest! {
        #[test]
        fn prop_filter_is_idempotent(range in interval()) {
            if let Ok(selected) = filter(&decade(), range) {
                prop_assert_eq!(filter(&selected, range).ok(), Some(selected.clone()));
            }
        }

        #[test]
        fn prop_filtering_a_sub_interval_matches_filtering_the_original(
            outer in interval(),
            offset in 0i32..20,
            len in 0i32..20,
        ) {
            let start = outer.start + offset.min(outer.end - outer.start);
            let end = (start + len).min(outer.end);
            let inner = YearRange::new(start, end).unwrap();

            if let Ok(selected) = filter(&decade(), outer) {
                let nested = filter(&selected, inner).ok();
                let direct = filter(&decade(), inner).ok();
                prop_assert_eq!(nested, direct);
            }
        }
    }
}

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Inclusive calendar window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The whole calendar month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self { start, end })
    }

    /// The whole calendar year.
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Overlap with a possibly open-ended window `[start, end?]`.
    ///
    /// This is the one overlap rule used for budget filtering:
    /// `start <= self.end AND (end >= self.start OR end IS NULL)`.
    pub fn overlaps(&self, start: NaiveDate, end: Option<NaiveDate>) -> bool {
        start <= self.end && end.is_none_or(|end| end >= self.start)
    }

    /// Common part of both windows, if any.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        DateRange::new(self.start.max(other.start), self.end.min(other.end))
    }

    /// Every calendar month touched by the window, oldest first.
    pub fn months(&self) -> Vec<YearMonth> {
        let mut months = Vec::new();
        let mut current = YearMonth::from_date(self.start);
        let last = YearMonth::from_date(self.end);
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_handles_leap_february() {
        let feb = DateRange::month(2024, 2).unwrap();
        assert_eq!(feb.start, d(2024, 2, 1));
        assert_eq!(feb.end, d(2024, 2, 29));

        let dec = DateRange::month(2023, 12).unwrap();
        assert_eq!(dec.end, d(2023, 12, 31));
    }

    #[test]
    fn month_rejects_invalid_month() {
        assert!(DateRange::month(2024, 13).is_none());
        assert!(DateRange::month(2024, 0).is_none());
    }

    #[test]
    fn new_rejects_inverted_window() {
        assert!(DateRange::new(d(2024, 2, 1), d(2024, 1, 31)).is_none());
        assert!(DateRange::new(d(2024, 1, 1), d(2024, 1, 1)).is_some());
    }

    #[test]
    fn overlap_is_inclusive_on_both_edges() {
        let january = DateRange::month(2024, 1).unwrap();
        assert!(january.overlaps(d(2023, 12, 1), Some(d(2024, 1, 1))));
        assert!(january.overlaps(d(2024, 1, 31), Some(d(2024, 3, 1))));
        assert!(!january.overlaps(d(2024, 2, 1), Some(d(2024, 2, 29))));
        assert!(!january.overlaps(d(2023, 11, 1), Some(d(2023, 12, 31))));
    }

    #[test]
    fn overlap_with_open_end() {
        let january = DateRange::month(2024, 1).unwrap();
        assert!(january.overlaps(d(2023, 6, 1), None));
        assert!(!january.overlaps(d(2024, 2, 1), None));
    }

    #[test]
    fn intersect_windows() {
        let january = DateRange::month(2024, 1).unwrap();
        let late = DateRange::new(d(2024, 1, 20), d(2024, 2, 10)).unwrap();
        assert_eq!(
            january.intersect(&late),
            DateRange::new(d(2024, 1, 20), d(2024, 1, 31))
        );
        let february = DateRange::month(2024, 2).unwrap();
        assert_eq!(january.intersect(&february), None);
    }

    #[test]
    fn months_spans_year_boundary() {
        let window = DateRange::new(d(2023, 11, 15), d(2024, 2, 1)).unwrap();
        let months: Vec<_> = window.months().into_iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(months, vec![(2023, 11), (2023, 12), (2024, 1), (2024, 2)]);
    }
}

use chrono::{Datelike, Duration, NaiveDate};

use crate::dates;

/// Year the Sunday table below was drawn up for.
pub const REFERENCE_YEAR: i32 = 2026;

/// Week spans are only dated correctly for the table's own year; birthdays
/// projected into any other year never land in a week.
pub fn covers_year(year: i32) -> bool {
    year == REFERENCE_YEAR
}

/// Day-of-month of every Sunday, indexed by month - 1.
const SUNDAY_DATES: [&[u32]; 12] = [
    &[4, 11, 18, 25],
    &[1, 8, 15, 22],
    &[1, 8, 15, 22, 29],
    &[5, 12, 19, 26],
    &[3, 10, 17, 24, 31],
    &[7, 14, 21, 28],
    &[5, 12, 19, 26],
    &[2, 9, 16, 23, 30],
    &[6, 13, 20, 27],
    &[4, 11, 18, 25],
    &[1, 8, 15, 22, 29],
    &[6, 13, 20, 27],
];

/// One Sunday-anchored attendance week, e.g. `3월 2주차` on 2026-03-08.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekHeader {
    pub label: String,
    pub date: NaiveDate,
}

impl WeekHeader {
    /// Saturday closing the 7-day span that starts on this Sunday.
    pub fn span_end(&self) -> NaiveDate {
        self.date + Duration::days(6)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let key = dates::ymd_key(date);
        key >= dates::ymd_key(self.date) && key <= dates::ymd_key(self.span_end())
    }

    /// `(3월 8일)`, shown under the label in the grid.
    pub fn display_date(&self) -> String {
        format!("({}월 {}일)", self.date.month(), self.date.day())
    }
}

pub fn month_weeks(month: u32) -> Vec<WeekHeader> {
    let Some(days) = month
        .checked_sub(1)
        .and_then(|idx| SUNDAY_DATES.get(idx as usize))
    else {
        return Vec::new();
    };

    days.iter()
        .enumerate()
        .filter_map(|(idx, day)| {
            NaiveDate::from_ymd_opt(REFERENCE_YEAR, month, *day).map(|date| WeekHeader {
                label: format!("{}월 {}주차", month, idx + 1),
                date,
            })
        })
        .collect()
}

/// Every week of the year in calendar order. The persisted sheet always
/// carries all of them, whatever range is on screen.
pub fn year_weeks() -> Vec<WeekHeader> {
    (1..=12).flat_map(month_weeks).collect()
}

pub fn find_week(label: &str) -> Option<WeekHeader> {
    let label = label.trim();
    year_weeks().into_iter().find(|week| week.label == label)
}

/// Two-month window of the attendance grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub first: u32,
    pub last: u32,
}

pub const MONTH_RANGES: [MonthRange; 6] = [
    MonthRange { first: 1, last: 2 },
    MonthRange { first: 3, last: 4 },
    MonthRange { first: 5, last: 6 },
    MonthRange { first: 7, last: 8 },
    MonthRange { first: 9, last: 10 },
    MonthRange { first: 11, last: 12 },
];

impl MonthRange {
    pub fn label(&self) -> String {
        format!("{}-{}월", self.first, self.last)
    }

    pub fn weeks(&self) -> Vec<WeekHeader> {
        (self.first..=self.last).flat_map(month_weeks).collect()
    }

    pub fn months(&self) -> impl Iterator<Item = u32> {
        self.first..=self.last
    }

    /// Accepts `3-4`, `3-4월` or a single month inside a range (`4`).
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().trim_end_matches('월');
        if let Some((first, last)) = value.split_once('-') {
            let first: u32 = first.trim().parse().ok()?;
            let last: u32 = last.trim().parse().ok()?;
            return MONTH_RANGES
                .into_iter()
                .find(|range| range.first == first && range.last == last);
        }
        let month: u32 = value.parse().ok()?;
        MONTH_RANGES
            .into_iter()
            .find(|range| range.first <= month && month <= range.last)
    }

    /// Range shown by default: the one holding today's month, pinned to the
    /// first or last range when today falls outside the reference year.
    pub fn default_for(today: NaiveDate) -> Self {
        if today.year() < REFERENCE_YEAR {
            return MONTH_RANGES[0];
        }
        if today.year() > REFERENCE_YEAR {
            return MONTH_RANGES[5];
        }
        let idx = ((today.month() - 1) / 2) as usize;
        MONTH_RANGES[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn every_table_entry_is_a_sunday() {
        let weeks = year_weeks();
        assert_eq!(weeks.len(), 52);
        for week in &weeks {
            assert_eq!(week.date.weekday(), chrono::Weekday::Sun, "{}", week.label);
        }
    }

    #[test]
    fn labels_number_weeks_within_month() {
        let march = month_weeks(3);
        let labels: Vec<&str> = march.iter().map(|w| w.label.as_str()).collect();
        assert_eq!(
            labels,
            ["3월 1주차", "3월 2주차", "3월 3주차", "3월 4주차", "3월 5주차"]
        );
        assert_eq!(march[1].date, date(2026, 3, 8));
        assert_eq!(march[1].display_date(), "(3월 8일)");
    }

    #[test]
    fn out_of_range_month_has_no_weeks() {
        assert!(month_weeks(0).is_empty());
        assert!(month_weeks(13).is_empty());
    }

    #[test]
    fn span_runs_sunday_through_saturday() {
        let week = find_week("3월 2주차").unwrap();
        assert_eq!(week.span_end(), date(2026, 3, 14));
        assert!(week.contains(date(2026, 3, 8)));
        assert!(week.contains(date(2026, 3, 14)));
        assert!(!week.contains(date(2026, 3, 15)));
        assert!(!week.contains(date(2026, 3, 7)));
    }

    #[test]
    fn only_the_table_year_is_covered() {
        assert!(covers_year(2026));
        assert!(!covers_year(2027));
    }

    #[test]
    fn parses_ranges() {
        assert_eq!(MonthRange::parse("3-4"), Some(MONTH_RANGES[1]));
        assert_eq!(MonthRange::parse("11-12월"), Some(MONTH_RANGES[5]));
        assert_eq!(MonthRange::parse("6"), Some(MONTH_RANGES[2]));
        assert_eq!(MonthRange::parse("2-3"), None);
        assert_eq!(MONTH_RANGES[1].label(), "3-4월");
        assert_eq!(MONTH_RANGES[1].weeks().len(), 9);
    }

    #[test]
    fn default_range_follows_today() {
        assert_eq!(MonthRange::default_for(date(2025, 7, 1)), MONTH_RANGES[0]);
        assert_eq!(MonthRange::default_for(date(2027, 3, 1)), MONTH_RANGES[5]);
        assert_eq!(MonthRange::default_for(date(2026, 2, 28)), MONTH_RANGES[0]);
        assert_eq!(MonthRange::default_for(date(2026, 10, 19)), MONTH_RANGES[4]);
    }
}

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};

/// Offset the sheet's timestamps are rendered in (KST).
const SHEET_OFFSET_SECS: i32 = 9 * 3600;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y.%m.%d", "%Y. %m. %d", "%Y/%m/%d"];

fn parse_plain(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Parses the date shapes that show up in the roster sheet.
///
/// Plain dates (`2026-03-10`, `2026-3-10`, `2026.03.10`, `2026. 3. 10.`,
/// `2026/03/10`) are taken as-is. Full timestamps written back by the sheet
/// are shifted into KST before the date part is taken, so
/// `2026-03-09T15:00:00.000Z` reads as March 10th. Any other text after an
/// ISO date must be separated by `T` or a space.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(date) = parse_plain(value.trim_end_matches('.').trim_end()) {
        return Some(date);
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        let offset = FixedOffset::east_opt(SHEET_OFFSET_SECS)?;
        return Some(stamp.with_timezone(&offset).date_naive());
    }

    let (head, _) = value.split_once(['T', ' '])?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// `YYYYMMDD` as an integer, the unit all active-window comparisons use.
pub fn ymd_key(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// `MM-DD`, used in transfer entries.
pub fn month_day(date: NaiveDate) -> String {
    format!("{:02}-{:02}", date.month(), date.day())
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_plain_and_separated_dates() {
        assert_eq!(parse_date("2026-03-10"), Some(date(2026, 3, 10)));
        assert_eq!(parse_date("2026.03.10"), Some(date(2026, 3, 10)));
        assert_eq!(parse_date(" 2026/03/10 "), Some(date(2026, 3, 10)));
    }

    #[test]
    fn parses_unpadded_and_sheet_locale_dates() {
        assert_eq!(parse_date("2026-3-10"), Some(date(2026, 3, 10)));
        assert_eq!(parse_date("2026. 3. 10"), Some(date(2026, 3, 10)));
        assert_eq!(parse_date("2026. 3. 10."), Some(date(2026, 3, 10)));
        assert_eq!(parse_date("2026. 12. 1"), Some(date(2026, 12, 1)));
    }

    #[test]
    fn takes_the_date_before_a_time_part() {
        assert_eq!(parse_date("2026-03-10 09:30:00"), Some(date(2026, 3, 10)));
        assert_eq!(parse_date("2026-03-10T09:30:00"), Some(date(2026, 3, 10)));
        assert_eq!(parse_date("2026-03-1x"), None);
    }

    #[test]
    fn shifts_sheet_timestamps_into_kst() {
        assert_eq!(
            parse_date("2026-03-09T15:00:00.000Z"),
            Some(date(2026, 3, 10))
        );
    }

    #[test]
    fn rejects_blank_and_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("next sunday"), None);
        assert_eq!(parse_date("2026년 3월 10일"), None);
        assert_eq!(parse_date("Tue Mar 10 2026 00:00:00 GMT+0900 (KST)"), None);
    }

    #[test]
    fn ymd_key_orders_like_dates() {
        assert_eq!(ymd_key(date(2026, 3, 8)), 20_260_308);
        assert!(ymd_key(date(2025, 12, 31)) < ymd_key(date(2026, 1, 1)));
    }

    #[test]
    fn month_day_is_zero_padded() {
        assert_eq!(month_day(date(2026, 3, 1)), "03-01");
    }
}

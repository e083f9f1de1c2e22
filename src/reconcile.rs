use std::collections::HashSet;

use crate::attendance::RecordIndex;
use crate::calendar;
use crate::models::{AttendanceRow, AttendanceSheet, Member, MemberRow, StatKind};
use crate::roster;
use crate::stats::StatContext;

/// Identity and demographic columns, ahead of the week columns.
pub const IDENTITY_HEADERS: [&str; 8] = [
    "memberId",
    "type",
    "이름",
    "반",
    "담임선생님",
    "생년월일",
    "등록일",
    "전출일",
];

/// Identity columns followed by every week of the year in calendar order.
pub fn sheet_headers() -> Vec<String> {
    IDENTITY_HEADERS
        .iter()
        .map(|h| h.to_string())
        .chain(calendar::year_weeks().into_iter().map(|w| w.label))
        .collect()
}

/// Merges a possibly stale row set with the current roster.
///
/// The result holds exactly one row per member, in canonical order, then
/// the lock row, then the statistic rows in [`StatKind::ALL`] order. Rows of
/// deleted members are dropped, every member field is refreshed from the
/// roster, and the header list always spans the whole year.
pub fn reconcile(members: &[Member], rows: &[AttendanceRow], year: i32) -> AttendanceSheet {
    let prior: Vec<&MemberRow> = rows
        .iter()
        .filter_map(|row| match row {
            AttendanceRow::Member(member) => Some(member),
            _ => None,
        })
        .collect();
    let index = RecordIndex::build(prior.iter().copied());

    let lock = rows
        .iter()
        .find_map(|row| match row {
            AttendanceRow::Lock(lock) => Some(lock.clone()),
            _ => None,
        })
        .unwrap_or_default();

    let weeks = calendar::year_weeks();
    let known: HashSet<&str> = weeks.iter().map(|w| w.label.as_str()).collect();
    let ordered = roster::canonical_order(members);

    let mut synced: Vec<AttendanceRow> = ordered
        .iter()
        .map(|member| {
            let mut row = MemberRow::refresh_from(member, index.resolve(member));
            row.marks.retain(|week, _| known.contains(week.as_str()));
            AttendanceRow::Member(row)
        })
        .collect();

    let ctx = StatContext {
        members: &ordered,
        index: &index,
        lock: &lock,
        weeks: &weeks,
        year,
    };
    let stat_rows: Vec<AttendanceRow> = StatKind::ALL
        .into_iter()
        .map(|kind| AttendanceRow::Stat(ctx.build(kind)))
        .collect();

    synced.push(AttendanceRow::Lock(lock));
    synced.extend(stat_rows);

    let headers = sheet_headers();

    tracing::debug!(
        members = members.len(),
        prior_rows = prior.len(),
        resolved = index.len(),
        "reconciled attendance"
    );

    AttendanceSheet {
        headers,
        rows: synced,
    }
}

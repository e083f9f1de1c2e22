//! Flat, header-keyed record shape the attendance sheet is stored in.
//!
//! Every row is an object whose keys are column headers. Member rows carry
//! their identity columns plus one `O`/`X` cell per week; sentinel rows are
//! told apart by a reserved `memberId` and have `type` set to `SYSTEM`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::calendar;
use crate::models::{
    text, AttendanceRow, AttendanceSheet, DateField, LockRow, Mark, MemberRow, MemberType,
    StatKind, StatRow, UnparsedDates, WeekLock,
};
use crate::reconcile::IDENTITY_HEADERS;

pub type RawRecord = Map<String, Value>;

const SYSTEM_TYPE: &str = "SYSTEM";

/// Attendance table as the remote store sends and receives it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

fn cell(record: &RawRecord, key: &str) -> String {
    record.get(key).map(text::from_value).unwrap_or_default()
}

fn is_identity(key: &str) -> bool {
    IDENTITY_HEADERS.contains(&key)
}

/// Parses stored records into typed rows. Stored statistic rows are kept
/// (they are stale by definition and get replaced on the next save); rows
/// with an unknown member type are skipped.
pub fn parse_records(records: &[RawRecord]) -> Vec<AttendanceRow> {
    records.iter().filter_map(parse_record).collect()
}

fn parse_record(record: &RawRecord) -> Option<AttendanceRow> {
    let id = cell(record, "memberId");
    let name = cell(record, "이름");
    let kind = cell(record, "type");

    if id == LockRow::ID || name == LockRow::LABEL {
        let weeks = record
            .iter()
            .filter(|(key, _)| calendar::find_week(key).is_some())
            .map(|(key, value)| (key.clone(), WeekLock::from_cell(&text::from_value(value))))
            .filter(|(_, state)| *state == WeekLock::Locked)
            .collect();
        return Some(AttendanceRow::Lock(LockRow { weeks }));
    }

    if let Some(stat) = StatKind::from_id(&id) {
        let cells = record
            .iter()
            .filter(|(key, _)| !is_identity(key))
            .map(|(key, value)| (key.clone(), text::from_value(value)))
            .collect();
        return Some(AttendanceRow::Stat(StatRow { kind: stat, cells }));
    }

    if kind == SYSTEM_TYPE {
        tracing::warn!(id = %id, name = %name, "skipping unrecognised system row");
        return None;
    }
    let Some(member_type) = MemberType::parse(&kind) else {
        tracing::warn!(name = %name, kind = %kind, "skipping row with unknown member type");
        return None;
    };

    let marks = record
        .iter()
        .filter(|(key, _)| !is_identity(key))
        .filter_map(|(key, value)| {
            Mark::from_cell(&text::from_value(value)).map(|mark| (key.clone(), mark))
        })
        .collect();

    let mut unparsed_dates = UnparsedDates::new();
    let birth_date = DateField::Birth.read(&cell(record, "생년월일"), &mut unparsed_dates);
    let reg_date = DateField::Registration.read(&cell(record, "등록일"), &mut unparsed_dates);
    let leave_date = DateField::Leave.read(&cell(record, "전출일"), &mut unparsed_dates);

    Some(AttendanceRow::Member(MemberRow {
        member_id: Some(id).filter(|id| !id.trim().is_empty()),
        member_type,
        name,
        group: cell(record, "반"),
        teacher: cell(record, "담임선생님"),
        birth_date,
        reg_date,
        leave_date,
        unparsed_dates,
        marks,
    }))
}

pub fn from_raw(raw: &RawSheet) -> AttendanceSheet {
    AttendanceSheet {
        headers: raw.headers.clone(),
        rows: parse_records(&raw.records),
    }
}

/// Writes every row with every header, so the stored table has no holes.
pub fn to_raw(sheet: &AttendanceSheet) -> RawSheet {
    let weeks: Vec<&str> = sheet
        .headers
        .iter()
        .map(String::as_str)
        .filter(|h| !is_identity(h))
        .collect();

    let records = sheet
        .rows
        .iter()
        .map(|row| {
            let mut record = RawRecord::new();
            let put = |record: &mut RawRecord, key: &str, value: String| {
                record.insert(key.to_string(), Value::String(value));
            };
            match row {
                AttendanceRow::Member(member) => {
                    put(&mut record, "memberId", member.member_id.clone().unwrap_or_default());
                    put(&mut record, "type", member.member_type.as_str().to_string());
                    put(&mut record, "이름", member.name.clone());
                    put(&mut record, "반", member.group.clone());
                    put(&mut record, "담임선생님", member.teacher.clone());
                    let unparsed = &member.unparsed_dates;
                    put(&mut record, "생년월일", DateField::Birth.write(member.birth_date, unparsed));
                    put(&mut record, "등록일", DateField::Registration.write(member.reg_date, unparsed));
                    put(&mut record, "전출일", DateField::Leave.write(member.leave_date, unparsed));
                    for week in &weeks {
                        let value = member.mark(week).map(|m| m.as_str()).unwrap_or("");
                        put(&mut record, week, value.to_string());
                    }
                }
                AttendanceRow::Lock(lock) => {
                    put_system(&mut record, LockRow::ID, LockRow::LABEL);
                    for week in &weeks {
                        put(&mut record, week, lock.state(week).as_str().to_string());
                    }
                }
                AttendanceRow::Stat(stat) => {
                    put_system(&mut record, stat.kind.id(), stat.kind.label());
                    for week in &weeks {
                        put(&mut record, week, stat.cell(week).to_string());
                    }
                }
            }
            record
        })
        .collect();

    RawSheet {
        headers: sheet.headers.clone(),
        records,
    }
}

fn put_system(record: &mut RawRecord, id: &str, label: &str) {
    for header in IDENTITY_HEADERS {
        record.insert(header.to_string(), Value::String(String::new()));
    }
    record.insert("memberId".into(), Value::String(id.to_string()));
    record.insert("type".into(), Value::String(SYSTEM_TYPE.to_string()));
    record.insert("이름".into(), Value::String(label.to_string()));
}

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberType {
    #[default]
    Student,
    Teacher,
}

impl MemberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberType::Student => "학생",
            MemberType::Teacher => "선생님",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "학생" | "student" => Some(MemberType::Student),
            "선생님" | "teacher" => Some(MemberType::Teacher),
            _ => None,
        }
    }
}

/// The three date columns a member carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateField {
    Birth,
    Registration,
    Leave,
}

/// Date cells that did not parse, kept verbatim so they are written back
/// unchanged instead of being blanked.
pub type UnparsedDates = BTreeMap<DateField, String>;

impl DateField {
    pub fn key(&self) -> &'static str {
        match self {
            DateField::Birth => "birthDate",
            DateField::Registration => "regDate",
            DateField::Leave => "leaveDate",
        }
    }

    /// Parses one cell. Text that is not a date is stored in `unparsed`.
    pub fn read(self, raw: &str, unparsed: &mut UnparsedDates) -> Option<NaiveDate> {
        let parsed = dates::parse_date(raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            tracing::warn!(field = self.key(), value = %raw, "keeping unparseable date as text");
            unparsed.insert(self, raw.to_string());
        }
        parsed
    }

    /// Cell text for `date`, falling back to the kept raw text.
    pub fn write(self, date: Option<NaiveDate>, unparsed: &UnparsedDates) -> String {
        match date {
            Some(_) => dates::format_date(date),
            None => unparsed.get(&self).cloned().unwrap_or_default(),
        }
    }
}

/// A roster entry. Serialised through [`MemberRecord`], the roster sheet's
/// column shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MemberRecord", into = "MemberRecord")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub member_type: MemberType,
    pub age: String,
    pub position: String,
    pub group: String,
    /// Students only: name of the teacher of the same group.
    pub teacher: String,
    /// Teachers only: comma-joined student names of the same group.
    pub assigned_students: String,
    pub prayer: String,
    pub birth_date: Option<NaiveDate>,
    pub reg_date: Option<NaiveDate>,
    pub leave_date: Option<NaiveDate>,
    pub unparsed_dates: UnparsedDates,
    pub photo_url: String,
    pub photo_drive_id: String,
    pub s1: String,
    pub s2: String,
    pub s3: String,
}

impl Member {
    /// Sets a date from the member form, dropping any kept raw text.
    pub fn set_date(&mut self, field: DateField, date: Option<NaiveDate>) {
        self.unparsed_dates.remove(&field);
        match field {
            DateField::Birth => self.birth_date = date,
            DateField::Registration => self.reg_date = date,
            DateField::Leave => self.leave_date = date,
        }
    }
}

/// A member row exactly as the roster sheet stores it: every cell is text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberRecord {
    #[serde(deserialize_with = "text::deserialize")]
    id: String,
    #[serde(deserialize_with = "text::deserialize")]
    name: String,
    #[serde(rename = "type", deserialize_with = "text::deserialize")]
    member_type: String,
    #[serde(deserialize_with = "text::deserialize")]
    age: String,
    #[serde(deserialize_with = "text::deserialize")]
    position: String,
    #[serde(deserialize_with = "text::deserialize")]
    group: String,
    #[serde(deserialize_with = "text::deserialize")]
    teacher: String,
    #[serde(deserialize_with = "text::deserialize")]
    assigned_students: String,
    #[serde(deserialize_with = "text::deserialize")]
    prayer: String,
    #[serde(deserialize_with = "text::deserialize")]
    birth_date: String,
    #[serde(deserialize_with = "text::deserialize")]
    reg_date: String,
    #[serde(deserialize_with = "text::deserialize")]
    leave_date: String,
    #[serde(deserialize_with = "text::deserialize")]
    photo_url: String,
    #[serde(deserialize_with = "text::deserialize")]
    photo_drive_id: String,
    #[serde(deserialize_with = "text::deserialize")]
    s1: String,
    #[serde(deserialize_with = "text::deserialize")]
    s2: String,
    #[serde(deserialize_with = "text::deserialize")]
    s3: String,
}

impl TryFrom<MemberRecord> for Member {
    type Error = String;

    fn try_from(record: MemberRecord) -> Result<Self, Self::Error> {
        let member_type = MemberType::parse(&record.member_type)
            .ok_or_else(|| format!("unknown member type {:?}", record.member_type))?;

        let mut unparsed_dates = UnparsedDates::new();
        let birth_date = DateField::Birth.read(&record.birth_date, &mut unparsed_dates);
        let reg_date = DateField::Registration.read(&record.reg_date, &mut unparsed_dates);
        let leave_date = DateField::Leave.read(&record.leave_date, &mut unparsed_dates);

        Ok(Self {
            id: record.id,
            name: record.name,
            member_type,
            age: record.age,
            position: record.position,
            group: record.group,
            teacher: record.teacher,
            assigned_students: record.assigned_students,
            prayer: record.prayer,
            birth_date,
            reg_date,
            leave_date,
            unparsed_dates,
            photo_url: record.photo_url,
            photo_drive_id: record.photo_drive_id,
            s1: record.s1,
            s2: record.s2,
            s3: record.s3,
        })
    }
}

impl From<Member> for MemberRecord {
    fn from(member: Member) -> Self {
        Self {
            birth_date: DateField::Birth.write(member.birth_date, &member.unparsed_dates),
            reg_date: DateField::Registration.write(member.reg_date, &member.unparsed_dates),
            leave_date: DateField::Leave.write(member.leave_date, &member.unparsed_dates),
            id: member.id,
            name: member.name,
            member_type: member.member_type.as_str().to_string(),
            age: member.age,
            position: member.position,
            group: member.group,
            teacher: member.teacher,
            assigned_students: member.assigned_students,
            prayer: member.prayer,
            photo_url: member.photo_url,
            photo_drive_id: member.photo_drive_id,
            s1: member.s1,
            s2: member.s2,
            s3: member.s3,
        }
    }
}

/// Reads a member list row by row. Rows that are not usable members (an
/// unknown `type`, say) are returned as-is in the second list so they can
/// be saved back untouched.
pub fn read_members(rows: Vec<Value>) -> (Vec<Member>, Vec<Value>) {
    let mut members = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();
    for row in rows {
        match serde_json::from_value::<Member>(row.clone()) {
            Ok(member) => members.push(member),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unusable member row");
                skipped.push(row);
            }
        }
    }
    (members, skipped)
}

/// Attendance cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Present,
    Absent,
}

impl Mark {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mark::Present => "O",
            Mark::Absent => "X",
        }
    }

    pub fn from_cell(raw: &str) -> Option<Self> {
        match raw.trim() {
            "O" | "o" => Some(Mark::Present),
            "X" | "x" => Some(Mark::Absent),
            _ => None,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Mark::Present => Mark::Absent,
            Mark::Absent => Mark::Present,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WeekLock {
    #[default]
    Unlocked,
    Locked,
}

impl WeekLock {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekLock::Unlocked => "UNLOCKED",
            WeekLock::Locked => "LOCKED",
        }
    }

    /// Older sheets stored a bare `true` for locked weeks.
    pub fn from_cell(raw: &str) -> Self {
        match raw.trim() {
            "LOCKED" | "true" | "TRUE" => WeekLock::Locked,
            _ => WeekLock::Unlocked,
        }
    }
}

/// One member's attendance line, with member fields copied in at save time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberRow {
    pub member_id: Option<String>,
    pub member_type: MemberType,
    pub name: String,
    pub group: String,
    pub teacher: String,
    pub birth_date: Option<NaiveDate>,
    pub reg_date: Option<NaiveDate>,
    pub leave_date: Option<NaiveDate>,
    pub unparsed_dates: UnparsedDates,
    pub marks: BTreeMap<String, Mark>,
}

impl MemberRow {
    /// Empty row for a member that has never been marked.
    pub fn blank(member: &Member) -> Self {
        Self::refresh_from(member, None)
    }

    /// Rebuilds a row for `member` on top of a possibly stale prior row.
    ///
    /// Precedence: identity and every denormalized field come from the
    /// member; only the week marks are carried over from `prior`.
    pub fn refresh_from(member: &Member, prior: Option<&MemberRow>) -> Self {
        Self {
            member_id: Some(member.id.clone()),
            member_type: member.member_type,
            name: member.name.clone(),
            group: member.group.clone(),
            teacher: member.teacher.clone(),
            birth_date: member.birth_date,
            reg_date: member.reg_date,
            leave_date: member.leave_date,
            unparsed_dates: member.unparsed_dates.clone(),
            marks: prior.map(|row| row.marks.clone()).unwrap_or_default(),
        }
    }

    pub fn mark(&self, week: &str) -> Option<Mark> {
        self.marks.get(week).copied()
    }

    pub fn is_present(&self, week: &str) -> bool {
        self.mark(week) == Some(Mark::Present)
    }
}

/// Per-week lock flags (`SYSTEM_LOCK`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockRow {
    pub weeks: BTreeMap<String, WeekLock>,
}

impl LockRow {
    pub const ID: &'static str = "SYSTEM_LOCK";
    pub const LABEL: &'static str = "마감";

    pub fn state(&self, week: &str) -> WeekLock {
        self.weeks.get(week).copied().unwrap_or_default()
    }

    pub fn is_locked(&self, week: &str) -> bool {
        self.state(week) == WeekLock::Locked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    StudentAttendance,
    TeacherAttendance,
    TotalAttendance,
    Transfers,
    StudentAbsentees,
    TeacherAbsentees,
    Birthdays,
}

impl StatKind {
    /// Order the statistic rows are written in.
    pub const ALL: [StatKind; 7] = [
        StatKind::StudentAttendance,
        StatKind::TeacherAttendance,
        StatKind::TotalAttendance,
        StatKind::Transfers,
        StatKind::StudentAbsentees,
        StatKind::TeacherAbsentees,
        StatKind::Birthdays,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            StatKind::StudentAttendance => "SYSTEM_STAT_STUDENT",
            StatKind::TeacherAttendance => "SYSTEM_STAT_TEACHER",
            StatKind::TotalAttendance => "SYSTEM_STAT_TOTAL",
            StatKind::Transfers => "SYSTEM_STAT_TRANSFER",
            StatKind::StudentAbsentees => "SYSTEM_STAT_STUDENT_ABSENT",
            StatKind::TeacherAbsentees => "SYSTEM_STAT_TEACHER_ABSENT",
            StatKind::Birthdays => "SYSTEM_STAT_BIRTHDAY",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatKind::StudentAttendance => "학생 출석",
            StatKind::TeacherAttendance => "교사 출석",
            StatKind::TotalAttendance => "전체 출석",
            StatKind::Transfers => "전입/전출",
            StatKind::StudentAbsentees => "학생 결석자",
            StatKind::TeacherAbsentees => "교사 결석자",
            StatKind::Birthdays => "생일자",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// Computed aggregate row, one cell per week label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRow {
    pub kind: StatKind,
    pub cells: BTreeMap<String, String>,
}

impl StatRow {
    pub fn cell(&self, week: &str) -> &str {
        self.cells.get(week).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceRow {
    Member(MemberRow),
    Lock(LockRow),
    Stat(StatRow),
}

/// Reconciled, persistable attendance table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceSheet {
    pub headers: Vec<String>,
    pub rows: Vec<AttendanceRow>,
}

impl AttendanceSheet {
    pub fn member_rows(&self) -> impl Iterator<Item = &MemberRow> {
        self.rows.iter().filter_map(|row| match row {
            AttendanceRow::Member(member) => Some(member),
            _ => None,
        })
    }

    pub fn lock(&self) -> Option<&LockRow> {
        self.rows.iter().find_map(|row| match row {
            AttendanceRow::Lock(lock) => Some(lock),
            _ => None,
        })
    }

    pub fn stat(&self, kind: StatKind) -> Option<&StatRow> {
        self.rows.iter().find_map(|row| match row {
            AttendanceRow::Stat(stat) if stat.kind == kind => Some(stat),
            _ => None,
        })
    }
}

/// Sheet cells arrive as strings, numbers or nulls; all of them read as text.
pub mod text {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(from_value(&Value::deserialize(deserializer)?))
    }

    pub fn from_value(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attendance::AttendanceBook;
use crate::models::{AttendanceSheet, Member};
use crate::reconcile;
use crate::roster::Roster;
use crate::sheet::{self, RawSheet};

/// Local copy of the roster and attendance table that commands edit
/// between saves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingCopy {
    pub members: Vec<Member>,
    /// Remote member rows that could not be read; pushed back as they were.
    pub skipped_members: Vec<Value>,
    pub attendance: RawSheet,
}

impl WorkingCopy {
    /// A missing file is an empty working copy.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no working copy yet, starting empty");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("{} is not a working copy", path.display()))
    }

    /// Writes to a sibling temp file first so a failed write keeps the old copy.
    pub fn store(&self, path: &Path) -> anyhow::Result<()> {
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }

    pub fn roster(&self) -> Roster {
        Roster::new(self.members.clone())
    }

    pub fn book(&self) -> AttendanceBook {
        AttendanceBook::from_rows(sheet::from_raw(&self.attendance).rows)
    }

    /// Replaces both halves with the reconciled result and returns it.
    pub fn apply(&mut self, roster: Roster, book: AttendanceBook, year: i32) -> AttendanceSheet {
        let members = roster.into_members();
        let reconciled = reconcile::reconcile(&members, &book.into_rows(), year);
        self.members = members;
        self.attendance = sheet::to_raw(&reconciled);
        reconciled
    }

    /// Keeps unsaved attendance edits. Statistic rows are left out until
    /// the next [`WorkingCopy::apply`].
    pub fn stage(&mut self, book: AttendanceBook) {
        self.attendance = sheet::to_raw(&AttendanceSheet {
            headers: reconcile::sheet_headers(),
            rows: book.into_rows(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mark;
    use crate::roster::tests::{date, student};

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("nursery-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_file_loads_empty() {
        let copy = WorkingCopy::load(&temp_path()).unwrap();
        assert!(copy.members.is_empty());
        assert!(copy.attendance.records.is_empty());
    }

    #[test]
    fn store_then_load_keeps_everything() {
        let path = temp_path();
        let mut copy = WorkingCopy::default();
        let mut roster = copy.roster();
        roster.create(student("", "서연", "1반"), date(2026, 3, 1)).unwrap();
        copy.apply(roster, AttendanceBook::default(), 2026);

        copy.store(&path).unwrap();
        let loaded = WorkingCopy::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, copy);
        assert_eq!(loaded.members[0].reg_date, Some(date(2026, 3, 1)));
    }

    #[test]
    fn staged_marks_survive_until_applied() {
        let mut copy = WorkingCopy::default();
        let mut roster = copy.roster();
        roster.create(student("", "서연", "1반"), date(2026, 1, 1)).unwrap();
        copy.apply(roster, AttendanceBook::default(), 2026);

        let member = copy.members[0].clone();
        let mut book = copy.book();
        book.set_mark(&member, "3월 1주차", Mark::Present).unwrap();
        copy.stage(book);

        assert_eq!(copy.book().mark(&member, "3월 1주차"), Some(Mark::Present));

        let sheet = copy.apply(copy.roster(), copy.book(), 2026);
        let ratio = sheet.stat(crate::models::StatKind::StudentAttendance).unwrap();
        assert_eq!(ratio.cell("3월 1주차"), "1/1");
    }
}

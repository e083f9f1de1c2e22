use std::collections::HashMap;

use crate::calendar::{self, WeekHeader};
use crate::error::NurseryError;
use crate::models::{AttendanceRow, LockRow, Mark, Member, MemberRow, MemberType, WeekLock};
use crate::roster;

/// Identity of an attendance row: the member id, or name + type for rows
/// that were never given one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Id(String),
    Composite(String, MemberType),
}

impl RecordKey {
    pub fn of_row(row: &MemberRow) -> Self {
        match row.member_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => RecordKey::Id(id.to_string()),
            _ => RecordKey::Composite(row.name.clone(), row.member_type),
        }
    }

    fn composite(member: &Member) -> Self {
        RecordKey::Composite(member.name.clone(), member.member_type)
    }
}

/// Lookup from member to prior row.
///
/// Rows that share a key are folded into one, with a present mark beating
/// an absent one, so the result never depends on input order.
#[derive(Debug, Default)]
pub struct RecordIndex {
    rows: HashMap<RecordKey, MemberRow>,
}

impl RecordIndex {
    pub fn build<'a>(rows: impl IntoIterator<Item = &'a MemberRow>) -> Self {
        let mut index: HashMap<RecordKey, MemberRow> = HashMap::new();
        for row in rows {
            match index.get_mut(&RecordKey::of_row(row)) {
                Some(existing) => merge_marks(existing, row),
                None => {
                    index.insert(RecordKey::of_row(row), row.clone());
                }
            }
        }
        Self { rows: index }
    }

    /// Id first, then the name + type fallback for id-less rows.
    pub fn resolve(&self, member: &Member) -> Option<&MemberRow> {
        self.rows
            .get(&RecordKey::Id(member.id.clone()))
            .or_else(|| self.rows.get(&RecordKey::composite(member)))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

fn merge_marks(into: &mut MemberRow, other: &MemberRow) {
    for (week, mark) in &other.marks {
        into.marks
            .entry(week.clone())
            .and_modify(|current| {
                if *mark == Mark::Present {
                    *current = Mark::Present;
                }
            })
            .or_insert(*mark);
    }
}

fn lookup_week(label: &str) -> Result<WeekHeader, NurseryError> {
    calendar::find_week(label).ok_or_else(|| NurseryError::UnknownWeek(label.to_string()))
}

/// Working attendance state between saves: member rows as last loaded or
/// edited, plus the lock flags.
#[derive(Debug, Clone, Default)]
pub struct AttendanceBook {
    rows: Vec<MemberRow>,
    lock: LockRow,
}

impl AttendanceBook {
    /// Statistic rows are dropped; they are recomputed on every save.
    pub fn from_rows(rows: Vec<AttendanceRow>) -> Self {
        let mut book = Self::default();
        let mut seen_lock = false;
        for row in rows {
            match row {
                AttendanceRow::Member(member) => book.rows.push(member),
                AttendanceRow::Lock(lock) if !seen_lock => {
                    book.lock = lock;
                    seen_lock = true;
                }
                AttendanceRow::Lock(_) => tracing::warn!("ignoring duplicate lock row"),
                AttendanceRow::Stat(_) => {}
            }
        }
        book
    }

    pub fn into_rows(self) -> Vec<AttendanceRow> {
        self.rows
            .into_iter()
            .map(AttendanceRow::Member)
            .chain(std::iter::once(AttendanceRow::Lock(self.lock)))
            .collect()
    }

    pub fn is_locked(&self, week: &str) -> bool {
        self.lock.is_locked(week)
    }

    /// Position of the row for `member`, unified onto the member's id.
    ///
    /// Tries the id first; only when no row carries that id does it fall
    /// back to an id-less row with the same name and type. The matched row
    /// is stamped with the id before anything else touches it, so a later
    /// lookup cannot produce a second row.
    fn resolve_idx(&mut self, member: &Member) -> Option<usize> {
        let by_id = self
            .rows
            .iter()
            .position(|row| row.member_id.as_deref() == Some(member.id.as_str()));
        let idx = by_id.or_else(|| {
            let key = RecordKey::composite(member);
            self.rows.iter().position(|row| RecordKey::of_row(row) == key)
        })?;

        let row = &mut self.rows[idx];
        row.member_id = Some(member.id.clone());
        row.member_type = member.member_type;
        Some(idx)
    }

    fn row_for(&mut self, member: &Member) -> &mut MemberRow {
        let idx = match self.resolve_idx(member) {
            Some(idx) => idx,
            None => {
                self.rows.push(MemberRow::blank(member));
                self.rows.len() - 1
            }
        };
        &mut self.rows[idx]
    }

    #[cfg(test)]
    pub fn mark(&self, member: &Member, week: &str) -> Option<Mark> {
        RecordIndex::build(&self.rows)
            .resolve(member)
            .and_then(|row| row.mark(week))
    }

    fn ensure_editable(&self, member: &Member, week: &WeekHeader) -> Result<(), NurseryError> {
        if self.is_locked(&week.label) {
            return Err(NurseryError::WeekLocked {
                week: week.label.clone(),
            });
        }
        if !roster::is_active(member, week.date) {
            return Err(NurseryError::InactiveMember {
                name: member.name.clone(),
                week: week.label.clone(),
            });
        }
        Ok(())
    }

    /// Sets one cell, as the grid checkbox does.
    pub fn set_mark(&mut self, member: &Member, week: &str, mark: Mark) -> Result<(), NurseryError> {
        let week = lookup_week(week)?;
        self.ensure_editable(member, &week)?;
        self.row_for(member).marks.insert(week.label, mark);
        Ok(())
    }

    /// Flips one cell between `O` and `X`; an unmarked cell becomes `O`.
    pub fn toggle(&mut self, member: &Member, week: &str) -> Result<Mark, NurseryError> {
        let week = lookup_week(week)?;
        self.ensure_editable(member, &week)?;
        let row = self.row_for(member);
        let next = row
            .mark(&week.label)
            .map(Mark::flipped)
            .unwrap_or(Mark::Present);
        row.marks.insert(week.label, next);
        Ok(next)
    }

    /// "Select all" for one week: clears every mark when every active
    /// member is already present, otherwise fills every mark. Returns the
    /// mark that was written.
    pub fn bulk_select(&mut self, members: &[Member], week: &str) -> Result<Mark, NurseryError> {
        let week = lookup_week(week)?;
        if self.is_locked(&week.label) {
            return Err(NurseryError::WeekLocked { week: week.label });
        }

        let index = RecordIndex::build(&self.rows);
        let all_present = members
            .iter()
            .filter(|m| roster::is_active(m, week.date))
            .all(|m| index.resolve(m).is_some_and(|row| row.is_present(&week.label)));
        let target = if all_present { Mark::Absent } else { Mark::Present };

        for member in members {
            self.row_for(member).marks.insert(week.label.clone(), target);
        }
        Ok(target)
    }

    pub fn lock_week(&mut self, week: &str) -> Result<(), NurseryError> {
        let week = lookup_week(week)?;
        self.lock.weeks.insert(week.label, WeekLock::Locked);
        Ok(())
    }

    /// Unlocking hides absentee names again, so it has to be confirmed.
    pub fn unlock_week(&mut self, week: &str, confirmed: bool) -> Result<(), NurseryError> {
        let week = lookup_week(week)?;
        if !self.is_locked(&week.label) {
            return Ok(());
        }
        if !confirmed {
            return Err(NurseryError::UnlockNotConfirmed { week: week.label });
        }
        self.lock.weeks.remove(&week.label);
        Ok(())
    }
}

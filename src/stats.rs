use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::attendance::RecordIndex;
use crate::calendar::WeekHeader;
use crate::dates;
use crate::models::{LockRow, Member, MemberType, StatKind, StatRow};
use crate::roster;

/// Inputs shared by every statistic row of one save.
pub struct StatContext<'a> {
    /// Members in canonical order.
    pub members: &'a [&'a Member],
    pub index: &'a RecordIndex,
    pub lock: &'a LockRow,
    pub weeks: &'a [WeekHeader],
    /// Year birthdays are projected onto.
    pub year: i32,
}

impl StatContext<'_> {
    fn present(&self, member: &Member, week: &str) -> bool {
        self.index
            .resolve(member)
            .is_some_and(|row| row.is_present(week))
    }

    fn active(&self, filter: Option<MemberType>, week: &WeekHeader) -> Vec<&Member> {
        self.members
            .iter()
            .copied()
            .filter(|m| filter.map_or(true, |t| m.member_type == t))
            .filter(|m| roster::is_active(m, week.date))
            .collect()
    }

    fn row(&self, kind: StatKind, cell: impl Fn(&WeekHeader) -> String) -> StatRow {
        let cells: BTreeMap<String, String> = self
            .weeks
            .iter()
            .map(|week| (week.label.clone(), cell(week)))
            .collect();
        StatRow { kind, cells }
    }

    pub fn build(&self, kind: StatKind) -> StatRow {
        match kind {
            StatKind::StudentAttendance => self.attendance(kind, Some(MemberType::Student)),
            StatKind::TeacherAttendance => self.attendance(kind, Some(MemberType::Teacher)),
            StatKind::TotalAttendance => self.attendance(kind, None),
            StatKind::Transfers => self.transfers(),
            StatKind::StudentAbsentees => self.absentees(kind, MemberType::Student),
            StatKind::TeacherAbsentees => self.absentees(kind, MemberType::Teacher),
            StatKind::Birthdays => self.birthdays(),
        }
    }

    /// `<attended>/<total>` over members active that Sunday.
    fn attendance(&self, kind: StatKind, filter: Option<MemberType>) -> StatRow {
        self.row(kind, |week| {
            let (attended, total) = self
                .active(filter, week)
                .into_iter()
                .fold((0usize, 0usize), |(attended, total), member| {
                    let hit = usize::from(self.present(member, &week.label));
                    (attended + hit, total + 1)
                });
            format!("{attended}/{total}")
        })
    }

    /// Names of active members without an `O`, revealed only once the week
    /// is locked.
    fn absentees(&self, kind: StatKind, member_type: MemberType) -> StatRow {
        self.row(kind, |week| {
            if !self.lock.is_locked(&week.label) {
                return String::new();
            }
            self.active(Some(member_type), week)
                .into_iter()
                .filter(|m| !self.present(m, &week.label))
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    /// Registrations and departures dated inside the week's Sunday-Saturday
    /// span.
    fn transfers(&self) -> StatRow {
        self.row(StatKind::Transfers, |week| {
            let mut entries = Vec::new();
            for member in self.members {
                if let Some(reg) = member.reg_date.filter(|d| week.contains(*d)) {
                    entries.push(format!("{}\n({} 전입)", member.name, dates::month_day(reg)));
                }
                if let Some(leave) = member.leave_date.filter(|d| week.contains(*d)) {
                    entries.push(format!("{}\n({} 전출)", member.name, dates::month_day(leave)));
                }
            }
            entries.join("\n\n")
        })
    }

    fn birthdays(&self) -> StatRow {
        self.row(StatKind::Birthdays, |week| {
            self.members
                .iter()
                .filter_map(|member| {
                    let birth = member.birth_date?;
                    let observed = birthday_in(birth, self.year)?;
                    week.contains(observed).then(|| {
                        format!("{}\n({}월 {}일)", member.name, birth.month(), birth.day())
                    })
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
    }
}

/// The birthday's date in `year`. A 29 February birthday falls on 1 March
/// in common years.
pub fn birthday_in(birth: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birth.month(), birth.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar;
    use crate::models::{Mark, MemberRow, WeekLock};
    use crate::roster::tests::{date, student, teacher};

    fn marked(member: &Member, week: &str, mark: Mark) -> MemberRow {
        let mut row = MemberRow::blank(member);
        row.marks.insert(week.to_string(), mark);
        row
    }

    fn build(
        members: &[Member],
        rows: &[MemberRow],
        lock: &LockRow,
        kind: StatKind,
    ) -> StatRow {
        let ordered = roster::canonical_order(members);
        let index = RecordIndex::build(rows);
        let weeks = calendar::year_weeks();
        let ctx = StatContext {
            members: &ordered,
            index: &index,
            lock,
            weeks: &weeks,
            year: 2026,
        };
        ctx.build(kind)
    }

    #[test]
    fn student_ratio_counts_unmarked_as_absent() {
        let a = student("a", "A", "1반");
        let b = student("b", "B", "1반");
        let rows = vec![marked(&a, "3월 1주차", Mark::Present)];
        let stat = build(&[a, b], &rows, &LockRow::default(), StatKind::StudentAttendance);
        assert_eq!(stat.cell("3월 1주차"), "1/2");
        assert_eq!(stat.cell("3월 2주차"), "0/2");
    }

    #[test]
    fn ratio_excludes_inactive_members() {
        let a = student("a", "A", "1반");
        let late = Member {
            reg_date: Some(date(2026, 3, 9)),
            ..student("b", "B", "1반")
        };
        let t = teacher("t", "T", "1반");
        let rows = vec![marked(&t, "3월 2주차", Mark::Present)];
        let members = [a, late, t];

        let students = build(&members, &rows, &LockRow::default(), StatKind::StudentAttendance);
        assert_eq!(students.cell("3월 2주차"), "0/1");
        assert_eq!(students.cell("3월 3주차"), "0/2");

        let total = build(&members, &rows, &LockRow::default(), StatKind::TotalAttendance);
        assert_eq!(total.cell("3월 2주차"), "1/2");
        let teachers = build(&members, &rows, &LockRow::default(), StatKind::TeacherAttendance);
        assert_eq!(teachers.cell("3월 2주차"), "1/1");
    }

    #[test]
    fn transfer_entry_lands_in_departure_week_only() {
        let c = Member {
            leave_date: Some(date(2026, 3, 10)),
            ..student("c", "C", "1반")
        };
        let stat = build(&[c], &[], &LockRow::default(), StatKind::Transfers);
        assert_eq!(stat.cell("3월 2주차"), "C\n(03-10 전출)");
        assert_eq!(stat.cell("3월 3주차"), "");
    }

    #[test]
    fn transfers_join_entries_with_blank_line() {
        let a = Member {
            reg_date: Some(date(2026, 3, 8)),
            ..student("a", "A", "1반")
        };
        let b = Member {
            leave_date: Some(date(2026, 3, 14)),
            ..student("b", "B", "1반")
        };
        let stat = build(&[b, a], &[], &LockRow::default(), StatKind::Transfers);
        assert_eq!(stat.cell("3월 2주차"), "A\n(03-08 전입)\n\nB\n(03-14 전출)");
    }

    #[test]
    fn absentees_hidden_until_locked() {
        let a = student("a", "A", "1반");
        let b = student("b", "B", "1반");
        let rows = vec![marked(&a, "3월 1주차", Mark::Present)];
        let members = [a, b];

        let open = build(&members, &rows, &LockRow::default(), StatKind::StudentAbsentees);
        assert_eq!(open.cell("3월 1주차"), "");

        let mut lock = LockRow::default();
        lock.weeks.insert("3월 1주차".into(), WeekLock::Locked);
        let closed = build(&members, &rows, &lock, StatKind::StudentAbsentees);
        assert_eq!(closed.cell("3월 1주차"), "B");
        assert_eq!(closed.cell("3월 2주차"), "");

        let teachers = build(&members, &rows, &lock, StatKind::TeacherAbsentees);
        assert_eq!(teachers.cell("3월 1주차"), "");
    }

    #[test]
    fn birthdays_ignore_birth_year() {
        let kid = Member {
            birth_date: Some(date(2022, 3, 12)),
            ..student("a", "하린", "1반")
        };
        let stat = build(&[kid], &[], &LockRow::default(), StatKind::Birthdays);
        assert_eq!(stat.cell("3월 2주차"), "하린\n(3월 12일)");
        assert_eq!(stat.cell("3월 1주차"), "");
    }

    #[test]
    fn birthdays_projected_outside_the_table_year_find_no_week() {
        let kid = Member {
            birth_date: Some(date(2022, 3, 12)),
            ..student("a", "하린", "1반")
        };
        let members = [kid];
        let ordered = roster::canonical_order(&members);
        let index = RecordIndex::default();
        let lock = LockRow::default();
        let weeks = calendar::year_weeks();
        let ctx = StatContext {
            members: &ordered,
            index: &index,
            lock: &lock,
            weeks: &weeks,
            year: 2027,
        };
        let stat = ctx.build(StatKind::Birthdays);
        assert!(weeks.iter().all(|w| stat.cell(&w.label).is_empty()));
        assert!(!calendar::covers_year(2027));
    }

    #[test]
    fn leap_day_birthday_moves_to_first_of_march() {
        assert_eq!(birthday_in(date(2020, 2, 29), 2026), Some(date(2026, 3, 1)));
        assert_eq!(birthday_in(date(2020, 2, 29), 2028), Some(date(2028, 2, 29)));
    }
}

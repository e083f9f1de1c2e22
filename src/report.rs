use std::fmt::Write;

use chrono::NaiveDate;

use crate::calendar::MonthRange;
use crate::duties::DutyRoster;
use crate::models::{AttendanceSheet, Member, MemberType, StatKind};
use crate::roster;

/// Folds a multi-line stat cell onto one line.
fn one_line(cell: &str, separator: &str) -> String {
    cell.split('\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn build_report(
    range: MonthRange,
    members: &[Member],
    sheet: &AttendanceSheet,
    duties: Option<&DutyRoster>,
    today: NaiveDate,
) -> String {
    let weeks = range.weeks();
    let stat = |kind: StatKind, week: &str| -> String {
        sheet
            .stat(kind)
            .map(|row| row.cell(week).to_string())
            .unwrap_or_default()
    };
    let locked = |week: &str| sheet.lock().is_some_and(|lock| lock.is_locked(week));

    let mut output = String::new();
    let _ = writeln!(output, "# Nursery Attendance Report");
    let _ = writeln!(output, "Generated for {} (as of {})", range.label(), today);
    let _ = writeln!(output);

    let _ = writeln!(output, "## Roster");
    let active_students = members
        .iter()
        .filter(|m| m.member_type == MemberType::Student && roster::is_active(m, today))
        .count();
    let active_teachers = members
        .iter()
        .filter(|m| m.member_type == MemberType::Teacher && roster::is_active(m, today))
        .count();
    let _ = writeln!(
        output,
        "- 실 인원: 학생 {}명, 교사 {}명",
        active_students, active_teachers
    );
    for member in roster::canonical_order(members) {
        let label = roster::inactive_label(member, today);
        if !label.is_empty() {
            let _ = writeln!(output, "- ~~{}~~ {}", member.name, label);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Attendance");
    for week in &weeks {
        let _ = writeln!(
            output,
            "- {} {}: 학생 {}, 교사 {}, 전체 {}{}",
            week.label,
            week.display_date(),
            stat(StatKind::StudentAttendance, &week.label),
            stat(StatKind::TeacherAttendance, &week.label),
            stat(StatKind::TotalAttendance, &week.label),
            if locked(&week.label) { " (마감)" } else { "" }
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Absentees");
    let locked_weeks: Vec<_> = weeks.iter().filter(|w| locked(&w.label)).collect();
    if locked_weeks.is_empty() {
        let _ = writeln!(output, "No locked weeks in this range.");
    } else {
        for week in locked_weeks {
            let students = one_line(&stat(StatKind::StudentAbsentees, &week.label), ", ");
            let teachers = one_line(&stat(StatKind::TeacherAbsentees, &week.label), ", ");
            let _ = writeln!(
                output,
                "- {}: 학생 [{}], 교사 [{}]",
                week.label, students, teachers
            );
        }
    }

    for (title, kind) in [
        ("Transfers", StatKind::Transfers),
        ("Birthdays", StatKind::Birthdays),
    ] {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {title}");
        let mut any = false;
        for week in &weeks {
            let cell = stat(kind, &week.label);
            if cell.is_empty() {
                continue;
            }
            any = true;
            let entries: Vec<String> = cell
                .split("\n\n")
                .flat_map(|chunk| {
                    let lines: Vec<&str> = chunk.lines().collect();
                    lines
                        .chunks(2)
                        .map(|pair| pair.join(" "))
                        .collect::<Vec<_>>()
                })
                .collect();
            let _ = writeln!(output, "- {}: {}", week.label, entries.join(", "));
        }
        if !any {
            let _ = writeln!(output, "None in this range.");
        }
    }

    if let Some(duties) = duties {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Duties");
        for month in range.months() {
            let verses = duties.verses_for_month(month);
            if !verses.is_empty() {
                let _ = writeln!(output, "- {}월 암송말씀: {}", month, verses.join(" / "));
            }
        }
        for week in &weeks {
            let assigned = duties.for_week(&week.label);
            let _ = writeln!(
                output,
                "- {}: 기도 {}, 헌금 {}, 청소 {}",
                week.label,
                assigned.prayer.unwrap_or("-"),
                assigned.offering.unwrap_or("-"),
                if assigned.cleaning.is_empty() {
                    "-".to_string()
                } else {
                    assigned.cleaning.join(", ")
                }
            );
        }
    }

    output
}

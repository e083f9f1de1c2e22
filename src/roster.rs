use std::cmp::Ordering;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::dates;
use crate::error::NurseryError;
use crate::models::{DateField, Member, MemberType};

/// True unless `date` is strictly before registration or strictly after
/// departure. Compared day-by-day, never by timestamp.
pub fn is_active(member: &Member, date: NaiveDate) -> bool {
    let day = dates::ymd_key(date);
    if let Some(reg) = member.reg_date {
        if day < dates::ymd_key(reg) {
            return false;
        }
    }
    if let Some(leave) = member.leave_date {
        if day > dates::ymd_key(leave) {
            return false;
        }
    }
    true
}

/// Suffix shown next to struck-through names.
pub fn inactive_label(member: &Member, today: NaiveDate) -> &'static str {
    if member.reg_date.is_some_and(|reg| today < reg) {
        return "(등록전)";
    }
    if member.leave_date.is_some_and(|leave| today > leave) {
        return "(전출)";
    }
    ""
}

/// Name ordering: case-insensitive first, raw code points as tie-break.
/// Hangul syllables are already in dictionary order by code point.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn by_group_then_name(a: &Member, b: &Member) -> Ordering {
    collate(&a.group, &b.group).then_with(|| collate(&a.name, &b.name))
}

/// Students by (group, name), then teachers by (group, name). Ties fall
/// back to id so the order never depends on input order.
pub fn canonical_order(members: &[Member]) -> Vec<&Member> {
    let mut ordered: Vec<&Member> = members.iter().collect();
    ordered.sort_by(|a, b| {
        a.member_type
            .cmp(&b.member_type)
            .then_with(|| by_group_then_name(a, b))
            .then_with(|| a.id.cmp(&b.id))
    });
    ordered
}

/// Links teachers and students through their shared group.
///
/// A student's `teacher` becomes the name of the first teacher in roster
/// order with the same group (empty when there is none). A teacher's
/// `assignedStudents` becomes the sorted, comma-joined names of that
/// group's students. Applying it twice changes nothing.
pub fn auto_map(members: &[Member]) -> Vec<Member> {
    members
        .iter()
        .map(|member| {
            let mut mapped = member.clone();
            match member.member_type {
                MemberType::Student => {
                    mapped.teacher = members
                        .iter()
                        .find(|t| t.member_type == MemberType::Teacher && t.group == member.group)
                        .map(|t| t.name.clone())
                        .unwrap_or_default();
                }
                MemberType::Teacher => {
                    let mut names: Vec<&str> = members
                        .iter()
                        .filter(|s| s.member_type == MemberType::Student && s.group == member.group)
                        .map(|s| s.name.as_str())
                        .collect();
                    names.sort_by(|a, b| collate(a, b));
                    mapped.assigned_students = names.join(", ");
                }
            }
            mapped
        })
        .collect()
}

/// Field edits from the member form. `None` leaves a field untouched;
/// for dates, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub member_type: Option<MemberType>,
    pub age: Option<String>,
    pub position: Option<String>,
    pub group: Option<String>,
    pub prayer: Option<String>,
    pub birth_date: Option<Option<NaiveDate>>,
    pub reg_date: Option<Option<NaiveDate>>,
    pub leave_date: Option<Option<NaiveDate>>,
    pub photo_url: Option<String>,
}

impl MemberPatch {
    pub fn apply(&self, member: &mut Member) {
        if let Some(name) = &self.name {
            member.name = name.trim().to_string();
        }
        if let Some(member_type) = self.member_type {
            member.member_type = member_type;
        }
        if let Some(age) = &self.age {
            member.age = age.clone();
        }
        if let Some(position) = &self.position {
            member.position = position.clone();
        }
        if let Some(group) = &self.group {
            member.group = group.trim().to_string();
        }
        if let Some(prayer) = &self.prayer {
            member.prayer = prayer.clone();
        }
        if let Some(birth_date) = self.birth_date {
            member.set_date(DateField::Birth, birth_date);
        }
        if let Some(reg_date) = self.reg_date {
            member.set_date(DateField::Registration, reg_date);
        }
        if let Some(leave_date) = self.leave_date {
            member.set_date(DateField::Leave, leave_date);
        }
        if let Some(photo_url) = &self.photo_url {
            member.photo_url = photo_url.clone();
        }
    }
}

/// In-memory roster. Every mutation re-runs [`auto_map`].
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn into_members(self) -> Vec<Member> {
        self.members
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Looks a member up by id, or by name when that name is unique.
    pub fn find(&self, key: &str) -> Result<&Member, NurseryError> {
        let key = key.trim();
        if let Some(member) = self.get(key) {
            return Ok(member);
        }
        let mut named = self.members.iter().filter(|m| m.name == key);
        match (named.next(), named.next()) {
            (Some(member), None) => Ok(member),
            (Some(_), Some(_)) => Err(NurseryError::Validation(format!(
                "more than one member is named {key}; use the id"
            ))),
            (None, _) => Err(NurseryError::MemberNotFound(key.to_string())),
        }
    }

    /// Gives every id-less member (rows typed straight into the sheet) a
    /// fresh id. Returns how many were assigned.
    pub fn assign_missing_ids(&mut self) -> usize {
        let mut assigned = 0;
        for member in self.members.iter_mut().filter(|m| m.id.trim().is_empty()) {
            member.id = Uuid::new_v4().to_string();
            assigned += 1;
        }
        if assigned > 0 {
            tracing::info!(assigned, "assigned ids to members without one");
        }
        assigned
    }

    /// Adds a member from the form. The id is always freshly generated and
    /// registration defaults to `today`.
    pub fn create(&mut self, mut member: Member, today: NaiveDate) -> Result<&Member, NurseryError> {
        member.name = member.name.trim().to_string();
        member.group = member.group.trim().to_string();
        if member.name.is_empty() {
            return Err(NurseryError::Validation("name is required".into()));
        }
        member.id = Uuid::new_v4().to_string();
        if member.reg_date.is_none() {
            member.reg_date = Some(today);
        }

        let id = member.id.clone();
        self.members.push(member);
        self.remap();
        self.get(&id)
            .ok_or(NurseryError::MemberNotFound(id))
    }

    pub fn update(&mut self, id: &str, patch: &MemberPatch) -> Result<&Member, NurseryError> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| NurseryError::MemberNotFound(id.to_string()))?;

        let mut edited = member.clone();
        patch.apply(&mut edited);
        if edited.name.is_empty() {
            return Err(NurseryError::Validation("name is required".into()));
        }
        *member = edited;

        self.remap();
        self.get(id)
            .ok_or_else(|| NurseryError::MemberNotFound(id.to_string()))
    }

    pub fn delete(&mut self, id: &str) -> Result<Member, NurseryError> {
        let idx = self
            .members
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| NurseryError::MemberNotFound(id.to_string()))?;
        let removed = self.members.remove(idx);
        self.remap();
        Ok(removed)
    }

    pub fn remap(&mut self) {
        self.members = auto_map(&self.members);
    }

    pub fn active_count(&self, member_type: MemberType, date: NaiveDate) -> usize {
        self.members
            .iter()
            .filter(|m| m.member_type == member_type && is_active(m, date))
            .count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn student(id: &str, name: &str, group: &str) -> Member {
        Member {
            id: id.to_string(),
            name: name.to_string(),
            member_type: MemberType::Student,
            group: group.to_string(),
            ..Member::default()
        }
    }

    pub(crate) fn teacher(id: &str, name: &str, group: &str) -> Member {
        Member {
            member_type: MemberType::Teacher,
            ..student(id, name, group)
        }
    }

    #[test]
    fn unbounded_member_is_always_active() {
        let member = student("a", "A", "1반");
        assert!(is_active(&member, date(1990, 1, 1)));
        assert!(is_active(&member, date(2099, 12, 31)));
    }

    #[test]
    fn active_window_is_inclusive() {
        let member = Member {
            reg_date: Some(date(2026, 3, 8)),
            leave_date: Some(date(2026, 3, 10)),
            ..student("a", "A", "1반")
        };
        assert!(!is_active(&member, date(2026, 3, 7)));
        assert!(is_active(&member, date(2026, 3, 8)));
        assert!(is_active(&member, date(2026, 3, 10)));
        assert!(!is_active(&member, date(2026, 3, 11)));
    }

    #[test]
    fn inactive_labels() {
        let member = Member {
            reg_date: Some(date(2026, 3, 8)),
            leave_date: Some(date(2026, 6, 1)),
            ..student("a", "A", "1반")
        };
        assert_eq!(inactive_label(&member, date(2026, 3, 1)), "(등록전)");
        assert_eq!(inactive_label(&member, date(2026, 4, 1)), "");
        assert_eq!(inactive_label(&member, date(2026, 6, 2)), "(전출)");
    }

    #[test]
    fn auto_map_links_by_group() {
        let members = vec![
            student("s1", "서연", "1반"),
            student("s2", "민준", "1반"),
            student("s3", "하준", "2반"),
            teacher("t1", "김선생", "1반"),
        ];
        let mapped = auto_map(&members);

        assert_eq!(mapped[0].teacher, "김선생");
        assert_eq!(mapped[1].teacher, "김선생");
        assert_eq!(mapped[2].teacher, "");
        assert_eq!(mapped[3].assigned_students, "민준, 서연");
    }

    #[test]
    fn auto_map_picks_first_teacher_in_roster_order() {
        let members = vec![
            teacher("t2", "박선생", "1반"),
            student("s1", "서연", "1반"),
            teacher("t1", "김선생", "1반"),
        ];
        let mapped = auto_map(&members);
        assert_eq!(mapped[1].teacher, "박선생");
        assert_eq!(mapped[0].assigned_students, "서연");
        assert_eq!(mapped[2].assigned_students, "서연");
    }

    #[test]
    fn auto_map_is_idempotent() {
        let members = vec![
            student("s1", "서연", "1반"),
            Member {
                teacher: "stale".into(),
                ..student("s2", "민준", "3반")
            },
            teacher("t1", "김선생", "1반"),
            Member {
                assigned_students: "nobody".into(),
                ..teacher("t2", "이선생", "2반")
            },
        ];
        let once = auto_map(&members);
        let twice = auto_map(&once);
        assert_eq!(once, twice);
        assert_eq!(once[3].assigned_students, "");
    }

    #[test]
    fn canonical_order_puts_students_first() {
        let members = vec![
            teacher("t1", "김선생", "1반"),
            student("s3", "하준", "2반"),
            student("s2", "민준", "1반"),
            student("s1", "서연", "1반"),
            teacher("t0", "가선생", "1반"),
        ];
        let names: Vec<&str> = canonical_order(&members)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["민준", "서연", "하준", "가선생", "김선생"]);
    }

    #[test]
    fn create_validates_and_assigns_id() {
        let mut roster = Roster::new(vec![teacher("t1", "김선생", "1반")]);
        let err = roster
            .create(student("", "  ", "1반"), date(2026, 3, 1))
            .unwrap_err();
        assert!(matches!(err, NurseryError::Validation(_)));

        let created = roster
            .create(student("ignored", "서연", "1반"), date(2026, 3, 1))
            .unwrap()
            .clone();
        assert_ne!(created.id, "ignored");
        assert!(!created.id.is_empty());
        assert_eq!(created.reg_date, Some(date(2026, 3, 1)));
        assert_eq!(created.teacher, "김선생");
        assert_eq!(roster.get("t1").unwrap().assigned_students, "서연");
    }

    #[test]
    fn update_and_delete_remap() {
        let mut roster = Roster::new(vec![
            student("s1", "서연", "1반"),
            teacher("t1", "김선생", "1반"),
            teacher("t2", "이선생", "2반"),
        ]);
        roster.remap();

        let patch = MemberPatch {
            group: Some("2반".into()),
            ..MemberPatch::default()
        };
        roster.update("s1", &patch).unwrap();
        assert_eq!(roster.get("s1").unwrap().teacher, "이선생");
        assert_eq!(roster.get("t1").unwrap().assigned_students, "");

        roster.delete("t2").unwrap();
        assert_eq!(roster.get("s1").unwrap().teacher, "");
        assert!(matches!(
            roster.delete("t2"),
            Err(NurseryError::MemberNotFound(_))
        ));
    }

    #[test]
    fn update_rejects_blank_name() {
        let mut roster = Roster::new(vec![student("s1", "서연", "1반")]);
        let patch = MemberPatch {
            name: Some(" ".into()),
            ..MemberPatch::default()
        };
        assert!(roster.update("s1", &patch).is_err());
        assert_eq!(roster.get("s1").unwrap().name, "서연");
    }

    #[test]
    fn find_by_id_or_unique_name() {
        let roster = Roster::new(vec![
            student("s1", "서연", "1반"),
            student("s2", "민준", "1반"),
            student("s3", "민준", "2반"),
        ]);
        assert_eq!(roster.find("s1").unwrap().name, "서연");
        assert_eq!(roster.find("서연").unwrap().id, "s1");
        assert!(matches!(roster.find("민준"), Err(NurseryError::Validation(_))));
        assert!(matches!(roster.find("없음"), Err(NurseryError::MemberNotFound(_))));
    }

    #[test]
    fn assigns_missing_ids_once() {
        let mut roster = Roster::new(vec![student("", "서연", "1반"), student("s2", "민준", "1반")]);
        assert_eq!(roster.assign_missing_ids(), 1);
        assert_eq!(roster.assign_missing_ids(), 0);
        assert_eq!(roster.get("s2").unwrap().name, "민준");
    }
}

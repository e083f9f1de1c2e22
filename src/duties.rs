use std::collections::BTreeMap;

/// The four auxiliary schedules kept next to the attendance sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyKind {
    MemoryVerses,
    Prayer,
    Offering,
    Cleaning,
}

impl DutyKind {
    pub const ALL: [DutyKind; 4] = [
        DutyKind::MemoryVerses,
        DutyKind::Prayer,
        DutyKind::Offering,
        DutyKind::Cleaning,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DutyKind::MemoryVerses => "암송말씀",
            DutyKind::Prayer => "기도",
            DutyKind::Offering => "헌금",
            DutyKind::Cleaning => "청소",
        }
    }
}

/// Reads a sheet CSV export into trimmed rows. Rows may be ragged.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(rows)
}

fn non_empty(row: &[String], idx: usize) -> Option<&str> {
    row.get(idx).map(|c| c.trim()).filter(|c| !c.is_empty())
}

/// Duty assignments, keyed by month number (verses) or week label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DutyRoster {
    pub memory_verses: BTreeMap<u32, Vec<String>>,
    pub prayer: BTreeMap<String, String>,
    pub offering: BTreeMap<String, String>,
    pub cleaning: BTreeMap<String, Vec<String>>,
}

/// Assignments for one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekDuties<'a> {
    pub prayer: Option<&'a str>,
    pub offering: Option<&'a str>,
    pub cleaning: &'a [String],
}

impl DutyRoster {
    /// Loads one schedule table. The first row is a header and is skipped.
    pub fn load(&mut self, kind: DutyKind, rows: &[Vec<String>]) {
        for row in rows.iter().skip(1) {
            match kind {
                DutyKind::MemoryVerses => {
                    let Some(label) = non_empty(row, 0) else { continue };
                    let Ok(month) = label.replace('월', "").trim().parse::<u32>() else {
                        tracing::warn!(label, "skipping memory verse row without a month");
                        continue;
                    };
                    let verses = [1, 2]
                        .into_iter()
                        .filter_map(|idx| non_empty(row, idx).map(str::to_string))
                        .collect();
                    self.memory_verses.insert(month, verses);
                }
                DutyKind::Prayer | DutyKind::Offering => {
                    let (Some(week), Some(person)) = (non_empty(row, 0), non_empty(row, 1)) else {
                        continue;
                    };
                    let target = if kind == DutyKind::Prayer {
                        &mut self.prayer
                    } else {
                        &mut self.offering
                    };
                    target.insert(week.to_string(), person.to_string());
                }
                DutyKind::Cleaning => {
                    let Some(week) = non_empty(row, 0) else { continue };
                    let pair = [1, 2]
                        .into_iter()
                        .filter_map(|idx| non_empty(row, idx).map(str::to_string))
                        .collect();
                    self.cleaning.insert(week.to_string(), pair);
                }
            }
        }
    }

    pub fn verses_for_month(&self, month: u32) -> &[String] {
        self.memory_verses
            .get(&month)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn for_week(&self, week: &str) -> WeekDuties<'_> {
        WeekDuties {
            prayer: self.prayer.get(week).map(String::as_str),
            offering: self.offering.get(week).map(String::as_str),
            cleaning: self.cleaning.get(week).map(Vec::as_slice).unwrap_or(&[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_ragged_csv() {
        let rows = parse_csv("월,말씀1,말씀2\n3월,\"요한복음 3:16, 개역\",\n4월\n").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], ["3월", "요한복음 3:16, 개역", ""]);
        assert_eq!(rows[2], ["4월"]);
    }

    #[test]
    fn loads_each_schedule() {
        let mut roster = DutyRoster::default();
        roster.load(
            DutyKind::MemoryVerses,
            &parse_csv("월,말씀1,말씀2\n3월,시편 23:1,\n4월,잠언 3:5,잠언 3:6\n메모,x,y\n").unwrap(),
        );
        roster.load(
            DutyKind::Prayer,
            &parse_csv("주차,이름\n3월 1주차,서연\n3월 2주차,\n").unwrap(),
        );
        roster.load(DutyKind::Offering, &parse_csv("주차,이름\n3월 1주차,민준\n").unwrap());
        roster.load(
            DutyKind::Cleaning,
            &parse_csv("주차,이름1,이름2\n3월 1주차,하준,\n3월 2주차,서연,민준\n").unwrap(),
        );

        assert_eq!(roster.verses_for_month(3), ["시편 23:1"]);
        assert_eq!(roster.verses_for_month(4), ["잠언 3:5", "잠언 3:6"]);
        assert!(roster.verses_for_month(5).is_empty());

        let first = roster.for_week("3월 1주차");
        assert_eq!(first.prayer, Some("서연"));
        assert_eq!(first.offering, Some("민준"));
        assert_eq!(first.cleaning, ["하준"]);

        let second = roster.for_week("3월 2주차");
        assert_eq!(second.prayer, None);
        assert_eq!(second.cleaning, ["서연", "민준"]);
    }
}

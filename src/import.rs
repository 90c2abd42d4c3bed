use std::fmt::Write;
use std::io;

use anyhow::Context;
use tracing::debug;

use crate::models::{Student, StudentMarks, Subject, DEFAULT_PARTICIPATION};

const PIN_COLUMN: &str = "PIN";
const NAME_COLUMN: &str = "Name";
const ATTENDANCE_COLUMN: &str = "ATTENDANCE";
const COMPONENTS: [&str; 4] = ["MID1", "MID2", "INTERNAL", "ENDSEM"];
const DEFAULT_SEMESTER: i32 = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub line: usize,
    pub pin: String,
    pub name: String,
    /// Component scores per catalog subject, in catalog order.
    pub scores: Vec<(String, [f64; 4])>,
    pub attendance: Option<f64>,
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub rows: Vec<ImportRow>,
    pub errors: Vec<String>,
}

impl ImportOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn expected_headers(subjects: &[Subject]) -> Vec<String> {
    let mut headers = vec![PIN_COLUMN.to_string(), NAME_COLUMN.to_string()];
    for subject in subjects {
        for component in COMPONENTS {
            headers.push(format!("{}_{}", subject.code, component));
        }
    }
    headers.push(ATTENDANCE_COLUMN.to_string());
    headers
}

/// Header plus a full-marks row and an 80% row.
pub fn csv_template(subjects: &[Subject]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", expected_headers(subjects).join(","));

    let full: Vec<String> = subjects
        .iter()
        .map(|s| {
            let caps = s.max_marks;
            format!("{},{},{},{}", caps.mid1, caps.mid2, caps.internal, caps.end_sem)
        })
        .collect();
    let _ = writeln!(output, "CS2021001,Alice Johnson,{},85", full.join(","));

    let eighty: Vec<String> = subjects
        .iter()
        .map(|s| {
            let caps = s.max_marks;
            format!(
                "{},{},{},{}",
                (caps.mid1 * 0.8).floor(),
                (caps.mid2 * 0.8).floor(),
                (caps.internal * 0.8).floor(),
                (caps.end_sem * 0.8).floor()
            )
        })
        .collect();
    let _ = writeln!(output, "CS2021002,Bob Wilson,{},78", eighty.join(","));

    output
}

fn lenient_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parses an uploaded mark sheet. Content problems are collected as messages;
/// only unreadable or malformed CSV is an error.
pub fn parse_marksheet<R: io::Read>(reader: R, subjects: &[Subject]) -> anyhow::Result<ImportOutcome> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let column = |name: &str| headers.iter().position(|header| header == name);

    let mut outcome = ImportOutcome::default();
    for header in expected_headers(subjects) {
        if column(header.as_str()).is_none() {
            outcome.errors.push(format!("Missing column: {header}"));
        }
    }
    if !outcome.errors.is_empty() {
        return Ok(outcome);
    }

    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV record {}", index + 1))?;
        // Blank lines are skipped by the reader but still count towards the line number.
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(index + 2);
        let field = |name: &str| column(name).and_then(|i| record.get(i)).unwrap_or("");

        let pin = field(PIN_COLUMN).to_string();
        let name = field(NAME_COLUMN).to_string();
        if pin.is_empty() || name.is_empty() {
            outcome.errors.push(format!("Row {line}: Missing PIN or Name"));
        }

        let mut scores = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let caps = subject.max_marks;
            let limits = [caps.mid1, caps.mid2, caps.internal, caps.end_sem];
            let mut values = [0.0; 4];

            for (slot, component) in COMPONENTS.iter().enumerate() {
                let header = format!("{}_{}", subject.code, component);
                let value = lenient_number(field(header.as_str())).unwrap_or(0.0);
                if value > limits[slot] {
                    outcome.errors.push(format!(
                        "Row {line}: {} {component} exceeds max marks ({})",
                        subject.code, limits[slot]
                    ));
                } else if value < 0.0 {
                    outcome.errors.push(format!(
                        "Row {line}: {} {component} cannot be negative",
                        subject.code
                    ));
                }
                values[slot] = value;
            }

            scores.push((subject.id.clone(), values));
        }

        outcome.rows.push(ImportRow {
            line,
            pin,
            name,
            scores,
            attendance: lenient_number(field(ATTENDANCE_COLUMN)).filter(|value| *value != 0.0),
        });
    }

    debug!(
        rows = outcome.rows.len(),
        errors = outcome.errors.len(),
        "parsed mark sheet"
    );
    Ok(outcome)
}

impl ImportRow {
    pub fn into_student(self) -> Student {
        let attendance = self.attendance.unwrap_or(DEFAULT_PARTICIPATION);
        let marks = self
            .scores
            .into_iter()
            .map(|(subject_id, [mid1, mid2, internal, end_sem])| StudentMarks {
                student_id: self.pin.clone(),
                subject_id,
                mid1,
                mid2,
                internal,
                end_sem,
                attendance: Some(attendance),
                assignment_completion: Some(DEFAULT_PARTICIPATION),
            })
            .collect();

        Student {
            id: self.pin.clone(),
            email: format!("{}@university.edu", self.pin.to_lowercase()),
            pin: self.pin,
            name: self.name,
            semester: DEFAULT_SEMESTER,
            marks: Vec::new(),
            prediction: None,
        }
        .with_marks(marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use crate::models::MaxMarks;

    fn single_subject() -> Vec<Subject> {
        vec![Subject {
            id: "sub1".to_string(),
            code: "CS401".to_string(),
            name: "Data Structures and Algorithms".to_string(),
            max_marks: MaxMarks {
                mid1: 20.0,
                mid2: 20.0,
                internal: 10.0,
                end_sem: 50.0,
            },
        }]
    }

    #[test]
    fn template_parses_cleanly() {
        let subjects = default_catalog();
        let template = csv_template(&subjects);
        let outcome = parse_marksheet(template.as_bytes(), &subjects).unwrap();

        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].pin, "CS2021001");
        assert_eq!(outcome.rows[0].scores[0].1, [20.0, 20.0, 10.0, 50.0]);
        assert_eq!(outcome.rows[1].scores[4].1, [16.0, 16.0, 8.0, 40.0]);
        assert_eq!(outcome.rows[1].attendance, Some(78.0));
    }

    #[test]
    fn reports_missing_columns_without_rows() {
        let subjects = single_subject();
        let csv = "PIN,Name,CS401_MID1,CS401_MID2,CS401_ENDSEM\nCS1,Alice,1,2,3\n";
        let outcome = parse_marksheet(csv.as_bytes(), &subjects).unwrap();

        assert!(outcome.rows.is_empty());
        assert_eq!(
            outcome.errors,
            vec![
                "Missing column: CS401_INTERNAL".to_string(),
                "Missing column: ATTENDANCE".to_string(),
            ]
        );
    }

    #[test]
    fn flags_over_cap_and_missing_identity() {
        let subjects = single_subject();
        let csv = "PIN,Name,CS401_MID1,CS401_MID2,CS401_INTERNAL,CS401_ENDSEM,ATTENDANCE\n\
                   CS1,Alice,21,10,5,40,90\n\
                   ,Bob,10,10,5,-1,80\n";
        let outcome = parse_marksheet(csv.as_bytes(), &subjects).unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(
            outcome.errors,
            vec![
                "Row 2: CS401 MID1 exceeds max marks (20)".to_string(),
                "Row 3: Missing PIN or Name".to_string(),
                "Row 3: CS401 ENDSEM cannot be negative".to_string(),
            ]
        );
    }

    #[test]
    fn row_numbers_count_blank_lines() {
        let subjects = single_subject();
        let csv = "PIN,Name,CS401_MID1,CS401_MID2,CS401_INTERNAL,CS401_ENDSEM,ATTENDANCE\n\
                   CS1,Alice,10,10,5,40,90\n\
                   \n\
                   CS2,Bob,25,10,5,40,80\n";
        let outcome = parse_marksheet(csv.as_bytes(), &subjects).unwrap();

        let lines: Vec<usize> = outcome.rows.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![2, 4]);
        assert_eq!(
            outcome.errors,
            vec!["Row 4: CS401 MID1 exceeds max marks (20)".to_string()]
        );
    }

    #[test]
    fn zero_attendance_falls_back_to_default() {
        let subjects = single_subject();
        let csv = "PIN,Name,CS401_MID1,CS401_MID2,CS401_INTERNAL,CS401_ENDSEM,ATTENDANCE\n\
                   CS1,Alice,10,10,5,40,0\n\
                   CS2,Bob,10,10,5,40,64\n";
        let outcome = parse_marksheet(csv.as_bytes(), &subjects).unwrap();
        assert!(outcome.is_valid());
        assert_eq!(outcome.rows[0].attendance, None);
        assert_eq!(outcome.rows[1].attendance, Some(64.0));

        let student = outcome.rows.into_iter().next().unwrap().into_student();
        assert_eq!(student.marks[0].attendance, Some(85.0));
    }

    #[test]
    fn unparseable_scores_become_zero_and_attendance_defaults() {
        let subjects = single_subject();
        let csv = "PIN,Name,CS401_MID1,CS401_MID2,CS401_INTERNAL,CS401_ENDSEM,ATTENDANCE\n\
                   CS2021007,Gita,abc,,5,40,\n";
        let outcome = parse_marksheet(csv.as_bytes(), &subjects).unwrap();
        assert!(outcome.is_valid());

        let student = outcome.rows.into_iter().next().unwrap().into_student();
        assert_eq!(student.id, "CS2021007");
        assert_eq!(student.email, "cs2021007@university.edu");
        assert_eq!(student.semester, 6);
        assert_eq!(student.marks.len(), 1);
        let marks = &student.marks[0];
        assert_eq!((marks.mid1, marks.mid2, marks.internal, marks.end_sem), (0.0, 0.0, 5.0, 40.0));
        assert_eq!(marks.attendance, Some(85.0));
        assert_eq!(marks.student_id, "CS2021007");
    }
}

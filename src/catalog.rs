use std::path::Path;

use anyhow::Context;

use crate::models::{MaxMarks, Subject};

const DEFAULT_SUBJECTS: [(&str, &str, &str); 5] = [
    ("sub1", "CS401", "Data Structures and Algorithms"),
    ("sub2", "CS402", "Database Management Systems"),
    ("sub3", "CS403", "Computer Networks"),
    ("sub4", "CS404", "Software Engineering"),
    ("sub5", "CS405", "Machine Learning"),
];

/// The semester's subject catalog used when no catalog file is configured.
pub fn default_catalog() -> Vec<Subject> {
    DEFAULT_SUBJECTS
        .iter()
        .map(|(id, code, name)| Subject {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            max_marks: MaxMarks {
                mid1: 20.0,
                mid2: 20.0,
                internal: 10.0,
                end_sem: 50.0,
            },
        })
        .collect()
}

pub fn load_catalog(path: &Path) -> anyhow::Result<Vec<Subject>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let subjects: Vec<Subject> = serde_json::from_str(&raw)
        .with_context(|| format!("catalog {} is not a JSON list of subjects", path.display()))?;
    validate_catalog(&subjects)?;
    Ok(subjects)
}

pub fn validate_catalog(subjects: &[Subject]) -> anyhow::Result<()> {
    if subjects.is_empty() {
        anyhow::bail!("subject catalog is empty");
    }

    for subject in subjects {
        let caps = subject.max_marks;
        if caps.mid1 <= 0.0 || caps.mid2 <= 0.0 || caps.internal <= 0.0 || caps.end_sem <= 0.0 {
            anyhow::bail!(
                "subject {} ({}) has a non-positive max mark",
                subject.code,
                subject.id
            );
        }
    }

    Ok(())
}

pub fn find_subject<'a>(subjects: &'a [Subject], id: &str) -> Option<&'a Subject> {
    subjects.iter().find(|subject| subject.id == id)
}

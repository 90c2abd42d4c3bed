use rand::Rng;

use crate::models::{Student, StudentMarks, Subject};

const NAMES: [&str; 15] = [
    "Alice Johnson",
    "Bob Wilson",
    "Charlie Brown",
    "Diana Prince",
    "Edward Smith",
    "Fiona Davis",
    "George Miller",
    "Hannah Garcia",
    "Ivan Rodriguez",
    "Julia Martinez",
    "Kevin Anderson",
    "Laura Taylor",
    "Michael Thomas",
    "Nina Hernandez",
    "Oliver Moore",
];

/// Every component lands between 10% and 100% of its cap.
fn component<R: Rng + ?Sized>(cap: f64, rng: &mut R) -> f64 {
    (rng.gen_range(0.0..1.0) * cap * 0.9).floor() + cap * 0.1
}

/// Builds a demo cohort with marks for every catalog subject.
pub fn generate_students<R: Rng + ?Sized>(count: usize, subjects: &[Subject], rng: &mut R) -> Vec<Student> {
    (1..=count)
        .map(|ordinal| {
            let student_id = format!("student_{ordinal}");
            let pin = format!("CS2021{ordinal:03}");
            let marks = subjects
                .iter()
                .map(|subject| {
                    let caps = subject.max_marks;
                    StudentMarks {
                        student_id: student_id.clone(),
                        subject_id: subject.id.clone(),
                        mid1: component(caps.mid1, rng),
                        mid2: component(caps.mid2, rng),
                        internal: component(caps.internal, rng),
                        end_sem: component(caps.end_sem, rng),
                        attendance: Some(rng.gen_range(70..100) as f64),
                        assignment_completion: Some(rng.gen_range(60..100) as f64),
                    }
                })
                .collect();

            Student {
                name: format!("{} {ordinal}", NAMES[(ordinal - 1) % NAMES.len()]),
                email: format!("{}@university.edu", pin.to_lowercase()),
                id: student_id,
                pin,
                semester: 6,
                marks,
                prediction: None,
            }
        })
        .collect()
}

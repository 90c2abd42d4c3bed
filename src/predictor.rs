//! Weighted-score prediction of a student's SGPA, risk and feedback.
//!
//! Everything here is a pure function of the marks and the subject catalog,
//! apart from two noise terms drawn from the caller's random source: the
//! per-subject prediction jitter (uniform in [-5, 5)) and the confidence
//! noise (uniform in [0, 0.1)).

use rand::Rng;

use crate::catalog::find_subject;
use crate::models::{Prediction, RiskStatus, Student, StudentMarks, Subject, SubjectFeedback};

const MID1_WEIGHT: f64 = 0.20;
const MID2_WEIGHT: f64 = 0.25;
const INTERNAL_WEIGHT: f64 = 0.15;
const END_SEM_WEIGHT: f64 = 0.40;

const JITTER: f64 = 5.0;
const CONFIDENCE_NOISE: f64 = 0.1;

pub fn predict<R: Rng + ?Sized>(marks: &[StudentMarks], subjects: &[Subject], rng: &mut R) -> Prediction {
    let sgpa = predict_sgpa(marks, subjects);
    let risk_status = RiskStatus::from_sgpa(sgpa);
    let feedback = generate_feedback(marks, subjects, sgpa);
    let subject_wise_feedback = subject_feedback(marks, subjects, rng);
    let confidence = confidence(marks, rng);

    Prediction {
        student_id: marks
            .first()
            .map(|mark| mark.student_id.clone())
            .unwrap_or_default(),
        expected_sgpa: sgpa,
        risk_status,
        confidence,
        feedback,
        subject_wise_feedback,
    }
}

/// Recomputes the prediction of every student from their current marks.
pub fn predict_roster<R: Rng + ?Sized>(students: &mut [Student], subjects: &[Subject], rng: &mut R) {
    for student in students.iter_mut() {
        student.prediction = Some(predict(&student.marks, subjects, rng));
    }
}

fn matched<'a>(
    marks: &'a [StudentMarks],
    subjects: &'a [Subject],
) -> impl Iterator<Item = (&'a StudentMarks, &'a Subject)> {
    marks
        .iter()
        .filter_map(move |mark| find_subject(subjects, &mark.subject_id).map(|subject| (mark, subject)))
}

fn weighted_fraction(mark: &StudentMarks, subject: &Subject) -> f64 {
    let caps = &subject.max_marks;
    (mark.mid1 / caps.mid1) * MID1_WEIGHT
        + (mark.mid2 / caps.mid2) * MID2_WEIGHT
        + (mark.internal / caps.internal) * INTERNAL_WEIGHT
        + (mark.end_sem / caps.end_sem) * END_SEM_WEIGHT
}

pub fn predict_sgpa(marks: &[StudentMarks], subjects: &[Subject]) -> f64 {
    let (total, count) = matched(marks, subjects)
        .fold((0.0, 0usize), |(total, count), (mark, subject)| {
            (total + weighted_fraction(mark, subject), count + 1)
        });

    if count == 0 {
        return 0.0;
    }

    (total / count as f64 * 10.0).clamp(0.0, 10.0)
}

pub fn generate_feedback(marks: &[StudentMarks], subjects: &[Subject], sgpa: f64) -> Vec<String> {
    let headline = match RiskStatus::from_sgpa(sgpa) {
        RiskStatus::High => "⚠️ High risk of poor performance. Immediate attention needed.",
        RiskStatus::Medium => "⚡ Moderate risk. Focus on improving weak areas.",
        RiskStatus::Low => "✅ Good performance. Keep up the excellent work!",
    };

    let mut feedback = vec![headline.to_string()];

    for (mark, subject) in matched(marks, subjects) {
        let percentage = subject.percentage(mark);
        if percentage < 40.0 {
            feedback.push(format!(
                "🔴 Critical: {} needs immediate attention ({:.1}%)",
                subject.name, percentage
            ));
        } else if percentage < 60.0 {
            feedback.push(format!(
                "🟡 Warning: Improve {} performance ({:.1}%)",
                subject.name, percentage
            ));
        }
    }

    feedback
}

pub fn subject_feedback<R: Rng + ?Sized>(
    marks: &[StudentMarks],
    subjects: &[Subject],
    rng: &mut R,
) -> Vec<SubjectFeedback> {
    matched(marks, subjects)
        .map(|(mark, subject)| {
            let current = subject.percentage(mark);
            // Only the upper bound is clamped; a weak subject may predict below zero.
            let prediction = (current + rng.gen_range(-JITTER..JITTER)).min(100.0);
            let (feedback, improvement) = subject_advice(subject, current);

            SubjectFeedback {
                subject_id: mark.subject_id.clone(),
                prediction,
                feedback,
                improvement,
            }
        })
        .collect()
}

fn subject_advice(subject: &Subject, percentage: f64) -> (String, String) {
    if percentage < 40.0 {
        (
            format!("Critical performance in {}. Focus on fundamentals.", subject.name),
            "Aim to improve by at least 20 points to reach passing grade.".to_string(),
        )
    } else if percentage < 60.0 {
        (
            format!("Below average performance in {}.", subject.name),
            "Focus on end semester preparation to improve by 10-15 points.".to_string(),
        )
    } else if percentage < 80.0 {
        (
            format!("Good performance in {}.", subject.name),
            "With consistent effort, you can achieve distinction.".to_string(),
        )
    } else {
        (
            format!("Excellent performance in {}!", subject.name),
            "Maintain this level and help peers in this subject.".to_string(),
        )
    }
}

/// Share of complete mark records, with incomplete ones counting half.
/// Covers every supplied record, including ones outside the catalog.
pub fn completeness(marks: &[StudentMarks]) -> f64 {
    if marks.is_empty() {
        return 0.0;
    }

    let weight: f64 = marks
        .iter()
        .map(|mark| if mark.is_complete() { 1.0 } else { 0.5 })
        .sum();
    weight / marks.len() as f64
}

/// Noisy by construction: the result lies within 0.1 above `completeness * 0.9`.
pub fn confidence<R: Rng + ?Sized>(marks: &[StudentMarks], rng: &mut R) -> f64 {
    let noise: f64 = rng.gen_range(0.0..1.0);
    (completeness(marks) * 0.9 + noise * CONFIDENCE_NOISE).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use crate::models::MaxMarks;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cs401() -> Subject {
        Subject {
            id: "sub1".to_string(),
            code: "CS401".to_string(),
            name: "Data Structures and Algorithms".to_string(),
            max_marks: MaxMarks {
                mid1: 20.0,
                mid2: 20.0,
                internal: 10.0,
                end_sem: 50.0,
            },
        }
    }

    fn marks(subject_id: &str, mid1: f64, mid2: f64, internal: f64, end_sem: f64) -> StudentMarks {
        StudentMarks {
            student_id: "CS2021001".to_string(),
            subject_id: subject_id.to_string(),
            mid1,
            mid2,
            internal,
            end_sem,
            attendance: None,
            assignment_completion: None,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn strong_marks_predict_nine_and_low_risk() {
        let subjects = vec![cs401()];
        let input = vec![marks("sub1", 18.0, 18.0, 9.0, 45.0)];

        let sgpa = predict_sgpa(&input, &subjects);
        assert!((sgpa - 9.0).abs() < 1e-9);

        let prediction = predict(&input, &subjects, &mut rng());
        assert_eq!(prediction.risk_status, RiskStatus::Low);
        assert_eq!(prediction.student_id, "CS2021001");
        assert_eq!(prediction.feedback.len(), 1);
        assert!(prediction.feedback[0].contains("Good performance"));
    }

    #[test]
    fn weak_marks_predict_high_risk_with_critical_line() {
        let subjects = vec![cs401()];
        let input = vec![marks("sub1", 5.0, 5.0, 2.0, 10.0)];

        let sgpa = predict_sgpa(&input, &subjects);
        assert!((sgpa - 2.225).abs() < 1e-9);

        let feedback = generate_feedback(&input, &subjects, sgpa);
        assert_eq!(feedback.len(), 2);
        assert!(feedback[0].contains("High risk"));
        assert_eq!(
            feedback[1],
            "🔴 Critical: Data Structures and Algorithms needs immediate attention (22.0%)"
        );
    }

    #[test]
    fn warning_band_between_40_and_60() {
        let subjects = vec![cs401()];
        let input = vec![marks("sub1", 10.0, 10.0, 5.0, 25.0)];
        let feedback = generate_feedback(&input, &subjects, predict_sgpa(&input, &subjects));
        assert_eq!(feedback.len(), 2);
        assert!(feedback[1].starts_with("🟡 Warning: Improve Data Structures and Algorithms"));
        assert!(feedback[1].ends_with("(50.0%)"));
    }

    #[test]
    fn risk_boundaries_are_inclusive_at_lower_end() {
        assert_eq!(RiskStatus::from_sgpa(10.0), RiskStatus::Low);
        assert_eq!(RiskStatus::from_sgpa(7.5), RiskStatus::Low);
        assert_eq!(RiskStatus::from_sgpa(7.4999), RiskStatus::Medium);
        assert_eq!(RiskStatus::from_sgpa(6.0), RiskStatus::Medium);
        assert_eq!(RiskStatus::from_sgpa(5.9999), RiskStatus::High);
        assert_eq!(RiskStatus::from_sgpa(0.0), RiskStatus::High);
    }

    #[test]
    fn unknown_subjects_are_skipped() {
        let subjects = vec![cs401()];
        let input = vec![
            marks("ghost", 0.0, 0.0, 0.0, 0.0),
            marks("sub1", 18.0, 18.0, 9.0, 45.0),
        ];

        assert!((predict_sgpa(&input, &subjects) - 9.0).abs() < 1e-9);
        let entries = subject_feedback(&input, &subjects, &mut rng());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subject_id, "sub1");
    }

    #[test]
    fn empty_marks_give_neutral_prediction() {
        let subjects = default_catalog();
        let mut rng = rng();
        for _ in 0..50 {
            let prediction = predict(&[], &subjects, &mut rng);
            assert_eq!(prediction.expected_sgpa, 0.0);
            assert_eq!(prediction.risk_status, RiskStatus::High);
            assert_eq!(
                prediction.feedback,
                vec!["⚠️ High risk of poor performance. Immediate attention needed.".to_string()]
            );
            assert_eq!(prediction.student_id, "");
            assert!(prediction.subject_wise_feedback.is_empty());
            assert!(prediction.confidence >= 0.0 && prediction.confidence < 0.1);
        }
    }

    #[test]
    fn sgpa_stays_within_bounds() {
        let subjects = vec![cs401()];
        let over_cap = vec![marks("sub1", 40.0, 40.0, 20.0, 100.0)];
        assert_eq!(predict_sgpa(&over_cap, &subjects), 10.0);

        let mut rng = rng();
        for _ in 0..200 {
            let input = vec![marks(
                "sub1",
                rng.gen_range(0.0..=20.0),
                rng.gen_range(0.0..=20.0),
                rng.gen_range(0.0..=10.0),
                rng.gen_range(0.0..=50.0),
            )];
            let sgpa = predict_sgpa(&input, &subjects);
            assert!((0.0..=10.0).contains(&sgpa));
        }
    }

    #[test]
    fn subject_feedback_preserves_order_and_jitter_bounds() {
        let subjects = default_catalog();
        let input = vec![
            marks("sub3", 20.0, 20.0, 10.0, 50.0),
            marks("sub1", 5.0, 5.0, 2.0, 10.0),
            marks("sub2", 14.0, 14.0, 7.0, 35.0),
        ];
        let mut rng = rng();

        for _ in 0..100 {
            let entries = subject_feedback(&input, &subjects, &mut rng);
            let ids: Vec<&str> = entries.iter().map(|e| e.subject_id.as_str()).collect();
            assert_eq!(ids, vec!["sub3", "sub1", "sub2"]);

            assert!(entries[0].prediction <= 100.0 && entries[0].prediction >= 95.0);
            assert!(entries[1].prediction >= 17.0 && entries[1].prediction < 27.0);
            assert!(entries[2].prediction >= 65.0 && entries[2].prediction < 75.0);
        }
    }

    #[test]
    fn only_unmatched_subjects_score_zero_with_headline_only() {
        let subjects = vec![cs401()];
        let input = vec![
            marks("sub7", 18.0, 18.0, 9.0, 45.0),
            marks("sub8", 5.0, 5.0, 2.0, 10.0),
        ];

        let prediction = predict(&input, &subjects, &mut rng());
        assert_eq!(prediction.expected_sgpa, 0.0);
        assert_eq!(prediction.risk_status, RiskStatus::High);
        assert_eq!(prediction.feedback.len(), 1);
        assert!(prediction.feedback[0].contains("High risk"));
        assert!(prediction.subject_wise_feedback.is_empty());
        assert_eq!(prediction.student_id, "CS2021001");
    }

    #[test]
    fn zero_marks_can_predict_below_zero() {
        let subjects = vec![cs401()];
        let input = vec![marks("sub1", 0.0, 0.0, 0.0, 0.0)];
        let mut rng = rng();

        let predictions: Vec<f64> = (0..200)
            .map(|_| subject_feedback(&input, &subjects, &mut rng)[0].prediction)
            .collect();
        assert!(predictions.iter().all(|p| (-JITTER..JITTER).contains(p)));
        assert!(predictions.iter().any(|p| *p < 0.0));
    }

    #[test]
    fn subject_advice_uses_four_bands() {
        let subject = cs401();
        assert!(subject_advice(&subject, 39.9).0.starts_with("Critical performance"));
        assert!(subject_advice(&subject, 40.0).0.starts_with("Below average"));
        assert!(subject_advice(&subject, 60.0).0.starts_with("Good performance"));
        assert!(subject_advice(&subject, 80.0).0.starts_with("Excellent performance"));
        assert!(subject_advice(&subject, 80.0).1.contains("help peers"));
    }

    #[test]
    fn confidence_tracks_completeness() {
        let input = vec![
            marks("sub1", 10.0, 10.0, 5.0, 25.0),
            marks("sub2", 0.0, 10.0, 5.0, 25.0),
            // Records outside the catalog still count.
            marks("ghost", 1.0, 1.0, 1.0, 1.0),
        ];
        let expected = (1.0 + 0.5 + 1.0) / 3.0;
        assert!((completeness(&input) - expected).abs() < 1e-9);

        let mut rng = rng();
        for _ in 0..100 {
            let value = confidence(&input, &mut rng);
            assert!(value >= expected * 0.9 && value < expected * 0.9 + 0.1);
            assert!(value <= 1.0);
        }
    }

    #[test]
    fn predict_roster_attaches_one_prediction_per_student() {
        let subjects = default_catalog();
        let mut students = vec![
            Student {
                id: "a".to_string(),
                pin: "CS2021001".to_string(),
                name: "Alice".to_string(),
                email: "a@university.edu".to_string(),
                semester: 6,
                marks: vec![marks("sub1", 18.0, 18.0, 9.0, 45.0)],
                prediction: None,
            },
            Student {
                id: "b".to_string(),
                pin: "CS2021002".to_string(),
                name: "Bob".to_string(),
                email: "b@university.edu".to_string(),
                semester: 6,
                marks: vec![marks("sub1", 5.0, 5.0, 2.0, 10.0)],
                prediction: None,
            },
        ];

        predict_roster(&mut students, &subjects, &mut rng());
        assert_eq!(students[0].risk_status(), Some(RiskStatus::Low));
        assert_eq!(students[1].risk_status(), Some(RiskStatus::High));
    }
}

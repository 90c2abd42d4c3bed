use std::cmp::Ordering;

use crate::models::{
    AnalyticsData, RiskBreakdown, RiskStatus, SgpaBucket, Student, Subject, SubjectPerformance,
};

const PASS_PERCENTAGE: f64 = 40.0;

// Bounds are compared literally, so scores such as 8.95 land in no band.
const SGPA_BANDS: [(&str, f64, f64); 6] = [
    ("9.0-10.0", 9.0, 10.0),
    ("8.0-8.9", 8.0, 8.9),
    ("7.0-7.9", 7.0, 7.9),
    ("6.0-6.9", 6.0, 6.9),
    ("5.0-5.9", 5.0, 5.9),
    ("0.0-4.9", 0.0, 4.9),
];

/// Cohort statistics over the students that carry a prediction.
/// Returns `None` when nobody has been predicted yet.
pub fn summarize(roster: &[Student], subjects: &[Subject]) -> Option<AnalyticsData> {
    let predicted: Vec<(&Student, f64)> = roster
        .iter()
        .filter_map(|student| {
            student
                .prediction
                .as_ref()
                .map(|prediction| (student, prediction.expected_sgpa))
        })
        .collect();

    if predicted.is_empty() {
        return None;
    }

    let total_students = predicted.len();
    let at_risk_students = predicted
        .iter()
        .filter(|(student, _)| student.risk_status().is_some_and(RiskStatus::is_at_risk))
        .count();
    let average_sgpa = predicted.iter().map(|(_, sgpa)| sgpa).sum::<f64>() / total_students as f64;

    let subject_wise_performance = subjects
        .iter()
        .map(|subject| {
            let percentages: Vec<f64> = predicted
                .iter()
                .map(|(student, _)| {
                    student
                        .marks_for(&subject.id)
                        .map(|marks| subject.percentage(marks))
                        .unwrap_or(0.0)
                })
                .collect();
            let passed = percentages.iter().filter(|p| **p >= PASS_PERCENTAGE).count();

            SubjectPerformance {
                subject_id: subject.id.clone(),
                average: percentages.iter().sum::<f64>() / total_students as f64,
                pass_rate: passed as f64 / total_students as f64 * 100.0,
            }
        })
        .collect();

    let sgpa_distribution = SGPA_BANDS
        .iter()
        .map(|(range, min, max)| SgpaBucket {
            range: range.to_string(),
            count: predicted
                .iter()
                .filter(|(_, sgpa)| *sgpa >= *min && *sgpa <= *max)
                .count(),
        })
        .collect();

    Some(AnalyticsData {
        total_students,
        at_risk_students,
        average_sgpa,
        subject_wise_performance,
        sgpa_distribution,
    })
}

impl RiskBreakdown {
    pub fn from_students<'a>(students: impl IntoIterator<Item = &'a Student>) -> Self {
        students
            .into_iter()
            .filter_map(Student::risk_status)
            .fold(RiskBreakdown::default(), |mut breakdown, status| {
                match status {
                    RiskStatus::High => breakdown.high += 1,
                    RiskStatus::Medium => breakdown.medium += 1,
                    RiskStatus::Low => breakdown.low += 1,
                }
                breakdown
            })
    }
}

/// Narrows the roster by a name/PIN substring and a risk status, keeping roster order.
pub fn filter_students<'a>(
    roster: &'a [Student],
    search: Option<&str>,
    risk: Option<RiskStatus>,
) -> Vec<&'a Student> {
    let needle = search
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());

    roster
        .iter()
        .filter(|student| match &needle {
            Some(needle) => {
                student.name.to_lowercase().contains(needle)
                    || student.pin.to_lowercase().contains(needle)
            }
            None => true,
        })
        .filter(|student| match risk {
            Some(status) => student.risk_status() == Some(status),
            None => true,
        })
        .collect()
}

/// Predicted students, lowest expected SGPA first.
pub fn ranked_by_sgpa(roster: &[Student], limit: usize) -> Vec<&Student> {
    let mut ranked: Vec<&Student> = roster
        .iter()
        .filter(|student| student.prediction.is_some())
        .collect();

    ranked.sort_by(|a, b| {
        let left = a.prediction.as_ref().map(|p| p.expected_sgpa).unwrap_or(0.0);
        let right = b.prediction.as_ref().map(|p| p.expected_sgpa).unwrap_or(0.0);
        left.partial_cmp(&right).unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

use std::fmt::Write;

use chrono::Utc;

use crate::analytics::{self, ranked_by_sgpa};
use crate::catalog::find_subject;
use crate::models::{AnalyticsData, RiskBreakdown, Student, Subject};

const TOP_AT_RISK: usize = 10;

fn subject_label(subjects: &[Subject], subject_id: &str) -> String {
    find_subject(subjects, subject_id)
        .map(|subject| format!("{} {}", subject.code, subject.name))
        .unwrap_or_else(|| subject_id.to_string())
}

pub fn build_report(label: Option<&str>, roster: &[Student], subjects: &[Subject]) -> String {
    let analytics = analytics::summarize(roster, subjects);
    let mut output = String::new();
    let cohort_label = label.unwrap_or("all students");

    let _ = writeln!(output, "# Student Risk Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        cohort_label,
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    let Some(analytics) = analytics else {
        let _ = writeln!(output, "## No Analytics Available");
        let _ = writeln!(
            output,
            "Upload student marks and generate predictions first ({} students on the roster).",
            roster.len()
        );
        return output;
    };

    write_summary(&mut output, &analytics, &RiskBreakdown::from_students(roster));
    write_subjects(&mut output, &analytics, subjects);
    write_distribution(&mut output, &analytics);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");
    for student in ranked_by_sgpa(roster, TOP_AT_RISK) {
        if let Some(prediction) = &student.prediction {
            let _ = writeln!(
                output,
                "- {} ({}) SGPA {:.2}, {} risk, confidence {:.0}%",
                student.name,
                student.pin,
                prediction.expected_sgpa,
                prediction.risk_status,
                prediction.confidence * 100.0
            );
            for line in prediction.feedback.iter().skip(1) {
                let _ = writeln!(output, "  - {line}");
            }
        }
    }

    output
}

fn write_summary(output: &mut String, analytics: &AnalyticsData, breakdown: &RiskBreakdown) {
    let _ = writeln!(output, "## Cohort Summary");
    let _ = writeln!(output, "- Students with predictions: {}", analytics.total_students);
    let _ = writeln!(
        output,
        "- At risk (medium or high): {} ({:.1}%)",
        analytics.at_risk_students,
        analytics.at_risk_students as f64 / analytics.total_students as f64 * 100.0
    );
    let _ = writeln!(output, "- Average expected SGPA: {:.2}", analytics.average_sgpa);
    let _ = writeln!(
        output,
        "- Risk mix: {} high, {} medium, {} low",
        breakdown.high, breakdown.medium, breakdown.low
    );
}

fn write_subjects(output: &mut String, analytics: &AnalyticsData, subjects: &[Subject]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Performance");
    let _ = writeln!(output, "| Subject | Average % | Pass rate % |");
    let _ = writeln!(output, "|---|---|---|");
    for performance in &analytics.subject_wise_performance {
        let _ = writeln!(
            output,
            "| {} | {:.1} | {:.1} |",
            subject_label(subjects, &performance.subject_id),
            performance.average,
            performance.pass_rate
        );
    }
}

fn write_distribution(output: &mut String, analytics: &AnalyticsData) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## SGPA Distribution");
    for bucket in &analytics.sgpa_distribution {
        let _ = writeln!(output, "- {}: {}", bucket.range, bucket.count);
    }
}

/// The student's own view of their prediction.
pub fn student_card(student: &Student, subjects: &[Subject]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{} ({}), semester {}", student.name, student.pin, student.semester);

    let Some(prediction) = &student.prediction else {
        let _ = writeln!(output, "No prediction available yet.");
        return output;
    };

    let _ = writeln!(output, "Expected SGPA: {:.2}", prediction.expected_sgpa);
    let _ = writeln!(output, "Risk: {}", prediction.risk_status);
    let _ = writeln!(output, "Confidence: {:.0}%", prediction.confidence * 100.0);
    let _ = writeln!(output);
    for line in &prediction.feedback {
        let _ = writeln!(output, "{line}");
    }

    let _ = writeln!(output);
    for entry in &prediction.subject_wise_feedback {
        let subject = find_subject(subjects, &entry.subject_id);
        let current = subject
            .zip(student.marks_for(&entry.subject_id))
            .map(|(subject, marks)| {
                (
                    subject.percentage(marks),
                    marks.attendance_or_default(),
                    marks.assignment_completion_or_default(),
                )
            });

        let _ = writeln!(output, "{}", subject_label(subjects, &entry.subject_id));
        if let Some((percentage, attendance, assignments)) = current {
            let _ = writeln!(
                output,
                "  current {:.1}%, predicted {:.1}%, attendance {:.0}%, assignments {:.0}%",
                percentage, entry.prediction, attendance, assignments
            );
        }
        let _ = writeln!(output, "  {}", entry.feedback);
        let _ = writeln!(output, "  {}", entry.improvement);
    }

    output
}

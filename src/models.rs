use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Attendance and assignment completion assumed when a mark sheet leaves them out.
pub const DEFAULT_PARTICIPATION: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxMarks {
    pub mid1: f64,
    pub mid2: f64,
    pub internal: f64,
    pub end_sem: f64,
}

impl MaxMarks {
    pub fn total(&self) -> f64 {
        self.mid1 + self.mid2 + self.internal + self.end_sem
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub name: String,
    pub max_marks: MaxMarks,
}

impl Subject {
    /// Share of the subject's total marks obtained, 0-100.
    pub fn percentage(&self, marks: &StudentMarks) -> f64 {
        marks.total() / self.max_marks.total() * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMarks {
    pub student_id: String,
    pub subject_id: String,
    pub mid1: f64,
    pub mid2: f64,
    pub internal: f64,
    pub end_sem: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_completion: Option<f64>,
}

impl StudentMarks {
    pub fn total(&self) -> f64 {
        self.mid1 + self.mid2 + self.internal + self.end_sem
    }

    /// True when every component carries a strictly positive score.
    pub fn is_complete(&self) -> bool {
        self.mid1 > 0.0 && self.mid2 > 0.0 && self.internal > 0.0 && self.end_sem > 0.0
    }

    pub fn attendance_or_default(&self) -> f64 {
        self.attendance.unwrap_or(DEFAULT_PARTICIPATION)
    }

    pub fn assignment_completion_or_default(&self) -> f64 {
        self.assignment_completion.unwrap_or(DEFAULT_PARTICIPATION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskStatus {
    Low,
    Medium,
    High,
}

impl RiskStatus {
    pub fn from_sgpa(sgpa: f64) -> Self {
        if sgpa >= 7.5 {
            RiskStatus::Low
        } else if sgpa >= 6.0 {
            RiskStatus::Medium
        } else {
            RiskStatus::High
        }
    }

    pub fn is_at_risk(self) -> bool {
        matches!(self, RiskStatus::Medium | RiskStatus::High)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskStatus::Low => "low",
            RiskStatus::Medium => "medium",
            RiskStatus::High => "high",
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskStatus::Low),
            "medium" => Ok(RiskStatus::Medium),
            "high" => Ok(RiskStatus::High),
            other => anyhow::bail!("unknown risk status '{other}' (expected low, medium or high)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectFeedback {
    pub subject_id: String,
    pub prediction: f64,
    pub feedback: String,
    pub improvement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub student_id: String,
    #[serde(rename = "expectedSGPA")]
    pub expected_sgpa: f64,
    pub risk_status: RiskStatus,
    pub confidence: f64,
    pub feedback: Vec<String>,
    pub subject_wise_feedback: Vec<SubjectFeedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub pin: String,
    pub name: String,
    pub email: String,
    pub semester: i32,
    pub marks: Vec<StudentMarks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
}

impl Student {
    /// Replaces the marks; any prediction made on the old marks is dropped.
    pub fn with_marks(mut self, marks: Vec<StudentMarks>) -> Self {
        self.marks = marks;
        self.prediction = None;
        self
    }

    pub fn marks_for(&self, subject_id: &str) -> Option<&StudentMarks> {
        self.marks.iter().find(|mark| mark.subject_id == subject_id)
    }

    pub fn risk_status(&self) -> Option<RiskStatus> {
        self.prediction.as_ref().map(|prediction| prediction.risk_status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub subject_id: String,
    pub average: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SgpaBucket {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub total_students: usize,
    pub at_risk_students: usize,
    #[serde(rename = "averageSGPA")]
    pub average_sgpa: f64,
    pub subject_wise_performance: Vec<SubjectPerformance>,
    pub sgpa_distribution: Vec<SgpaBucket>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

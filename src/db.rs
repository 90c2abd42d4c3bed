use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Prediction, Student, StudentMarks};
use crate::store::RosterStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgRosterStore {
    pool: PgPool,
}

impl PgRosterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RosterStore for PgRosterStore {
    async fn load_roster(&self) -> anyhow::Result<Vec<Student>> {
        let student_rows = sqlx::query(
            "SELECT id, pin, student_key, full_name, email, semester \
             FROM risk_insights.students ORDER BY roster_position",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load students")?;

        let mut marks_by_student: HashMap<Uuid, Vec<StudentMarks>> = HashMap::new();
        let mark_rows = sqlx::query(
            "SELECT m.student_id, s.student_key, m.subject_id, m.mid1, m.mid2, m.internal, \
             m.end_sem, m.attendance, m.assignment_completion \
             FROM risk_insights.marks m \
             JOIN risk_insights.students s ON s.id = m.student_id \
             ORDER BY m.student_id, m.position",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load marks")?;

        for row in mark_rows {
            marks_by_student
                .entry(row.get("student_id"))
                .or_default()
                .push(StudentMarks {
                    student_id: row.get("student_key"),
                    subject_id: row.get("subject_id"),
                    mid1: row.get("mid1"),
                    mid2: row.get("mid2"),
                    internal: row.get("internal"),
                    end_sem: row.get("end_sem"),
                    attendance: row.get("attendance"),
                    assignment_completion: row.get("assignment_completion"),
                });
        }

        let mut predictions: HashMap<Uuid, Prediction> = HashMap::new();
        let prediction_rows =
            sqlx::query("SELECT student_id, payload FROM risk_insights.predictions")
                .fetch_all(&self.pool)
                .await
                .context("failed to load predictions")?;

        for row in prediction_rows {
            let student_id: Uuid = row.get("student_id");
            let payload: String = row.get("payload");
            let prediction = serde_json::from_str(&payload)
                .with_context(|| format!("corrupt prediction payload for student {student_id}"))?;
            predictions.insert(student_id, prediction);
        }

        let mut students = Vec::with_capacity(student_rows.len());
        for row in student_rows {
            let id: Uuid = row.get("id");
            students.push(Student {
                id: row.get("student_key"),
                pin: row.get("pin"),
                name: row.get("full_name"),
                email: row.get("email"),
                semester: row.get("semester"),
                marks: marks_by_student.remove(&id).unwrap_or_default(),
                prediction: predictions.remove(&id),
            });
        }

        debug!(students = students.len(), "roster loaded from Postgres");
        Ok(students)
    }

    async fn save_roster(&self, students: &[Student]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("failed to open transaction")?;
        let generated_at = Utc::now();

        for student in students {
            let row_id: Uuid = sqlx::query(
                r#"
                INSERT INTO risk_insights.students
                (id, pin, student_key, full_name, email, semester, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (pin) DO UPDATE
                SET student_key = EXCLUDED.student_key,
                    full_name = EXCLUDED.full_name,
                    email = EXCLUDED.email,
                    semester = EXCLUDED.semester,
                    updated_at = EXCLUDED.updated_at
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&student.pin)
            .bind(&student.id)
            .bind(&student.name)
            .bind(&student.email)
            .bind(student.semester)
            .bind(generated_at)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("failed to upsert student {}", student.pin))?
            .get("id");

            sqlx::query("DELETE FROM risk_insights.marks WHERE student_id = $1")
                .bind(row_id)
                .execute(&mut *tx)
                .await?;

            for (position, marks) in student.marks.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO risk_insights.marks
                    (student_id, position, subject_id, mid1, mid2, internal, end_sem,
                     attendance, assignment_completion)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(row_id)
                .bind(position as i32)
                .bind(&marks.subject_id)
                .bind(marks.mid1)
                .bind(marks.mid2)
                .bind(marks.internal)
                .bind(marks.end_sem)
                .bind(marks.attendance)
                .bind(marks.assignment_completion)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to store marks for {}", student.pin))?;
            }

            sqlx::query("DELETE FROM risk_insights.predictions WHERE student_id = $1")
                .bind(row_id)
                .execute(&mut *tx)
                .await?;

            if let Some(prediction) = &student.prediction {
                sqlx::query(
                    r#"
                    INSERT INTO risk_insights.predictions
                    (student_id, expected_sgpa, risk_status, payload, generated_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(row_id)
                .bind(prediction.expected_sgpa)
                .bind(prediction.risk_status.as_str())
                .bind(serde_json::to_string(prediction)?)
                .bind(generated_at)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to store prediction for {}", student.pin))?;
            }
        }

        tx.commit().await.context("failed to commit roster")?;
        info!(students = students.len(), "roster saved to Postgres");
        Ok(())
    }
}

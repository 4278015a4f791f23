// 🕹️ Quiz Reconciler - attempt rows → labeled quiz records
// Quiz attempts carry explicit quiz and course references, so there is no
// hierarchy to resolve. Every attempt survives the join; references that
// cannot be labeled keep their raw id instead of being dropped.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::catalog::{CourseCatalog, UserDirectory};
use crate::tables::QuizAttemptRow;

/// One labeled quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRecord {
    pub user_id: String,
    pub user_name: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub course_id: String,
    pub course_title: String,
    /// Marks are passed through as text; exports disagree on the format.
    pub earned_marks: String,
    pub total_marks: String,
    pub attempt_status: String,
    /// Formatted end time, empty while the attempt is open.
    pub completed_at: String,
}

/// Joins quiz attempts against the user directory and course catalog.
#[derive(Debug, Clone, Default)]
pub struct QuizReconciler;

impl QuizReconciler {
    pub fn new() -> Self {
        QuizReconciler
    }

    pub fn reconcile(
        &self,
        directory: &UserDirectory,
        catalog: &CourseCatalog,
        attempts: &[QuizAttemptRow],
    ) -> Vec<QuizRecord> {
        attempts
            .iter()
            .map(|attempt| self.labeled_record(directory, catalog, attempt))
            .collect()
    }

    fn labeled_record(
        &self,
        directory: &UserDirectory,
        catalog: &CourseCatalog,
        attempt: &QuizAttemptRow,
    ) -> QuizRecord {
        let quiz_title = catalog
            .quiz_title(&attempt.quiz_id)
            .unwrap_or(attempt.quiz_id.as_str())
            .to_string();
        let course_title = catalog
            .course(&attempt.course_id)
            .map(|course| course.title.as_str())
            .filter(|title| !title.is_empty())
            .unwrap_or(attempt.course_id.as_str())
            .to_string();
        let completed_at = attempt
            .attempt_ended_at
            .as_deref()
            .map(crate::reconcile::format_unix_timestamp)
            .unwrap_or_default();

        QuizRecord {
            user_id: attempt.user_id.clone(),
            user_name: directory.name_or_id(&attempt.user_id).to_string(),
            quiz_id: attempt.quiz_id.clone(),
            quiz_title,
            course_id: attempt.course_id.clone(),
            course_title,
            earned_marks: attempt.earned_marks.clone(),
            total_marks: attempt.total_marks.clone(),
            attempt_status: attempt.attempt_status.clone(),
            completed_at,
        }
    }
}

/// Top attempts by earned marks, descending. Ties keep their original order;
/// unparsable marks rank as zero.
pub fn leaderboard(records: &[QuizRecord], limit: usize) -> Vec<QuizRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(|a, b| {
        marks_value(&b.earned_marks)
            .partial_cmp(&marks_value(&a.earned_marks))
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

fn marks_value(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(0.0)
}

// ============================================================================
// TESTS
// ============================================================================

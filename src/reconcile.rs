// ⚖️ Completion Reconciler - metadata events → canonical fact table
// Completion is recorded per lesson as a user-metadata key suffix, but the
// questions people ask are per course. The reconciler resolves every event
// up the content tree, joins names and course attributes in, and emits one
// flat record per completion plus a placeholder per untouched course.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::{CourseCatalog, UserDirectory};
use crate::tables::UserMetaRow;

/// Key prefix marking lesson completion events; the suffix is the lesson id.
pub const COMPLETED_LESSON_PREFIX: &str = "_tutor_completed_lesson_id_";

// ============================================================================
// RECORD TYPES
// ============================================================================

/// Completion state of one user × course cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Completed,
    Incomplete,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Completed => "Completed",
            CompletionStatus::Incomplete => "Incomplete",
        }
    }
}

/// One row of the reconciled fact table: who completed what course, when,
/// taught by whom, for which audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Empty on placeholder rows.
    pub user_id: String,
    /// Empty on placeholder rows.
    pub user_name: String,
    pub course_id: String,
    pub course_title: String,
    /// "YYYY-MM-DD HH:MM:SS" in UTC, empty when unknown.
    pub completed_at: String,
    pub upload_date: String,
    pub instructor_name: String,
    pub target_audience: String,
    pub status: CompletionStatus,
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

/// Rebuilds the completion fact table from raw user-metadata events.
///
/// Pure with respect to its inputs: the same directory, catalog, and event
/// stream always produce the same records, and nothing is mutated, so
/// concurrent invocations are safe.
#[derive(Debug, Clone)]
pub struct CompletionReconciler {
    /// Recognized event key prefix; everything after it is the lesson id.
    pub event_key_prefix: String,
}

impl CompletionReconciler {
    pub fn new() -> Self {
        CompletionReconciler {
            event_key_prefix: COMPLETED_LESSON_PREFIX.to_string(),
        }
    }

    /// Use a different event key convention (e.g. course-level completion
    /// keys from other plugin versions).
    pub fn with_event_prefix(prefix: impl Into<String>) -> Self {
        CompletionReconciler {
            event_key_prefix: prefix.into(),
        }
    }

    /// Run the reconciliation over one event stream.
    ///
    /// Every event whose key matches the prefix is resolved to its course.
    /// Events whose lineage cannot be resolved are dropped and counted, never
    /// guessed. Afterwards each course with zero completions anywhere gets a
    /// single placeholder record with empty user fields, so untouched courses
    /// stay visible in reports. Duplicate completions are kept as distinct
    /// records.
    pub fn reconcile(
        &self,
        directory: &UserDirectory,
        catalog: &CourseCatalog,
        events: &[UserMetaRow],
    ) -> ReconciliationReport {
        let mut records = Vec::new();
        let mut matched_events = 0;
        let mut dropped_events = 0;

        for event in events {
            let lesson_id = match event.meta_key.strip_prefix(self.event_key_prefix.as_str()) {
                Some(suffix) => suffix,
                None => continue,
            };
            matched_events += 1;

            let course_id = match catalog.resolve_course(lesson_id) {
                Some(id) => id,
                None => {
                    dropped_events += 1;
                    continue;
                }
            };
            records.push(self.completed_record(directory, catalog, event, &course_id));
        }

        let completed_courses: HashSet<String> =
            records.iter().map(|record| record.course_id.clone()).collect();
        let mut placeholder_count = 0;
        for course_id in catalog.course_ids() {
            if completed_courses.contains(course_id) {
                continue;
            }
            records.push(self.placeholder_record(catalog, course_id));
            placeholder_count += 1;
        }

        ReconciliationReport {
            records,
            matched_events,
            dropped_events,
            placeholder_count,
            reconciled_at: Utc::now(),
        }
    }

    fn completed_record(
        &self,
        directory: &UserDirectory,
        catalog: &CourseCatalog,
        event: &UserMetaRow,
        course_id: &str,
    ) -> CompletionRecord {
        let (title, upload_date, instructor, audience) = course_fields(catalog, course_id);
        CompletionRecord {
            user_id: event.user_id.clone(),
            user_name: directory.name_or_id(&event.user_id).to_string(),
            course_id: course_id.to_string(),
            course_title: non_empty_or(title, "Unknown Course"),
            completed_at: format_unix_timestamp(&event.meta_value),
            upload_date: non_empty_or(upload_date, "Unknown"),
            instructor_name: non_empty_or(instructor, "Unknown"),
            target_audience: non_empty_or(audience, "Unknown"),
            status: CompletionStatus::Completed,
        }
    }

    fn placeholder_record(&self, catalog: &CourseCatalog, course_id: &str) -> CompletionRecord {
        let (title, upload_date, instructor, audience) = course_fields(catalog, course_id);
        CompletionRecord {
            user_id: String::new(),
            user_name: String::new(),
            course_id: course_id.to_string(),
            course_title: non_empty_or(title, "Unknown Course"),
            completed_at: String::new(),
            upload_date: non_empty_or(upload_date, "Unknown"),
            instructor_name: non_empty_or(instructor, "Unknown"),
            target_audience: non_empty_or(audience, "Unknown"),
            status: CompletionStatus::Incomplete,
        }
    }
}

impl Default for CompletionReconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn course_fields(catalog: &CourseCatalog, course_id: &str) -> (String, String, String, String) {
    match catalog.course(course_id) {
        Some(info) => (
            info.title.clone(),
            info.upload_date.clone(),
            info.instructor_name.clone(),
            info.target_audience.clone(),
        ),
        None => (
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ),
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Render a unix-timestamp string as "YYYY-MM-DD HH:MM:SS" in UTC.
/// Unparsable input renders as the empty string.
///
/// ```
/// use course_ledger::reconcile::format_unix_timestamp;
///
/// assert_eq!(format_unix_timestamp("1000000000"), "2001-09-09 01:46:40");
/// assert_eq!(format_unix_timestamp("soon"), "");
/// ```
pub fn format_unix_timestamp(raw: &str) -> String {
    let secs = match raw.trim().parse::<i64>() {
        Ok(secs) => secs,
        Err(_) => return String::new(),
    };
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

/// Records plus the counters that explain them.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub records: Vec<CompletionRecord>,
    /// Events whose key matched the completion prefix.
    pub matched_events: usize,
    /// Matched events excluded because their course lineage did not resolve.
    pub dropped_events: usize,
    /// Courses that received a placeholder record.
    pub placeholder_count: usize,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn completed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == CompletionStatus::Completed)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} events into {} records: {} completed, {} placeholder(s), {} dropped as unresolvable",
            self.matched_events,
            self.records.len(),
            self.completed_count(),
            self.placeholder_count,
            self.dropped_events
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

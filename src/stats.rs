// 📊 Completion Statistics - reconciled records → aggregate views
// Aggregates always span the full user and course universes: someone who
// never finished anything still shows up with a zero. Rankings sort stably,
// so equal counts keep their table order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::catalog::{CourseCatalog, UserDirectory};
use crate::reconcile::{CompletionRecord, CompletionStatus};

/// Default size for top-N rankings.
pub const DEFAULT_TOP_LIMIT: usize = 10;

// ============================================================================
// AGGREGATE COUNTS
// ============================================================================

/// One entry of a ranking: an id, its display label, and a count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub id: String,
    pub label: String,
    pub count: usize,
}

/// Aggregate view over one reconciled record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionStats {
    pub total_users: usize,
    pub total_courses: usize,
    pub total_completions: usize,
    pub total_incomplete: usize,
    /// Completed share of all records as a percentage with one decimal,
    /// None when there are no records to measure.
    pub completion_rate: Option<f64>,
    /// Per-course completion counts over the full catalog, table order.
    pub course_counts: Vec<RankedEntry>,
    /// Per-user completion counts over the full directory, table order.
    pub user_counts: Vec<RankedEntry>,
}

impl CompletionStats {
    pub fn compute(
        records: &[CompletionRecord],
        directory: &UserDirectory,
        catalog: &CourseCatalog,
    ) -> Self {
        let mut by_course: HashMap<&str, usize> = HashMap::new();
        let mut by_user: HashMap<&str, usize> = HashMap::new();
        let mut total_completions = 0;
        let mut total_incomplete = 0;

        for record in records {
            match record.status {
                CompletionStatus::Completed => {
                    total_completions += 1;
                    *by_course.entry(record.course_id.as_str()).or_insert(0) += 1;
                    *by_user.entry(record.user_id.as_str()).or_insert(0) += 1;
                }
                CompletionStatus::Incomplete => total_incomplete += 1,
            }
        }

        let course_counts = catalog
            .course_ids()
            .iter()
            .map(|id| {
                let label = catalog
                    .course(id)
                    .map(|info| info.title.as_str())
                    .filter(|title| !title.is_empty())
                    .unwrap_or(id.as_str())
                    .to_string();
                RankedEntry {
                    id: id.clone(),
                    label,
                    count: by_course.get(id.as_str()).copied().unwrap_or(0),
                }
            })
            .collect();

        let user_counts = directory
            .ids()
            .iter()
            .map(|id| RankedEntry {
                id: id.clone(),
                label: directory.name_or_id(id).to_string(),
                count: by_user.get(id.as_str()).copied().unwrap_or(0),
            })
            .collect();

        CompletionStats {
            total_users: directory.len(),
            total_courses: catalog.course_count(),
            total_completions,
            total_incomplete,
            completion_rate: percentage(total_completions, total_completions + total_incomplete),
            course_counts,
            user_counts,
        }
    }

    /// Top courses by completions, stable on ties.
    pub fn top_courses(&self, limit: usize) -> Vec<RankedEntry> {
        top_of(&self.course_counts, limit)
    }

    /// Top users by completions, stable on ties.
    pub fn top_users(&self, limit: usize) -> Vec<RankedEntry> {
        top_of(&self.user_counts, limit)
    }

    pub fn summary(&self) -> String {
        let rate = match self.completion_rate {
            Some(rate) => format!("{}% complete", rate),
            None => "no records".to_string(),
        };
        format!(
            "{} users, {} courses: {} completions, {} incomplete ({})",
            self.total_users, self.total_courses, self.total_completions, self.total_incomplete,
            rate
        )
    }
}

fn top_of(entries: &[RankedEntry], limit: usize) -> Vec<RankedEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

fn percentage(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    Some((pct * 10.0).round() / 10.0)
}

// ============================================================================
// COMPLETION MATRIX
// ============================================================================

/// One matrix row: a user and their status for every course column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRow {
    pub user_id: String,
    pub user_name: String,
    /// Parallel to the matrix course columns.
    pub statuses: Vec<CompletionStatus>,
}

/// Dense user × course status matrix. Columns are the distinct course ids of
/// the record set in encounter order; rows are every known user in table
/// order. A cell is Completed exactly when a completed record exists for
/// that user and course, Incomplete otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMatrix {
    pub course_ids: Vec<String>,
    pub course_titles: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl CompletionMatrix {
    pub fn build(records: &[CompletionRecord], directory: &UserDirectory) -> Self {
        let mut course_ids = Vec::new();
        let mut course_titles = Vec::new();
        let mut seen = HashSet::new();
        for record in records {
            if seen.insert(record.course_id.clone()) {
                course_ids.push(record.course_id.clone());
                course_titles.push(if record.course_title.is_empty() {
                    record.course_id.clone()
                } else {
                    record.course_title.clone()
                });
            }
        }

        // Placeholder records carry no user, so they never mark a cell.
        let completed_pairs: HashSet<(&str, &str)> = records
            .iter()
            .filter(|record| {
                record.status == CompletionStatus::Completed
                    && !record.user_id.is_empty()
                    && !record.course_id.is_empty()
            })
            .map(|record| (record.user_id.as_str(), record.course_id.as_str()))
            .collect();

        let rows = directory
            .ids()
            .iter()
            .map(|user_id| {
                let statuses = course_ids
                    .iter()
                    .map(|course_id| {
                        if completed_pairs.contains(&(user_id.as_str(), course_id.as_str())) {
                            CompletionStatus::Completed
                        } else {
                            CompletionStatus::Incomplete
                        }
                    })
                    .collect();
                MatrixRow {
                    user_id: user_id.clone(),
                    user_name: directory.name_or_id(user_id).to_string(),
                    statuses,
                }
            })
            .collect();

        CompletionMatrix {
            course_ids,
            course_titles,
            rows,
        }
    }

    /// Cell lookup; unknown users or courses read as Incomplete.
    pub fn status_of(&self, user_id: &str, course_id: &str) -> CompletionStatus {
        let column = match self.course_ids.iter().position(|id| id == course_id) {
            Some(column) => column,
            None => return CompletionStatus::Incomplete,
        };
        self.rows
            .iter()
            .find(|row| row.user_id == user_id)
            .and_then(|row| row.statuses.get(column))
            .copied()
            .unwrap_or(CompletionStatus::Incomplete)
    }
}

// ============================================================================
// FILTER VALUES
// ============================================================================

/// Distinct values per filterable record field, sorted for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOptions {
    pub user_names: Vec<String>,
    pub course_titles: Vec<String>,
    pub upload_dates: Vec<String>,
    pub instructor_names: Vec<String>,
    pub audiences: Vec<String>,
}

impl FilterOptions {
    pub fn collect(records: &[CompletionRecord]) -> Self {
        FilterOptions {
            user_names: distinct(records, |record| &record.user_name),
            course_titles: distinct(records, |record| &record.course_title),
            upload_dates: distinct(records, |record| &record.upload_date),
            instructor_names: distinct(records, |record| &record.instructor_name),
            audiences: distinct(records, |record| &record.target_audience),
        }
    }
}

fn distinct<F>(records: &[CompletionRecord], field: F) -> Vec<String>
where
    F: Fn(&CompletionRecord) -> &String,
{
    let set: BTreeSet<String> = records.iter().map(|record| field(record).clone()).collect();
    set.into_iter().collect()
}

// ============================================================================
// TESTS
// ============================================================================

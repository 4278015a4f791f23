// 🎓 Course Ledger - Core Library
// Rebuilds a "who completed what course" fact table from flat LMS database
// exports: loose JSON tables in, reconciled records, aggregates, and CSV out.

pub mod tables;    // Typed rows over the five raw export tables
pub mod loader;    // Shape detection, concurrent table loading, dump splitting
pub mod catalog;   // User directory, course catalog, hierarchy resolution
pub mod reconcile; // Completion events → canonical fact table
pub mod quiz;      // Quiz attempts → labeled records and leaderboards
pub mod stats;     // Aggregates, rankings, user × course matrix
pub mod export;    // CSV writers for records and matrices

// Re-export main types for convenience
pub use tables::{NodeKind, PostMetaRow, PostRow, QuizAttemptRow, Snapshot, UserMetaRow, UserRow};

pub use loader::{
    extract_rows, load_snapshot, load_table, split_dump, LoadReport, TableKind, TableStat,
};

pub use catalog::{CourseCatalog, CourseInfo, UserDirectory, AUDIENCE_META_KEY, MAX_PARENT_HOPS};

pub use reconcile::{
    format_unix_timestamp, CompletionReconciler, CompletionRecord, CompletionStatus,
    ReconciliationReport, COMPLETED_LESSON_PREFIX,
};

pub use quiz::{leaderboard, QuizReconciler, QuizRecord};

pub use stats::{
    CompletionMatrix, CompletionStats, FilterOptions, MatrixRow, RankedEntry, DEFAULT_TOP_LIMIT,
};

pub use export::{
    dated_file_name, export_matrix, export_quiz, export_records, write_matrix_csv, write_quiz_csv,
    write_records_csv,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

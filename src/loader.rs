// 📦 Table Loader - JSON exports → typed row collections
// Real-world dumps arrive in three shapes: a plain row array, an object
// wrapping the rows under "data", or a phpMyAdmin-style array of table
// wrappers. All three are detected here, and a table that is absent or
// unparsable degrades to an empty collection instead of failing the run.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::thread;

use crate::tables::Snapshot;

// ============================================================================
// TABLE KINDS
// ============================================================================

/// The five source tables the reconstruction reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Users,
    Posts,
    PostMeta,
    UserMeta,
    QuizAttempts,
}

impl TableKind {
    pub const ALL: [TableKind; 5] = [
        TableKind::Users,
        TableKind::Posts,
        TableKind::PostMeta,
        TableKind::UserMeta,
        TableKind::QuizAttempts,
    ];

    /// Short name for console output and report labels.
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Users => "users",
            TableKind::Posts => "posts",
            TableKind::PostMeta => "postmeta",
            TableKind::UserMeta => "usermeta",
            TableKind::QuizAttempts => "quiz_attempts",
        }
    }

    /// File the exporter writes this table to.
    pub fn file_name(&self) -> &'static str {
        match self {
            TableKind::Users => "wp_users.json",
            TableKind::Posts => "wp_posts.json",
            TableKind::PostMeta => "wp_postmeta.json",
            TableKind::UserMeta => "wp_usermeta.json",
            TableKind::QuizAttempts => "wp_tutor_quiz_attempts.json",
        }
    }
}

// ============================================================================
// SHAPE DETECTION
// ============================================================================

/// Pull the row array out of whatever shape the export used.
///
/// ```
/// use course_ledger::loader::extract_rows;
/// use serde_json::json;
///
/// // Plain array of rows
/// assert_eq!(extract_rows(json!([{"ID": 1}, {"ID": 2}])).len(), 2);
/// // Object wrapper
/// assert_eq!(extract_rows(json!({"data": [{"ID": 1}]})).len(), 1);
/// // phpMyAdmin dump: array of wrappers, rows under "data"
/// let dump = json!([{"type": "header"}, {"type": "table", "data": [{"ID": 1}]}]);
/// assert_eq!(extract_rows(dump).len(), 1);
/// // Anything else degrades to empty
/// assert!(extract_rows(json!("not a table")).is_empty());
/// ```
pub fn extract_rows(json: Value) -> Vec<Value> {
    match json {
        Value::Array(entries) => {
            // Busca un envoltorio de tabla; si no hay, las entradas son filas.
            if let Some(rows) = entries
                .iter()
                .find_map(|entry| entry.get("data").and_then(Value::as_array))
            {
                return rows.clone();
            }
            entries
        }
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Deserialize raw rows into typed ones, skipping entries that are not
/// objects at all. Typed rows default every missing field, so a real row
/// never fails here.
fn parse_rows<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

// ============================================================================
// FILE LOADING
// ============================================================================

/// Read one table file and return its raw rows. Errors carry the path so the
/// degradation note in the load report says which file was at fault.
pub fn load_table(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open table file: {}", path.display()))?;
    let json: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from: {}", path.display()))?;
    Ok(extract_rows(json))
}

// ============================================================================
// SNAPSHOT LOADING
// ============================================================================

/// Load status of a single table.
#[derive(Debug, Clone, Serialize)]
pub struct TableStat {
    pub kind: TableKind,
    pub rows: usize,
    /// False when the file was absent or unparsable and the table degraded
    /// to an empty collection.
    pub loaded: bool,
    pub error: Option<String>,
}

/// Outcome of loading a full snapshot directory.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub snapshot: Snapshot,
    pub tables: Vec<TableStat>,
}

impl LoadReport {
    pub fn fully_loaded(&self) -> bool {
        self.tables.iter().all(|table| table.loaded)
    }

    pub fn summary(&self) -> String {
        let loaded = self.tables.iter().filter(|table| table.loaded).count();
        let total_rows: usize = self.tables.iter().map(|table| table.rows).sum();
        let missing: Vec<&str> = self
            .tables
            .iter()
            .filter(|table| !table.loaded)
            .map(|table| table.kind.name())
            .collect();

        if missing.is_empty() {
            format!(
                "Loaded {}/{} tables ({} rows)",
                loaded,
                self.tables.len(),
                total_rows
            )
        } else {
            format!(
                "Loaded {}/{} tables ({} rows), degraded to empty: {}",
                loaded,
                self.tables.len(),
                total_rows,
                missing.join(", ")
            )
        }
    }
}

/// Load all five tables from a directory. Table files are read concurrently
/// and joined before anything downstream sees the snapshot, so consumers
/// always observe an all-or-nothing load. Missing or corrupt files leave
/// their table empty and are noted in the report, never raised.
pub fn load_snapshot(dir: &Path) -> LoadReport {
    let mut results: Vec<(TableKind, Result<Vec<Value>>)> = Vec::new();

    thread::scope(|scope| {
        let mut handles = Vec::new();
        for kind in TableKind::ALL {
            let path = dir.join(kind.file_name());
            handles.push(scope.spawn(move || (kind, load_table(&path))));
        }
        for handle in handles {
            if let Ok(outcome) = handle.join() {
                results.push(outcome);
            }
        }
    });

    let mut snapshot = Snapshot::new();
    let mut tables = Vec::with_capacity(results.len());

    for (kind, outcome) in results {
        match outcome {
            Ok(values) => {
                let rows = assign_rows(&mut snapshot, kind, values);
                tables.push(TableStat {
                    kind,
                    rows,
                    loaded: true,
                    error: None,
                });
            }
            Err(err) => tables.push(TableStat {
                kind,
                rows: 0,
                loaded: false,
                error: Some(format!("{:#}", err)),
            }),
        }
    }

    LoadReport { snapshot, tables }
}

fn assign_rows(snapshot: &mut Snapshot, kind: TableKind, values: Vec<Value>) -> usize {
    match kind {
        TableKind::Users => {
            snapshot.users = parse_rows(values);
            snapshot.users.len()
        }
        TableKind::Posts => {
            snapshot.posts = parse_rows(values);
            snapshot.posts.len()
        }
        TableKind::PostMeta => {
            snapshot.post_meta = parse_rows(values);
            snapshot.post_meta.len()
        }
        TableKind::UserMeta => {
            snapshot.user_meta = parse_rows(values);
            snapshot.user_meta.len()
        }
        TableKind::QuizAttempts => {
            snapshot.quiz_attempts = parse_rows(values);
            snapshot.quiz_attempts.len()
        }
    }
}

// ============================================================================
// DUMP SPLITTER
// ============================================================================

/// Split a monolithic phpMyAdmin dump into one `<table>.json` file per table.
/// Entries without `type == "table"` (headers, database markers) and tables
/// with no rows are skipped. Returns the written table names with row counts.
pub fn split_dump(dump_path: &Path, out_dir: &Path) -> Result<Vec<(String, usize)>> {
    let file = File::open(dump_path)
        .with_context(|| format!("Failed to open dump file: {}", dump_path.display()))?;
    let json: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from: {}", dump_path.display()))?;
    let entries = json
        .as_array()
        .ok_or_else(|| anyhow!("Dump is not a JSON array: {}", dump_path.display()))?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let mut written = Vec::new();
    for entry in entries {
        if entry.get("type").and_then(Value::as_str) != Some("table") {
            continue;
        }
        let name = match entry.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => continue,
        };
        let rows = match entry.get("data").and_then(Value::as_array) {
            Some(rows) if !rows.is_empty() => rows,
            _ => continue,
        };

        let out_path = out_dir.join(format!("{}.json", name));
        let out_file = File::create(&out_path)
            .with_context(|| format!("Failed to create table file: {}", out_path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(out_file), &Value::Array(rows.clone()))
            .with_context(|| format!("Failed to write table file: {}", out_path.display()))?;
        written.push((name.to_string(), rows.len()));
    }

    Ok(written)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn temp_dir(test_name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "course_ledger_{}_{}",
            test_name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_extract_rows_plain_array() {
        let rows = extract_rows(json!([{"ID": 1}, {"ID": 2}, {"ID": 3}]));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_extract_rows_object_wrapper() {
        let rows = extract_rows(json!({"table": "wp_users", "data": [{"ID": 1}]}));
        assert_eq!(rows.len(), 1);

        let no_data = extract_rows(json!({"table": "wp_users"}));
        assert!(no_data.is_empty());
    }

    #[test]
    fn test_extract_rows_phpmyadmin_dump() {
        let dump = json!([
            {"type": "header", "version": "5.2.0"},
            {"type": "database", "name": "wordpress"},
            {"type": "table", "name": "wp_users", "data": [{"ID": 1}, {"ID": 2}]}
        ]);
        let rows = extract_rows(dump);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ID"], 1);
    }

    #[test]
    fn test_extract_rows_scalar_degrades_to_empty() {
        assert!(extract_rows(json!("nope")).is_empty());
        assert!(extract_rows(json!(42)).is_empty());
        assert!(extract_rows(json!(null)).is_empty());
    }

    #[test]
    fn test_parse_rows_skips_non_objects() {
        use crate::tables::UserRow;
        let values = vec![json!({"ID": 1}), json!(42), json!({"ID": "2"})];
        let rows: Vec<UserRow> = parse_rows(values);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "1");
        assert_eq!(rows[1].id, "2");
    }

    #[test]
    fn test_load_table_missing_file_is_error() {
        let result = load_table(Path::new("/nonexistent/wp_users.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_table_reads_rows() {
        let dir = temp_dir("load_table");
        let path = dir.join("wp_users.json");
        fs::write(&path, r#"[{"ID": 1, "display_name": "Ann"}]"#).unwrap();

        let rows = load_table(&path).unwrap();
        assert_eq!(rows.len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_snapshot_mixed_shapes_and_missing_files() {
        let dir = temp_dir("load_snapshot");
        // Three shapes across three files; usermeta and quiz attempts absent.
        fs::write(
            dir.join("wp_users.json"),
            r#"[{"ID": 1, "display_name": "Ann"}, {"ID": "2", "display_name": "Bo"}]"#,
        )
        .unwrap();
        fs::write(
            dir.join("wp_posts.json"),
            r#"{"data": [{"ID": 10, "post_type": "courses", "post_title": "Intro"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("wp_postmeta.json"),
            r#"[{"type": "table", "name": "wp_postmeta", "data": [{"post_id": 10, "meta_key": "k", "meta_value": "v"}]}]"#,
        )
        .unwrap();

        let report = load_snapshot(&dir);

        assert_eq!(report.snapshot.users.len(), 2);
        assert_eq!(report.snapshot.posts.len(), 1);
        assert_eq!(report.snapshot.post_meta.len(), 1);
        assert!(report.snapshot.user_meta.is_empty());
        assert!(report.snapshot.quiz_attempts.is_empty());

        assert!(!report.fully_loaded());
        let user_stat = report
            .tables
            .iter()
            .find(|t| t.kind == TableKind::Users)
            .unwrap();
        assert!(user_stat.loaded);
        assert_eq!(user_stat.rows, 2);
        let meta_stat = report
            .tables
            .iter()
            .find(|t| t.kind == TableKind::UserMeta)
            .unwrap();
        assert!(!meta_stat.loaded);
        assert!(meta_stat.error.is_some());

        let summary = report.summary();
        assert!(summary.contains("3/5"));
        assert!(summary.contains("usermeta"));
        println!("✅ Load summary: {}", summary);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_snapshot_corrupt_file_degrades() {
        let dir = temp_dir("load_corrupt");
        fs::write(dir.join("wp_users.json"), "{not json at all").unwrap();

        let report = load_snapshot(&dir);
        assert!(report.snapshot.users.is_empty());
        let stat = report
            .tables
            .iter()
            .find(|t| t.kind == TableKind::Users)
            .unwrap();
        assert!(!stat.loaded);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_split_dump_writes_one_file_per_table() {
        let dir = temp_dir("split_dump");
        let dump_path = dir.join("dump.json");
        let out_dir = dir.join("out");
        let dump = json!([
            {"type": "header", "version": "5.2.0"},
            {"type": "table", "name": "wp_users", "data": [{"ID": 1}, {"ID": 2}]},
            {"type": "table", "name": "wp_empty", "data": []},
            {"type": "table", "name": "wp_posts", "data": [{"ID": 10}]}
        ]);
        fs::write(&dump_path, serde_json::to_string(&dump).unwrap()).unwrap();

        let written = split_dump(&dump_path, &out_dir).unwrap();
        assert_eq!(
            written,
            vec![("wp_users".to_string(), 2), ("wp_posts".to_string(), 1)]
        );

        let users: Value =
            serde_json::from_str(&fs::read_to_string(out_dir.join("wp_users.json")).unwrap())
                .unwrap();
        assert_eq!(users.as_array().unwrap().len(), 2);
        assert!(!out_dir.join("wp_empty.json").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_split_dump_rejects_non_array() {
        let dir = temp_dir("split_bad");
        let dump_path = dir.join("dump.json");
        fs::write(&dump_path, r#"{"type": "table"}"#).unwrap();

        assert!(split_dump(&dump_path, &dir.join("out")).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}

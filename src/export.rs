// 📥 CSV Export - records and matrices → spreadsheet files
// Flat record exports serialize straight from the record structs, so the
// column set follows the type. The matrix export has dynamic columns (one
// per course) and is written record by record.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::quiz::QuizRecord;
use crate::reconcile::CompletionRecord;
use crate::stats::CompletionMatrix;

// ============================================================================
// RECORD EXPORTS
// ============================================================================

/// Write the reconciled records as CSV, one row per record, headers from the
/// record fields. Quotes inside values are doubled per CSV convention.
pub fn write_records_csv<W: Write>(records: &[CompletionRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer
            .serialize(record)
            .context("Failed to serialize completion record")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn export_records(records: &[CompletionRecord], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    write_records_csv(records, file)
}

/// Write quiz records as CSV, same conventions as the completion export.
pub fn write_quiz_csv<W: Write>(records: &[QuizRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer
            .serialize(record)
            .context("Failed to serialize quiz record")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn export_quiz(records: &[QuizRecord], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    write_quiz_csv(records, file)
}

// ============================================================================
// MATRIX EXPORT
// ============================================================================

/// Write the user × course matrix: a "User" column, then one column per
/// course title (course id when the title is blank), cells "Completed" or
/// "Incomplete".
pub fn write_matrix_csv<W: Write>(matrix: &CompletionMatrix, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(matrix.course_titles.len() + 1);
    header.push("User".to_string());
    header.extend(matrix.course_titles.iter().cloned());
    csv_writer
        .write_record(&header)
        .context("Failed to write matrix header")?;

    for row in &matrix.rows {
        let mut fields = Vec::with_capacity(matrix.course_ids.len() + 1);
        fields.push(row.user_name.clone());
        fields.extend(row.statuses.iter().map(|status| status.as_str().to_string()));
        csv_writer
            .write_record(&fields)
            .context("Failed to write matrix row")?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn export_matrix(matrix: &CompletionMatrix, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    write_matrix_csv(matrix, file)
}

// ============================================================================
// FILE NAMING
// ============================================================================

/// Default export name: `<stem>_<YYYY-MM-DD>.csv` with today's UTC date.
pub fn dated_file_name(stem: &str) -> String {
    format!("{}_{}.csv", stem, Utc::now().format("%Y-%m-%d"))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::CompletionStatus;
    use crate::stats::MatrixRow;

    fn create_test_record(user: &str, title: &str) -> CompletionRecord {
        CompletionRecord {
            user_id: "1".to_string(),
            user_name: user.to_string(),
            course_id: "10".to_string(),
            course_title: title.to_string(),
            completed_at: "2023-11-14 22:13:20".to_string(),
            upload_date: "2024-01-10".to_string(),
            instructor_name: "Prof. Reyes".to_string(),
            target_audience: "Nurses".to_string(),
            status: CompletionStatus::Completed,
        }
    }

    #[test]
    fn test_records_csv_headers_and_values() {
        let records = vec![create_test_record("Ann", "Intro")];
        let mut buffer = Vec::new();
        write_records_csv(&records, &mut buffer).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next().unwrap(),
            "user_id,user_name,course_id,course_title,completed_at,upload_date,instructor_name,target_audience,status"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,Ann,10,Intro,2023-11-14 22:13:20,2024-01-10,Prof. Reyes,Nurses,Completed"
        );
    }

    #[test]
    fn test_records_csv_doubles_embedded_quotes() {
        let records = vec![create_test_record("Ann", r#"Intro to "Safe" Lifting"#)];
        let mut buffer = Vec::new();
        write_records_csv(&records, &mut buffer).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains(r#""Intro to ""Safe"" Lifting""#));
    }

    #[test]
    fn test_matrix_csv_layout() {
        let matrix = CompletionMatrix {
            course_ids: vec!["10".to_string(), "20".to_string()],
            course_titles: vec!["Intro".to_string(), "Advanced".to_string()],
            rows: vec![
                MatrixRow {
                    user_id: "1".to_string(),
                    user_name: "Ann".to_string(),
                    statuses: vec![CompletionStatus::Completed, CompletionStatus::Incomplete],
                },
                MatrixRow {
                    user_id: "2".to_string(),
                    user_name: "Bo".to_string(),
                    statuses: vec![CompletionStatus::Incomplete, CompletionStatus::Incomplete],
                },
            ],
        };

        let mut buffer = Vec::new();
        write_matrix_csv(&matrix, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert_eq!(
            output,
            "User,Intro,Advanced\nAnn,Completed,Incomplete\nBo,Incomplete,Incomplete\n"
        );
    }

    #[test]
    fn test_matrix_csv_quotes_title_with_comma() {
        let matrix = CompletionMatrix {
            course_ids: vec!["10".to_string()],
            course_titles: vec!["Intro, Part 1".to_string()],
            rows: vec![MatrixRow {
                user_id: "1".to_string(),
                user_name: "Ann".to_string(),
                statuses: vec![CompletionStatus::Completed],
            }],
        };

        let mut buffer = Vec::new();
        write_matrix_csv(&matrix, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.starts_with("User,\"Intro, Part 1\"\n"));
    }

    #[test]
    fn test_quiz_csv_headers() {
        let records = vec![QuizRecord {
            user_id: "1".to_string(),
            user_name: "Ann".to_string(),
            quiz_id: "40".to_string(),
            quiz_title: "Final Exam".to_string(),
            course_id: "10".to_string(),
            course_title: "Intro".to_string(),
            earned_marks: "8.00".to_string(),
            total_marks: "10.00".to_string(),
            attempt_status: "attempt_ended".to_string(),
            completed_at: "2023-11-14 22:13:20".to_string(),
        }];

        let mut buffer = Vec::new();
        write_quiz_csv(&records, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.starts_with(
            "user_id,user_name,quiz_id,quiz_title,course_id,course_title,earned_marks,total_marks,attempt_status,completed_at\n"
        ));
        assert!(output.contains("Final Exam"));
    }

    #[test]
    fn test_dated_file_name_shape() {
        let name = dated_file_name("course_completions");
        assert!(name.starts_with("course_completions_"));
        assert!(name.ends_with(".csv"));
        // stem + '_' + YYYY-MM-DD + .csv
        assert_eq!(name.len(), "course_completions".len() + 1 + 10 + 4);
    }
}

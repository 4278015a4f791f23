use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use course_ledger::{
    dated_file_name, export_matrix, export_quiz, export_records, leaderboard, load_snapshot,
    split_dump, CompletionMatrix, CompletionReconciler, CompletionStats, CourseCatalog,
    QuizReconciler, QuizRecord, ReconciliationReport, UserDirectory, DEFAULT_TOP_LIMIT, VERSION,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("report");

    match command {
        "report" => run_report(&data_dir(&args)),
        "export" => run_export(&data_dir(&args), output_path(&args, "course_completions")),
        "matrix" => run_matrix(&data_dir(&args), output_path(&args, "full_course_report")),
        "quiz" => run_quiz(&data_dir(&args), output_path(&args, "quiz_completions")),
        "split" => run_split(&args),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            Err(anyhow!("Unknown command: {}", other))
        }
    }
}

fn data_dir(args: &[String]) -> PathBuf {
    PathBuf::from(args.get(2).map(String::as_str).unwrap_or("data"))
}

fn output_path(args: &[String], stem: &str) -> PathBuf {
    match args.get(3) {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(dated_file_name(stem)),
    }
}

fn print_usage() {
    println!("🎓 Course Ledger v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Usage: course-ledger <command> [data-dir] [output]");
    println!();
    println!("Commands:");
    println!("  report [data-dir]            Reconcile and print completion statistics");
    println!("  export [data-dir] [out.csv]  Write the reconciled records as CSV");
    println!("  matrix [data-dir] [out.csv]  Write the user x course status matrix as CSV");
    println!("  quiz   [data-dir] [out.csv]  Write quiz records as CSV with a leaderboard");
    println!("  split  <dump.json> <out-dir> Split a monolithic dump into per-table files");
    println!();
    println!("data-dir defaults to ./data");
}

/// Everything one run derives from a snapshot directory.
struct Ledger {
    directory: UserDirectory,
    catalog: CourseCatalog,
    report: ReconciliationReport,
    quiz_records: Vec<QuizRecord>,
}

fn build_ledger(dir: &Path) -> Ledger {
    // 1. Load tables
    println!("\n📂 Loading tables from {}...", dir.display());
    let load = load_snapshot(dir);
    for table in &load.tables {
        if table.loaded {
            println!("   ✓ {}: {} rows", table.kind.name(), table.rows);
        } else {
            println!("   ⚠ {}: degraded to empty", table.kind.name());
        }
    }

    // 2. Build lookups
    let snapshot = load.snapshot;
    println!("\n🧭 Building catalog...");
    let directory = UserDirectory::build(&snapshot.users);
    let catalog = CourseCatalog::build(&snapshot, &directory);
    println!(
        "   ✓ {} users, {} courses",
        directory.len(),
        catalog.course_count()
    );

    // 3. Reconcile
    println!("\n⚖️  Reconciling completions...");
    let report = CompletionReconciler::new().reconcile(&directory, &catalog, &snapshot.user_meta);
    println!("   ✓ {}", report.summary());

    let quiz_records =
        QuizReconciler::new().reconcile(&directory, &catalog, &snapshot.quiz_attempts);

    Ledger {
        directory,
        catalog,
        report,
        quiz_records,
    }
}

fn run_report(dir: &Path) -> Result<()> {
    println!("🎓 Course Ledger v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let ledger = build_ledger(dir);
    let stats =
        CompletionStats::compute(&ledger.report.records, &ledger.directory, &ledger.catalog);

    println!("\n📊 {}", stats.summary());

    println!("\n🏆 Top courses by completions:");
    for (rank, entry) in stats.top_courses(DEFAULT_TOP_LIMIT).iter().enumerate() {
        println!("   #{:<2} {:<40} {}", rank + 1, entry.label, entry.count);
    }

    println!("\n🥇 Top users by completions:");
    for (rank, entry) in stats.top_users(DEFAULT_TOP_LIMIT).iter().enumerate() {
        println!("   #{:<2} {:<40} {}", rank + 1, entry.label, entry.count);
    }

    println!("\n🕹️  {} quiz attempts on record", ledger.quiz_records.len());
    Ok(())
}

fn run_export(dir: &Path, out: PathBuf) -> Result<()> {
    println!("🎓 Course Ledger v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let ledger = build_ledger(dir);

    println!("\n💾 Writing records to {}...", out.display());
    export_records(&ledger.report.records, &out)?;
    println!("   ✓ {} records exported", ledger.report.records.len());
    Ok(())
}

fn run_matrix(dir: &Path, out: PathBuf) -> Result<()> {
    println!("🎓 Course Ledger v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let ledger = build_ledger(dir);
    let matrix = CompletionMatrix::build(&ledger.report.records, &ledger.directory);

    println!("\n💾 Writing matrix to {}...", out.display());
    export_matrix(&matrix, &out)?;
    println!(
        "   ✓ {} users x {} courses exported",
        matrix.rows.len(),
        matrix.course_ids.len()
    );
    Ok(())
}

fn run_quiz(dir: &Path, out: PathBuf) -> Result<()> {
    println!("🎓 Course Ledger v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let ledger = build_ledger(dir);

    println!("\n💾 Writing quiz records to {}...", out.display());
    export_quiz(&ledger.quiz_records, &out)?;
    println!("   ✓ {} quiz records exported", ledger.quiz_records.len());

    println!("\n🏅 Quiz leaderboard (by earned marks):");
    for (rank, record) in leaderboard(&ledger.quiz_records, DEFAULT_TOP_LIMIT)
        .iter()
        .enumerate()
    {
        println!(
            "   #{:<2} {:<25} {:<30} {}/{}",
            rank + 1,
            record.user_name,
            record.quiz_title,
            record.earned_marks,
            record.total_marks
        );
    }
    Ok(())
}

fn run_split(args: &[String]) -> Result<()> {
    let dump = args
        .get(2)
        .ok_or_else(|| anyhow!("Usage: course-ledger split <dump.json> <out-dir>"))?;
    let out_dir = args
        .get(3)
        .ok_or_else(|| anyhow!("Usage: course-ledger split <dump.json> <out-dir>"))?;

    println!("🎓 Course Ledger v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("\n🔪 Splitting {} into {}...", dump, out_dir);
    let written = split_dump(Path::new(dump), Path::new(out_dir))?;
    for (table, rows) in &written {
        println!("   ✓ {}.json: {} rows", table, rows);
    }
    println!("\n✅ {} table(s) written", written.len());
    Ok(())
}

// Course Ledger - Web Server
// REST API over one reconciled snapshot, loaded at startup

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use course_ledger::{
    leaderboard, load_snapshot, CompletionReconciler, CompletionRecord, CompletionStats,
    CourseCatalog, FilterOptions, QuizReconciler, QuizRecord, RankedEntry, UserDirectory,
    DEFAULT_TOP_LIMIT,
};

/// Shared application state. The snapshot is reconciled once at startup and
/// served read-only, so no locking is needed.
#[derive(Clone)]
struct AppState {
    records: Arc<Vec<CompletionRecord>>,
    quiz_records: Arc<Vec<QuizRecord>>,
    stats: Arc<CompletionStats>,
    filters: Arc<FilterOptions>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

/// Stats response
#[derive(Serialize)]
struct StatsResponse {
    total_users: usize,
    total_courses: usize,
    total_completions: usize,
    total_incomplete: usize,
    completion_rate: Option<f64>,
    top_courses: Vec<RankedEntry>,
    top_users: Vec<RankedEntry>,
    filters: FilterOptions,
}

/// Quiz response
#[derive(Serialize)]
struct QuizResponse {
    attempts: Vec<QuizRecord>,
    leaderboard: Vec<QuizRecord>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/records - All reconciled completion records
async fn get_records(State(state): State<AppState>) -> impl IntoResponse {
    let records: Vec<CompletionRecord> = state.records.as_ref().clone();
    (StatusCode::OK, Json(ApiResponse::ok(records)))
}

/// GET /api/filters/:status - Records filtered by completion status
async fn filter_records(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> impl IntoResponse {
    let wanted = status.to_lowercase();
    let filtered: Vec<CompletionRecord> = state
        .records
        .iter()
        .filter(|record| wanted == "all" || record.status.as_str().to_lowercase() == wanted)
        .cloned()
        .collect();

    (StatusCode::OK, Json(ApiResponse::ok(filtered)))
}

/// GET /api/quiz - Quiz attempts plus the leaderboard
async fn get_quiz(State(state): State<AppState>) -> impl IntoResponse {
    let response = QuizResponse {
        attempts: state.quiz_records.as_ref().clone(),
        leaderboard: leaderboard(&state.quiz_records, DEFAULT_TOP_LIMIT),
    };

    (StatusCode::OK, Json(ApiResponse::ok(response)))
}

/// GET /api/stats - Aggregate statistics and filter values
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = &state.stats;
    let response = StatsResponse {
        total_users: stats.total_users,
        total_courses: stats.total_courses,
        total_completions: stats.total_completions,
        total_incomplete: stats.total_incomplete,
        completion_rate: stats.completion_rate,
        top_courses: stats.top_courses(DEFAULT_TOP_LIMIT),
        top_users: stats.top_users(DEFAULT_TOP_LIMIT),
        filters: state.filters.as_ref().clone(),
    };

    (StatusCode::OK, Json(ApiResponse::ok(response)))
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Course Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Locate the snapshot directory
    let args: Vec<String> = std::env::args().collect();
    let data_dir = std::path::PathBuf::from(args.get(1).map(String::as_str).unwrap_or("data"));

    if !data_dir.exists() {
        eprintln!("❌ Data directory not found at {:?}", data_dir);
        eprintln!("   Export the LMS tables as JSON files into ./data first,");
        eprintln!("   or pass the directory: ledger-server <data-dir>");
        std::process::exit(1);
    }

    // Load and reconcile once; everything below serves this result
    let load = load_snapshot(&data_dir);
    println!("✓ {}", load.summary());
    if load.snapshot.is_empty() {
        eprintln!("⚠ All tables are empty; the API will serve empty results");
    }

    let snapshot = load.snapshot;
    let directory = UserDirectory::build(&snapshot.users);
    let catalog = CourseCatalog::build(&snapshot, &directory);
    let report = CompletionReconciler::new().reconcile(&directory, &catalog, &snapshot.user_meta);
    let quiz_records =
        QuizReconciler::new().reconcile(&directory, &catalog, &snapshot.quiz_attempts);
    let stats = CompletionStats::compute(&report.records, &directory, &catalog);
    let filters = FilterOptions::collect(&report.records);
    println!("✓ {}", report.summary());

    // Create shared state
    let state = AppState {
        records: Arc::new(report.records),
        quiz_records: Arc::new(quiz_records),
        stats: Arc::new(stats),
        filters: Arc::new(filters),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/records", get(get_records))
        .route("/quiz", get(get_quiz))
        .route("/stats", get(get_stats))
        .route("/filters/:status", get(filter_records))
        .with_state(state.clone());

    // Build main router
    let app = Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(CorsLayer::permissive());

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   API: http://localhost:3000/api/records");
    println!("   UI:  http://localhost:3000");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

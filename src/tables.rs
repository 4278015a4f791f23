// 🗂️ Raw Export Tables - Typed rows over the flat snapshot
// The export is loosely typed: ids arrive as strings or numbers, any field
// may be missing. Every field here has an explicit default policy so the
// joins downstream never have to guess.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// FIELD NORMALIZATION
// ============================================================================

/// Accept a JSON string, number, or bool and normalize it to a String.
/// Missing fields fall back to the empty string via `#[serde(default)]`.
fn flex_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value))
}

/// Same as `flex_string` but null stays None (nullable columns).
fn opt_flex_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        other => Ok(Some(scalar_to_string(&other))),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

// ============================================================================
// USER ROWS
// ============================================================================

/// One row of the user table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    /// Opaque identifier. The export writes it as "ID", sometimes numeric.
    #[serde(rename = "ID", default, deserialize_with = "flex_string")]
    pub id: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub display_name: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub user_login: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub user_email: String,
}

impl UserRow {
    /// Best human-readable label for this user:
    /// display name → login → email → raw id.
    pub fn best_name(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else if !self.user_login.is_empty() {
            &self.user_login
        } else if !self.user_email.is_empty() {
            &self.user_email
        } else {
            &self.id
        }
    }
}

// ============================================================================
// CONTENT NODE ROWS ("posts")
// ============================================================================

/// Coarse classification of a content node. Everything that is not a course,
/// lesson, or quiz takes part in parent-chain traversal but in no other join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Course,
    Lesson,
    Quiz,
    Other,
}

/// One row of the content table. Courses, lessons, and quizzes all live here,
/// distinguished only by `post_type`; the tree structure hides in
/// `post_parent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRow {
    #[serde(rename = "ID", default, deserialize_with = "flex_string")]
    pub id: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub post_type: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub post_title: String,

    /// Parent node id. "0" or empty means root.
    #[serde(default, deserialize_with = "flex_string")]
    pub post_parent: String,

    /// Author user id (instructor for courses).
    #[serde(default, deserialize_with = "flex_string")]
    pub post_author: String,

    /// Creation date-time, e.g. "2024-01-10 08:00:00". The date portion is
    /// the course upload date.
    #[serde(default, deserialize_with = "flex_string")]
    pub post_date: String,

    /// Publication status. "trash" rows are excluded from every join.
    #[serde(default, deserialize_with = "flex_string")]
    pub post_status: String,
}

impl PostRow {
    pub fn kind(&self) -> NodeKind {
        match self.post_type.as_str() {
            "courses" | "course" => NodeKind::Course,
            "lesson" => NodeKind::Lesson,
            "tutor_quiz" | "quiz" => NodeKind::Quiz,
            _ => NodeKind::Other,
        }
    }

    pub fn is_trashed(&self) -> bool {
        self.post_status == "trash"
    }

    /// Date portion of `post_date` ("2024-01-10 08:00:00" → "2024-01-10").
    pub fn upload_date(&self) -> &str {
        self.post_date.split(' ').next().unwrap_or("")
    }
}

// ============================================================================
// METADATA ROWS
// ============================================================================

/// One key/value row attached to a content node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMetaRow {
    #[serde(default, deserialize_with = "flex_string")]
    pub post_id: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub meta_key: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub meta_value: String,
}

/// One key/value row attached to a user. Completion events live here with the
/// lesson id encoded as a key suffix and a unix timestamp as the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetaRow {
    #[serde(default, deserialize_with = "flex_string")]
    pub user_id: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub meta_key: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub meta_value: String,
}

// ============================================================================
// QUIZ ATTEMPT ROWS
// ============================================================================

/// One quiz attempt. Unlike completion events, quiz/course references are
/// explicit columns here, so no hierarchy walk is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttemptRow {
    #[serde(default, deserialize_with = "flex_string")]
    pub user_id: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub quiz_id: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub course_id: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub earned_marks: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub total_marks: String,

    #[serde(default, deserialize_with = "flex_string")]
    pub attempt_status: String,

    /// Unix timestamp of the attempt end, null while in progress.
    #[serde(default, deserialize_with = "opt_flex_string")]
    pub attempt_ended_at: Option<String>,
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// The five loaded tables, treated as one immutable unit per run.
/// All derivations read from here; nothing ever writes back.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub users: Vec<UserRow>,
    pub posts: Vec<PostRow>,
    pub post_meta: Vec<PostMetaRow>,
    pub user_meta: Vec<UserMetaRow>,
    pub quiz_attempts: Vec<QuizAttemptRow>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.posts.is_empty()
            && self.post_meta.is_empty()
            && self.user_meta.is_empty()
            && self.quiz_attempts.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.users.len()
            + self.posts.len()
            + self.post_meta.len()
            + self.user_meta.len()
            + self.quiz_attempts.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

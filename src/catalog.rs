// 🧭 Catalog & Hierarchy Resolver - convention-encoded exports → typed lookups
// The export encodes relations by convention: lesson ancestry through
// post_parent chains, course audience under a magic meta key, instructors as
// author ids. This module builds every lookup exactly once per snapshot and
// answers the one hard question: which course does this lesson belong to?

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tables::{NodeKind, PostMetaRow, Snapshot, UserRow};

/// Upper bound on parent-chain hops. Keeps corrupted trees (cycles,
/// self-parents) from hanging the reconciliation.
pub const MAX_PARENT_HOPS: usize = 10;

/// Meta key carrying a course's target audience text.
pub const AUDIENCE_META_KEY: &str = "_tutor_course_target_audience";

// ============================================================================
// USER DIRECTORY
// ============================================================================

/// Id → display label lookup over the user table, preserving table order so
/// per-user aggregates enumerate the full universe deterministically.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    names: HashMap<String, String>,
    order: Vec<String>,
}

impl UserDirectory {
    pub fn build(users: &[UserRow]) -> Self {
        let mut names = HashMap::with_capacity(users.len());
        let mut order = Vec::with_capacity(users.len());
        for user in users {
            names.insert(user.id.clone(), user.best_name().to_string());
            order.push(user.id.clone());
        }
        UserDirectory { names, order }
    }

    /// Resolved display label for a user id, if the user is known.
    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Display label with the raw id as last resort. Unknown users and users
    /// whose every name field is blank both fall back to the id.
    pub fn name_or_id<'a>(&'a self, id: &'a str) -> &'a str {
        match self.names.get(id) {
            Some(name) if !name.is_empty() => name.as_str(),
            _ => id,
        }
    }

    /// All user ids in table order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
// COURSE CATALOG
// ============================================================================

/// Everything the reconciliation needs to know about one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseInfo {
    pub id: String,
    /// Raw title; may be empty, consumers decide the fallback.
    pub title: String,
    /// Date portion of the creation timestamp.
    pub upload_date: String,
    /// Author resolved through the user directory, raw author id otherwise.
    pub instructor_name: String,
    /// Audience text with newlines flattened to ", ".
    pub target_audience: String,
}

/// Course lookups plus the parent maps backing hierarchy resolution.
/// Trashed courses never enter the catalog, so they cannot be resolution
/// targets; trashed nodes still occur as intermediate links.
#[derive(Debug, Clone)]
pub struct CourseCatalog {
    courses: HashMap<String, CourseInfo>,
    course_order: Vec<String>,
    /// Every node's parent id, trashed or not.
    node_parent: HashMap<String, String>,
    /// Lesson id → parent id shortcut for the common one-hop case.
    lesson_parent: HashMap<String, String>,
    quiz_titles: HashMap<String, String>,
}

impl CourseCatalog {
    pub fn build(snapshot: &Snapshot, directory: &UserDirectory) -> Self {
        let audience = audience_by_post(&snapshot.post_meta);

        let mut courses = HashMap::new();
        let mut course_order = Vec::new();
        let mut node_parent = HashMap::new();
        let mut lesson_parent = HashMap::new();
        let mut quiz_titles = HashMap::new();

        for post in &snapshot.posts {
            node_parent.insert(post.id.clone(), post.post_parent.clone());

            match post.kind() {
                NodeKind::Course => {
                    if post.is_trashed() {
                        continue;
                    }
                    let info = CourseInfo {
                        id: post.id.clone(),
                        title: post.post_title.clone(),
                        upload_date: post.upload_date().to_string(),
                        instructor_name: directory.name_or_id(&post.post_author).to_string(),
                        target_audience: audience
                            .get(post.id.as_str())
                            .cloned()
                            .unwrap_or_default(),
                    };
                    if courses.insert(post.id.clone(), info).is_none() {
                        course_order.push(post.id.clone());
                    }
                }
                NodeKind::Lesson => {
                    if !post.is_trashed() {
                        lesson_parent.insert(post.id.clone(), post.post_parent.clone());
                    }
                }
                NodeKind::Quiz => {
                    if !post.is_trashed() {
                        quiz_titles.insert(post.id.clone(), post.post_title.clone());
                    }
                }
                NodeKind::Other => {}
            }
        }

        CourseCatalog {
            courses,
            course_order,
            node_parent,
            lesson_parent,
            quiz_titles,
        }
    }

    pub fn course(&self, id: &str) -> Option<&CourseInfo> {
        self.courses.get(id)
    }

    pub fn is_course(&self, id: &str) -> bool {
        self.courses.contains_key(id)
    }

    /// Known course ids in table order.
    pub fn course_ids(&self) -> &[String] {
        &self.course_order
    }

    pub fn course_count(&self) -> usize {
        self.course_order.len()
    }

    /// Quiz title lookup; empty titles count as absent.
    pub fn quiz_title(&self, id: &str) -> Option<&str> {
        self.quiz_titles
            .get(id)
            .map(String::as_str)
            .filter(|title| !title.is_empty())
    }

    /// Walk a content id up to the course that owns it.
    ///
    /// Lesson ids jump straight to their parent; any other id starts from
    /// itself. From there the parent chain is followed while the current id
    /// is not a known course, the current node exists, and the hop bound
    /// holds. Only a known, non-trashed course id is ever returned; anything
    /// else is unresolved.
    pub fn resolve_course(&self, start_id: &str) -> Option<String> {
        let mut current: String = match self.lesson_parent.get(start_id) {
            Some(parent) => parent.clone(),
            None => start_id.to_string(),
        };

        let mut hops = 0;
        while hops < MAX_PARENT_HOPS
            && !current.is_empty()
            && !self.courses.contains_key(&current)
        {
            match self.node_parent.get(&current) {
                Some(parent) => current = parent.clone(),
                None => break,
            }
            hops += 1;
        }

        if self.courses.contains_key(&current) {
            Some(current)
        } else {
            None
        }
    }
}

fn audience_by_post(meta: &[PostMetaRow]) -> HashMap<String, String> {
    let mut audience = HashMap::new();
    for row in meta {
        if row.meta_key == AUDIENCE_META_KEY {
            audience.insert(row.post_id.clone(), flatten_audience(&row.meta_value));
        }
    }
    audience
}

/// Audience values arrive as multi-line text; flatten to one comma list.
fn flatten_audience(raw: &str) -> String {
    raw.replace("\r\n", ", ").replace('\n', ", ")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PostRow;

    fn create_test_user(id: &str, display_name: &str) -> UserRow {
        UserRow {
            id: id.to_string(),
            display_name: display_name.to_string(),
            user_login: String::new(),
            user_email: String::new(),
        }
    }

    fn create_test_post(
        id: &str,
        post_type: &str,
        title: &str,
        parent: &str,
        status: &str,
    ) -> PostRow {
        PostRow {
            id: id.to_string(),
            post_type: post_type.to_string(),
            post_title: title.to_string(),
            post_parent: parent.to_string(),
            post_author: "9".to_string(),
            post_date: "2024-01-10 08:00:00".to_string(),
            post_status: status.to_string(),
        }
    }

    fn create_test_snapshot(posts: Vec<PostRow>) -> Snapshot {
        Snapshot {
            users: vec![create_test_user("9", "Prof. Reyes")],
            posts,
            ..Snapshot::default()
        }
    }

    fn build_catalog(snapshot: &Snapshot) -> CourseCatalog {
        let directory = UserDirectory::build(&snapshot.users);
        CourseCatalog::build(snapshot, &directory)
    }

    #[test]
    fn test_directory_name_fallbacks() {
        let users = vec![
            create_test_user("1", "Ann"),
            UserRow {
                id: "2".to_string(),
                display_name: String::new(),
                user_login: "bo".to_string(),
                user_email: String::new(),
            },
        ];
        let directory = UserDirectory::build(&users);

        assert_eq!(directory.name("1"), Some("Ann"));
        assert_eq!(directory.name_or_id("2"), "bo");
        assert_eq!(directory.name_or_id("404"), "404");
        assert_eq!(directory.ids(), &["1".to_string(), "2".to_string()]);
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_catalog_course_fields() {
        let mut snapshot = create_test_snapshot(vec![create_test_post(
            "10", "courses", "Intro to Rust", "0", "publish",
        )]);
        snapshot.post_meta.push(PostMetaRow {
            post_id: "10".to_string(),
            meta_key: AUDIENCE_META_KEY.to_string(),
            meta_value: "Nurses\r\nDoctors\nStudents".to_string(),
        });

        let catalog = build_catalog(&snapshot);
        let course = catalog.course("10").unwrap();
        assert_eq!(course.title, "Intro to Rust");
        assert_eq!(course.upload_date, "2024-01-10");
        assert_eq!(course.instructor_name, "Prof. Reyes");
        assert_eq!(course.target_audience, "Nurses, Doctors, Students");
        assert_eq!(catalog.course_count(), 1);
        assert!(catalog.is_course("10"));
    }

    #[test]
    fn test_catalog_unknown_author_keeps_raw_id() {
        let mut post = create_test_post("10", "courses", "Intro", "0", "publish");
        post.post_author = "777".to_string();
        let snapshot = create_test_snapshot(vec![post]);

        let catalog = build_catalog(&snapshot);
        assert_eq!(catalog.course("10").unwrap().instructor_name, "777");
    }

    #[test]
    fn test_catalog_excludes_trashed_courses() {
        let snapshot = create_test_snapshot(vec![
            create_test_post("10", "courses", "Live", "0", "publish"),
            create_test_post("11", "courses", "Gone", "0", "trash"),
        ]);

        let catalog = build_catalog(&snapshot);
        assert!(catalog.is_course("10"));
        assert!(!catalog.is_course("11"));
        assert_eq!(catalog.course_ids(), &["10".to_string()]);
    }

    #[test]
    fn test_catalog_duplicate_course_rows_keep_first_position() {
        let snapshot = create_test_snapshot(vec![
            create_test_post("10", "courses", "First", "0", "publish"),
            create_test_post("11", "courses", "Other", "0", "publish"),
            create_test_post("10", "courses", "Rewritten", "0", "publish"),
        ]);

        let catalog = build_catalog(&snapshot);
        assert_eq!(catalog.course_ids(), &["10".to_string(), "11".to_string()]);
        // Last row wins the content, first row wins the position.
        assert_eq!(catalog.course("10").unwrap().title, "Rewritten");
    }

    #[test]
    fn test_resolve_course_id_is_already_a_course() {
        let snapshot =
            create_test_snapshot(vec![create_test_post("10", "courses", "Intro", "0", "publish")]);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("10"), Some("10".to_string()));
    }

    #[test]
    fn test_resolve_course_lesson_jumps_to_parent() {
        let snapshot = create_test_snapshot(vec![
            create_test_post("10", "courses", "Intro", "0", "publish"),
            create_test_post("11", "lesson", "Lesson 1", "10", "publish"),
        ]);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("11"), Some("10".to_string()));
    }

    #[test]
    fn test_resolve_course_walks_through_topics() {
        // lesson → topic → course, the usual LMS nesting
        let snapshot = create_test_snapshot(vec![
            create_test_post("10", "courses", "Intro", "0", "publish"),
            create_test_post("20", "topics", "Week 1", "10", "publish"),
            create_test_post("30", "lesson", "Lesson 1", "20", "publish"),
        ]);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("30"), Some("10".to_string()));
    }

    #[test]
    fn test_resolve_course_unknown_id_is_unresolved() {
        let snapshot =
            create_test_snapshot(vec![create_test_post("10", "courses", "Intro", "0", "publish")]);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("999"), None);
    }

    #[test]
    fn test_resolve_course_trashed_course_is_not_a_target() {
        let snapshot = create_test_snapshot(vec![
            create_test_post("10", "courses", "Gone", "0", "trash"),
            create_test_post("11", "lesson", "Lesson", "10", "publish"),
        ]);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("11"), None);
    }

    #[test]
    fn test_resolve_course_within_hop_bound() {
        // course ← n1 ← n2 ... ← n10, resolving from n10 takes exactly 10 hops
        let mut posts = vec![create_test_post("100", "courses", "Deep", "0", "publish")];
        let mut parent = "100".to_string();
        for i in 1..=10 {
            let id = format!("n{}", i);
            posts.push(create_test_post(&id, "topics", "level", &parent, "publish"));
            parent = id;
        }
        let snapshot = create_test_snapshot(posts);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("n10"), Some("100".to_string()));
    }

    #[test]
    fn test_resolve_course_beyond_hop_bound_is_unresolved() {
        let mut posts = vec![create_test_post("100", "courses", "Deep", "0", "publish")];
        let mut parent = "100".to_string();
        for i in 1..=11 {
            let id = format!("n{}", i);
            posts.push(create_test_post(&id, "topics", "level", &parent, "publish"));
            parent = id;
        }
        let snapshot = create_test_snapshot(posts);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("n11"), None);
    }

    #[test]
    fn test_resolve_course_survives_parent_cycle() {
        let snapshot = create_test_snapshot(vec![
            create_test_post("20", "topics", "A", "21", "publish"),
            create_test_post("21", "topics", "B", "20", "publish"),
            create_test_post("30", "lesson", "Lost", "20", "publish"),
        ]);
        let catalog = build_catalog(&snapshot);

        // Terminates at the hop bound instead of spinning.
        assert_eq!(catalog.resolve_course("30"), None);
    }

    #[test]
    fn test_resolve_course_zero_parent_is_unresolved() {
        let snapshot = create_test_snapshot(vec![create_test_post(
            "30", "lesson", "Orphan", "0", "publish",
        )]);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.resolve_course("30"), None);
    }

    #[test]
    fn test_quiz_title_lookup() {
        let snapshot = create_test_snapshot(vec![
            create_test_post("40", "tutor_quiz", "Final Exam", "10", "publish"),
            create_test_post("41", "tutor_quiz", "", "10", "publish"),
            create_test_post("42", "tutor_quiz", "Trashed", "10", "trash"),
        ]);
        let catalog = build_catalog(&snapshot);

        assert_eq!(catalog.quiz_title("40"), Some("Final Exam"));
        assert_eq!(catalog.quiz_title("41"), None);
        assert_eq!(catalog.quiz_title("42"), None);
    }

    #[test]
    fn test_flatten_audience() {
        assert_eq!(flatten_audience("A\r\nB\nC"), "A, B, C");
        assert_eq!(flatten_audience("plain"), "plain");
        assert_eq!(flatten_audience(""), "");
    }
}

//! Persistent store seam: the course/module/lesson/video records and the
//! `CourseStore` trait the importer drives. `db` holds the sqlx/Postgres
//! implementation; tests run against the in-memory double in `memory`.

pub mod db;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

/// Transcoding state tag carried on videos. This pipeline never advances it;
/// imported external videos stay at the default.
pub const TRANSCODING_NOT_APPLICABLE: &str = "n/a";

#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub position: u32,
}

/// Deduplicated by `external_url`; shared across lessons and never mutated on
/// reimport.
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub id: Uuid,
    pub external_url: String,
    pub title: String,
    pub duration_seconds: u32,
    pub thumbnail_url: Option<String>,
    pub transcoding_status: String,
}

/// Deduplicated by `(module_id, title)`. `position` is assigned once at
/// creation and never renumbered; `video_id` is a weak reference that may be
/// attached later (repair-on-reimport).
#[derive(Debug, Clone)]
pub struct LessonRecord {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub position: u32,
    pub expected_duration_seconds: u32,
    pub video_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewCourse<'a> {
    pub owner_id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone)]
pub struct NewVideo<'a> {
    pub external_url: &'a str,
    pub title: &'a str,
    pub duration_seconds: u32,
    pub thumbnail_url: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewLesson<'a> {
    pub module_id: Uuid,
    pub title: &'a str,
    pub position: u32,
    pub expected_duration_seconds: u32,
    pub video_id: Option<Uuid>,
}

/// The store operations the ingestion core needs, abstracted from any
/// concrete backend.
///
/// The find-then-create pairs are not serialized against concurrent callers;
/// two racing imports can both observe "absent". The unique constraints the
/// backend enforces (course slug, video external_url, lesson (module, title)
/// and (module, position)) are the backstop, surfacing as
/// [`StoreError::UniqueViolation`].
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Create a course, deriving its slug from the title. A slug collision
    /// is reported as [`StoreError::UniqueViolation`]; each attempt is
    /// all-or-nothing.
    async fn create_course(&self, new: NewCourse<'_>) -> Result<CourseRecord, StoreError>;

    async fn create_module(
        &self,
        course_id: Uuid,
        title: &str,
        position: u32,
    ) -> Result<ModuleRecord, StoreError>;

    async fn find_module(&self, module_id: Uuid) -> Result<Option<ModuleRecord>, StoreError>;

    async fn find_video_by_external_url(
        &self,
        external_url: &str,
    ) -> Result<Option<VideoRecord>, StoreError>;

    async fn create_video(&self, new: NewVideo<'_>) -> Result<VideoRecord, StoreError>;

    async fn find_lesson(
        &self,
        module_id: Uuid,
        title: &str,
    ) -> Result<Option<LessonRecord>, StoreError>;

    async fn create_lesson(&self, new: NewLesson<'_>) -> Result<LessonRecord, StoreError>;

    async fn attach_video_to_lesson(
        &self,
        lesson_id: Uuid,
        video_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Current maximum lesson position in the module, 0 when it has none.
    /// Read once per import call; see the trait-level race note.
    async fn max_lesson_position(&self, module_id: Uuid) -> Result<u32, StoreError>;
}

/// Lowercase ASCII slug: alphanumerics kept, everything else collapsed to a
/// single `-`, leading/trailing dashes trimmed.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut dash_pending = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if dash_pending && !out.is_empty() {
                out.push('-');
            }
            dash_pending = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            dash_pending = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World!"), "hello-world");
        assert_eq!(slugify("(Test) Course"), "test-course");
        assert_eq!(slugify("Rust 101 - Intro"), "rust-101-intro");
    }

    #[test]
    fn slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("  --a__b--  "), "a-b");
        assert_eq!(slugify("***"), "");
    }
}

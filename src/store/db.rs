//! Postgres-backed store: the shared pool wrapper plus the `CourseStore`
//! implementation.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Row,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    slugify, CourseRecord, CourseStore, LessonRecord, ModuleRecord, NewCourse, NewLesson,
    NewVideo, VideoRecord, TRANSCODING_NOT_APPLICABLE,
};
use crate::error::StoreError;
use crate::util::env::env_flag;

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        // Be explicit when the DSN asks for TLS.
        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !env_flag("USE_PREPARED", false) {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        // Migrations only run when explicitly requested; the default leaves
        // existing schemas alone.
        if env_flag("AUTO_MIGRATE", false) {
            info!("running migrations (AUTO_MIGRATE=on)");
            sqlx::migrate!("./migrations").run(&pool).await?;
        } else {
            info!("AUTO_MIGRATE disabled; skipping migrations");
        }
        Ok(Self { pool })
    }
}

/// `CourseStore` over the shared Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CourseStore for PgStore {
    #[instrument(skip(self, new), fields(title = new.title))]
    async fn create_course(&self, new: NewCourse<'_>) -> Result<CourseRecord, StoreError> {
        let mut slug = slugify(new.title);
        if slug.is_empty() {
            slug = "course".to_string();
        }
        let row = sqlx::query(
            "INSERT INTO courses (owner_id, title, slug, description, is_published)
             VALUES ($1, $2, $3, $4, FALSE)
             RETURNING id, owner_id, title, slug, description, is_published, created_at",
        )
        .persistent(false)
        .bind(new.owner_id)
        .bind(new.title)
        .bind(&slug)
        .bind(new.description)
        .fetch_one(&self.db.pool)
        .await?;
        debug!(course_id = %row.get::<Uuid, _>("id"), %slug, "course inserted");
        Ok(CourseRecord {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
            is_published: row.get("is_published"),
            created_at: row.get("created_at"),
        })
    }

    #[instrument(skip(self))]
    async fn create_module(
        &self,
        course_id: Uuid,
        title: &str,
        position: u32,
    ) -> Result<ModuleRecord, StoreError> {
        let row = sqlx::query(
            "INSERT INTO modules (course_id, title, position)
             VALUES ($1, $2, $3)
             RETURNING id, course_id, title, position",
        )
        .persistent(false)
        .bind(course_id)
        .bind(title)
        .bind(position as i32)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(ModuleRecord {
            id: row.get("id"),
            course_id: row.get("course_id"),
            title: row.get("title"),
            position: row.get::<i32, _>("position") as u32,
        })
    }

    async fn find_module(&self, module_id: Uuid) -> Result<Option<ModuleRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, course_id, title, position FROM modules WHERE id = $1",
        )
        .persistent(false)
        .bind(module_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(|r| ModuleRecord {
            id: r.get("id"),
            course_id: r.get("course_id"),
            title: r.get("title"),
            position: r.get::<i32, _>("position") as u32,
        }))
    }

    async fn find_video_by_external_url(
        &self,
        external_url: &str,
    ) -> Result<Option<VideoRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, external_url, title, duration_seconds, thumbnail_url, transcoding_status
             FROM videos WHERE external_url = $1",
        )
        .persistent(false)
        .bind(external_url)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(video_from_row))
    }

    #[instrument(skip(self, new), fields(external_url = new.external_url))]
    async fn create_video(&self, new: NewVideo<'_>) -> Result<VideoRecord, StoreError> {
        let row = sqlx::query(
            "INSERT INTO videos (external_url, title, duration_seconds, thumbnail_url, transcoding_status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, external_url, title, duration_seconds, thumbnail_url, transcoding_status",
        )
        .persistent(false)
        .bind(new.external_url)
        .bind(new.title)
        .bind(new.duration_seconds as i32)
        .bind(new.thumbnail_url)
        .bind(TRANSCODING_NOT_APPLICABLE)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(video_from_row(row))
    }

    async fn find_lesson(
        &self,
        module_id: Uuid,
        title: &str,
    ) -> Result<Option<LessonRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, module_id, title, position, expected_duration_seconds, video_id
             FROM lessons WHERE module_id = $1 AND title = $2",
        )
        .persistent(false)
        .bind(module_id)
        .bind(title)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(lesson_from_row))
    }

    #[instrument(skip(self, new), fields(module_id = %new.module_id, position = new.position))]
    async fn create_lesson(&self, new: NewLesson<'_>) -> Result<LessonRecord, StoreError> {
        let row = sqlx::query(
            "INSERT INTO lessons (module_id, title, position, expected_duration_seconds, video_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, module_id, title, position, expected_duration_seconds, video_id",
        )
        .persistent(false)
        .bind(new.module_id)
        .bind(new.title)
        .bind(new.position as i32)
        .bind(new.expected_duration_seconds as i32)
        .bind(new.video_id)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(lesson_from_row(row))
    }

    #[instrument(skip(self))]
    async fn attach_video_to_lesson(
        &self,
        lesson_id: Uuid,
        video_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE lessons SET video_id = $2, updated_at = now() WHERE id = $1")
            .persistent(false)
            .bind(lesson_id)
            .bind(video_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    async fn max_lesson_position(&self, module_id: Uuid) -> Result<u32, StoreError> {
        let max: Option<i32> =
            sqlx::query_scalar("SELECT MAX(position) FROM lessons WHERE module_id = $1")
                .persistent(false)
                .bind(module_id)
                .fetch_one(&self.db.pool)
                .await?;
        Ok(max.unwrap_or(0).max(0) as u32)
    }
}

fn video_from_row(row: sqlx::postgres::PgRow) -> VideoRecord {
    VideoRecord {
        id: row.get("id"),
        external_url: row.get("external_url"),
        title: row.get("title"),
        duration_seconds: row.get::<i32, _>("duration_seconds").max(0) as u32,
        thumbnail_url: row.get("thumbnail_url"),
        transcoding_status: row.get("transcoding_status"),
    }
}

fn lesson_from_row(row: sqlx::postgres::PgRow) -> LessonRecord {
    LessonRecord {
        id: row.get("id"),
        module_id: row.get("module_id"),
        title: row.get("title"),
        position: row.get::<i32, _>("position").max(0) as u32,
        expected_duration_seconds: row.get::<i32, _>("expected_duration_seconds").max(0) as u32,
        video_id: row.get("video_id"),
    }
}

//! In-memory `CourseStore` double for unit tests. Enforces the same unique
//! constraints as the Postgres DDL so constraint-violation paths can be
//! exercised without a database, and counts `create_course` calls for the
//! slug-retry bound tests.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    slugify, CourseRecord, CourseStore, LessonRecord, ModuleRecord, NewCourse, NewLesson,
    NewVideo, VideoRecord, TRANSCODING_NOT_APPLICABLE,
};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    courses: Vec<CourseRecord>,
    modules: Vec<ModuleRecord>,
    videos: Vec<VideoRecord>,
    lessons: Vec<LessonRecord>,
    course_create_calls: u32,
    forced_slug_conflicts: u32,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` `create_course` calls fail with a slug conflict
    /// regardless of the slug. `u32::MAX` conflicts forever.
    pub fn force_slug_conflicts(&self, n: u32) {
        self.inner.lock().unwrap().forced_slug_conflicts = n;
    }

    pub fn course_create_calls(&self) -> u32 {
        self.inner.lock().unwrap().course_create_calls
    }

    pub fn videos(&self) -> Vec<VideoRecord> {
        self.inner.lock().unwrap().videos.clone()
    }

    pub fn lessons_in_module(&self, module_id: Uuid) -> Vec<LessonRecord> {
        let mut lessons: Vec<LessonRecord> = self
            .inner
            .lock()
            .unwrap()
            .lessons
            .iter()
            .filter(|l| l.module_id == module_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.position);
        lessons
    }

    /// Seed a bare module without a parent course, for importer-only tests.
    pub fn seed_module(&self, title: &str) -> ModuleRecord {
        let module = ModuleRecord {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: title.to_string(),
            position: 1,
        };
        self.inner.lock().unwrap().modules.push(module.clone());
        module
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn create_course(&self, new: NewCourse<'_>) -> Result<CourseRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.course_create_calls += 1;
        if inner.forced_slug_conflicts > 0 {
            if inner.forced_slug_conflicts != u32::MAX {
                inner.forced_slug_conflicts -= 1;
            }
            return Err(StoreError::UniqueViolation("courses_slug_key".to_string()));
        }
        let slug = slugify(new.title);
        if inner.courses.iter().any(|c| c.slug == slug) {
            return Err(StoreError::UniqueViolation("courses_slug_key".to_string()));
        }
        let course = CourseRecord {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            title: new.title.to_string(),
            slug,
            description: new.description.to_string(),
            is_published: false,
            created_at: chrono::Utc::now(),
        };
        inner.courses.push(course.clone());
        Ok(course)
    }

    async fn create_module(
        &self,
        course_id: Uuid,
        title: &str,
        position: u32,
    ) -> Result<ModuleRecord, StoreError> {
        let module = ModuleRecord {
            id: Uuid::new_v4(),
            course_id,
            title: title.to_string(),
            position,
        };
        self.inner.lock().unwrap().modules.push(module.clone());
        Ok(module)
    }

    async fn find_module(&self, module_id: Uuid) -> Result<Option<ModuleRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .modules
            .iter()
            .find(|m| m.id == module_id)
            .cloned())
    }

    async fn find_video_by_external_url(
        &self,
        external_url: &str,
    ) -> Result<Option<VideoRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .videos
            .iter()
            .find(|v| v.external_url == external_url)
            .cloned())
    }

    async fn create_video(&self, new: NewVideo<'_>) -> Result<VideoRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.videos.iter().any(|v| v.external_url == new.external_url) {
            return Err(StoreError::UniqueViolation(
                "videos_external_url_key".to_string(),
            ));
        }
        let video = VideoRecord {
            id: Uuid::new_v4(),
            external_url: new.external_url.to_string(),
            title: new.title.to_string(),
            duration_seconds: new.duration_seconds,
            thumbnail_url: new.thumbnail_url.map(str::to_string),
            transcoding_status: TRANSCODING_NOT_APPLICABLE.to_string(),
        };
        inner.videos.push(video.clone());
        Ok(video)
    }

    async fn find_lesson(
        &self,
        module_id: Uuid,
        title: &str,
    ) -> Result<Option<LessonRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lessons
            .iter()
            .find(|l| l.module_id == module_id && l.title == title)
            .cloned())
    }

    async fn create_lesson(&self, new: NewLesson<'_>) -> Result<LessonRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .lessons
            .iter()
            .any(|l| l.module_id == new.module_id && l.title == new.title)
        {
            return Err(StoreError::UniqueViolation(
                "lessons_module_id_title_key".to_string(),
            ));
        }
        if inner
            .lessons
            .iter()
            .any(|l| l.module_id == new.module_id && l.position == new.position)
        {
            return Err(StoreError::UniqueViolation(
                "lessons_module_id_position_key".to_string(),
            ));
        }
        let lesson = LessonRecord {
            id: Uuid::new_v4(),
            module_id: new.module_id,
            title: new.title.to_string(),
            position: new.position,
            expected_duration_seconds: new.expected_duration_seconds,
            video_id: new.video_id,
        };
        inner.lessons.push(lesson.clone());
        Ok(lesson)
    }

    async fn attach_video_to_lesson(
        &self,
        lesson_id: Uuid,
        video_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.lessons.iter_mut().find(|l| l.id == lesson_id) {
            Some(lesson) => {
                lesson.video_id = Some(video_id);
                Ok(())
            }
            None => Err(StoreError::Backend(anyhow::anyhow!(
                "lesson {lesson_id} not found"
            ))),
        }
    }

    async fn max_lesson_position(&self, module_id: Uuid) -> Result<u32, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lessons
            .iter()
            .filter(|l| l.module_id == module_id)
            .map(|l| l.position)
            .max()
            .unwrap_or(0))
    }
}

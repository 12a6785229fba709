//! The reconciling importer and the caller-facing entry points.
//!
//! Each entry point runs one synchronous pipeline pass: extract the playlist
//! id, fetch every page, resolve durations in batches, then walk the items in
//! fetch order reconciling against the store. Re-running against an unchanged
//! playlist creates nothing and leaves ordering untouched.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ImportError, StoreError};
use crate::store::{CourseRecord, CourseStore, ModuleRecord, NewCourse, NewLesson, NewVideo};
use crate::youtube::{
    extract_playlist_id, fetch_playlist_items, resolve_durations, PlaylistApi, PlaylistItem,
};

/// Bound on slug-collision retries when creating a course.
pub const MAX_SLUG_ATTEMPTS: u32 = 10;

/// Module title used for the bootstrap module of a freshly imported course.
const BOOTSTRAP_MODULE_TITLE: &str = "Playlist";

/// How many records one import pass actually created (as opposed to reused).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub videos_created: u32,
    pub lessons_created: u32,
}

/// Result of the import-as-new-course entry point.
#[derive(Debug, Clone)]
pub struct NewCourseImport {
    pub course: CourseRecord,
    pub module: ModuleRecord,
    pub counts: ImportCounts,
}

/// Row of the read-only preview listing (fetch + resolve, no writes).
#[derive(Debug, Clone, Serialize)]
pub struct PreviewItem {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: u32,
    pub watch_url: String,
}

/// Canonical external URL for a video id. This is the video dedup key, so the
/// template must never change shape.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

fn lesson_title(item: &PlaylistItem, index_1_based: usize) -> String {
    if item.title.trim().is_empty() {
        // Keep the (module, title) dedup key non-empty.
        format!("Video {index_1_based}")
    } else {
        item.title.clone()
    }
}

/// Walk `items` in fetch order, reconciling videos (by external URL) and
/// lessons (by module + title) against the store.
///
/// Lesson positions continue from the module's max position as read once at
/// the start of the call, offset by each item's 1-based fetch index; they are
/// never renumbered or compacted, so overlapping re-imports may leave gaps
/// while staying strictly increasing. The read-then-create steps take no
/// lock: concurrent imports into the same module are not ordering-safe and
/// are guarded only by the store's unique constraints.
#[instrument(skip_all, fields(module_id = %module_id, items = items.len()))]
pub async fn import_playlist_into_module(
    store: &dyn CourseStore,
    module_id: Uuid,
    items: &[PlaylistItem],
    durations: &HashMap<String, u32>,
) -> Result<ImportCounts, ImportError> {
    let mut counts = ImportCounts::default();
    let current_max = store.max_lesson_position(module_id).await?;

    for (idx, item) in items.iter().enumerate() {
        let offset = idx + 1;
        let title = lesson_title(item, offset);
        let url = watch_url(&item.video_id);
        let duration = durations.get(&item.video_id).copied().unwrap_or(0);

        let video = match store.find_video_by_external_url(&url).await? {
            Some(existing) => existing,
            None => {
                counts.videos_created += 1;
                store
                    .create_video(NewVideo {
                        external_url: &url,
                        title: &title,
                        duration_seconds: duration,
                        thumbnail_url: item.thumbnail_url.as_deref(),
                    })
                    .await?
            }
        };

        match store.find_lesson(module_id, &title).await? {
            Some(lesson) => {
                if lesson.video_id.is_none() {
                    // Repair-on-reimport: an earlier run created the lesson
                    // but never linked its video. Position stays put.
                    debug!(lesson_id = %lesson.id, video_id = %video.id, "attaching video to lesson");
                    store.attach_video_to_lesson(lesson.id, video.id).await?;
                }
            }
            None => {
                counts.lessons_created += 1;
                store
                    .create_lesson(NewLesson {
                        module_id,
                        title: &title,
                        position: current_max + offset as u32,
                        expected_duration_seconds: duration,
                        video_id: Some(video.id),
                    })
                    .await?;
            }
        }
    }

    info!(
        videos_created = counts.videos_created,
        lessons_created = counts.lessons_created,
        "import pass complete"
    );
    Ok(counts)
}

/// Create a course, retrying slug collisions with a short random
/// disambiguator up to [`MAX_SLUG_ATTEMPTS`] times. Every other store error
/// is terminal immediately; exhausting the bound surfaces as
/// [`ImportError::SlugExhausted`].
pub async fn create_course_with_unique_slug(
    store: &dyn CourseStore,
    owner_id: Uuid,
    base_title: &str,
    description: &str,
) -> Result<CourseRecord, ImportError> {
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let title = if attempt == 1 {
            base_title.to_string()
        } else {
            let tag = Uuid::new_v4().simple().to_string();
            format!("{} - {}", base_title, &tag[..8])
        };
        match store
            .create_course(NewCourse {
                owner_id,
                title: &title,
                description,
            })
            .await
        {
            Ok(course) => return Ok(course),
            Err(StoreError::UniqueViolation(constraint)) => {
                warn!(attempt, %constraint, "course slug collision, retrying");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ImportError::SlugExhausted {
        attempts: MAX_SLUG_ATTEMPTS,
    })
}

/// Import a playlist (URL or bare id) into an existing module.
#[instrument(skip(api, store))]
pub async fn import_into_existing_module(
    api: &dyn PlaylistApi,
    store: &dyn CourseStore,
    module_id: Uuid,
    playlist_url_or_id: &str,
) -> Result<ImportCounts, ImportError> {
    let module = store
        .find_module(module_id)
        .await?
        .ok_or_else(|| ImportError::Input(format!("module {module_id} not found")))?;

    let playlist_id = extract_playlist_id(playlist_url_or_id);
    let items = fetch_playlist_items(api, &playlist_id).await?;
    if items.is_empty() {
        return Ok(ImportCounts::default());
    }
    let video_ids: Vec<String> = items.iter().map(|i| i.video_id.clone()).collect();
    let durations = resolve_durations(api, &video_ids).await?;
    import_playlist_into_module(store, module.id, &items, &durations).await
}

/// Import a playlist as a brand-new (unpublished) course: allocate a
/// slug-unique course, add a bootstrap "Playlist" module at position 1, then
/// run the normal import into it.
#[instrument(skip(api, store, description))]
pub async fn import_as_new_course(
    api: &dyn PlaylistApi,
    store: &dyn CourseStore,
    owner_id: Uuid,
    playlist_url_or_id: &str,
    title: &str,
    description: &str,
) -> Result<NewCourseImport, ImportError> {
    if playlist_url_or_id.trim().is_empty() {
        return Err(ImportError::Input("playlist identifier is required".to_string()));
    }
    let course = create_course_with_unique_slug(store, owner_id, title, description).await?;
    let module = store
        .create_module(course.id, BOOTSTRAP_MODULE_TITLE, 1)
        .await?;
    let counts =
        import_into_existing_module(api, store, module.id, playlist_url_or_id).await?;
    Ok(NewCourseImport {
        course,
        module,
        counts,
    })
}

/// Fetch and resolve a playlist without touching the store: the merged view
/// a caller can show before committing to an import.
pub async fn preview_playlist(
    api: &dyn PlaylistApi,
    playlist_url_or_id: &str,
) -> Result<Vec<PreviewItem>, ImportError> {
    let playlist_id = extract_playlist_id(playlist_url_or_id);
    let items = fetch_playlist_items(api, &playlist_id).await?;
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let video_ids: Vec<String> = items.iter().map(|i| i.video_id.clone()).collect();
    let durations = resolve_durations(api, &video_ids).await?;
    Ok(items
        .into_iter()
        .map(|item| {
            let duration_seconds = durations.get(&item.video_id).copied().unwrap_or(0);
            let watch_url = watch_url(&item.video_id);
            PreviewItem {
                video_id: item.video_id,
                title: item.title,
                thumbnail_url: item.thumbnail_url,
                duration_seconds,
                watch_url,
            }
        })
        .collect())
}

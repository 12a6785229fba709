//! CourseForge: materialize third-party video playlists into a local
//! course -> module -> lesson tree, idempotently.
//!
//! The pipeline is Extractor -> Fetcher -> Resolver -> Importer; see
//! [`import::import_into_existing_module`] and [`import::import_as_new_course`]
//! for the two caller-facing entry points.

pub mod error;
pub mod import;
pub mod store;
pub mod trace;
pub mod youtube;

pub mod util {
    pub mod env;
}

pub use error::{ImportError, StoreError};
pub use import::{import_as_new_course, import_into_existing_module, ImportCounts};

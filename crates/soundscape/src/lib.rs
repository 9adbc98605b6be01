//! `soundscape` - Archive and explore geotagged environmental sounds
//!
//! This library stores sound recordings together with where they were
//! captured and how they feel, serves them over a JSON API, and aggregates
//! the collection into emotion, location and activity summaries.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analytics;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod geo;
pub mod logging;
pub mod seed;
pub mod sound;
pub mod storage;
pub mod upload;

pub use analytics::{Aggregator, AnalyticsReport};
pub use api::{build_router, AppState};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use sound::{AudioQuality, Coordinates, NewSound, SoundRecord, SoundUpdate};
pub use storage::{SearchFilter, Storage, StorageStats};
pub use upload::{UploadPolicy, UploadStore};

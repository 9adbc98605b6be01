//! Audio upload handling.
//!
//! Validates incoming audio files, gives them collision-free names and stores
//! them in the uploads directory served under `/uploads/`.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::format::format_file_size;

/// URL prefix under which stored audio is served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

/// How many fresh names `save` tries before giving up on a crowded second.
const MAX_NAME_ATTEMPTS: u32 = 8;

static NAME_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Supported audio container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG layer 3.
    Mp3,
    /// RIFF wave.
    Wav,
    /// Ogg Vorbis/Opus.
    Ogg,
    /// MPEG-4 audio.
    M4a,
}

impl AudioFormat {
    /// Every supported format.
    pub const ALL: [Self; 4] = [Self::Mp3, Self::Wav, Self::Ogg, Self::M4a];

    /// Parse a file extension (case-insensitive, leading dot optional).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "ogg" => Some(Self::Ogg),
            "m4a" => Some(Self::M4a),
            _ => None,
        }
    }

    /// Detect the format from a file name's extension.
    #[must_use]
    pub fn from_filename(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Canonical file extension.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::M4a => "m4a",
        }
    }

    /// MIME type served for this format.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::M4a => "audio/mp4",
        }
    }
}

/// Rules an upload must satisfy.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Accepted formats.
    pub allowed: Vec<AudioFormat>,
    /// Largest accepted file in bytes.
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed: AudioFormat::ALL.to_vec(),
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

impl UploadPolicy {
    /// Check a candidate upload and return its detected format.
    ///
    /// When the client supplied a content type it must be an `audio/*` type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadRejected`] describing the first failed rule.
    pub fn validate(
        &self,
        filename: &str,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<AudioFormat> {
        if filename.trim().is_empty() {
            return Err(Error::upload_rejected("no file selected"));
        }

        let format = AudioFormat::from_filename(filename)
            .filter(|f| self.allowed.contains(f))
            .ok_or_else(|| {
                let allowed: Vec<&str> = self.allowed.iter().map(AudioFormat::extension).collect();
                Error::upload_rejected(format!(
                    "format not allowed, use one of: {}",
                    allowed.join(", ")
                ))
            })?;

        if size == 0 {
            return Err(Error::upload_rejected("file is empty"));
        }

        if size > self.max_bytes {
            return Err(Error::upload_rejected(format!(
                "file too large, maximum is {}",
                format_file_size(self.max_bytes)
            )));
        }

        if let Some(ct) = content_type {
            let ct = ct.trim().to_ascii_lowercase();
            if !ct.is_empty() && ct != "application/octet-stream" && !ct.starts_with("audio/") {
                return Err(Error::upload_rejected(format!(
                    "content type {ct} is not audio"
                )));
            }
        }

        Ok(format)
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex is valid"))
}

/// Reduce a client-supplied file name to a safe basename.
///
/// Directory components are dropped, runs of unsafe characters become `_`
/// and leading dots are stripped so the result can never be hidden or escape
/// the uploads directory.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = unsafe_chars().replace_all(base.trim(), "_");
    cleaned.trim_start_matches('.').to_string()
}

/// Build a stored name: `sound_{YYYYmmdd_HHMMSS}_{hash8}.{ext}`.
///
/// The hash covers the client's file name, the full-precision timestamp and
/// `nonce`, never the content, so two uploads of the same bytes get distinct
/// names.
#[must_use]
pub fn unique_filename(
    format: AudioFormat,
    original_name: &str,
    now: DateTime<Utc>,
    nonce: u64,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(original_name.as_bytes());
    hasher.update(&now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(&nonce.to_le_bytes());
    let hash = hasher.finalize().to_hex();
    format!(
        "sound_{}_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        &hash.as_str()[..8],
        format.extension()
    )
}

/// An audio file written to the uploads directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAudio {
    /// File name inside the uploads directory.
    pub file_name: String,
    /// Public URL (`/uploads/<file_name>`).
    pub url: String,
    /// Size in bytes.
    pub size: u64,
    /// Detected format.
    pub format: AudioFormat,
}

/// On-disk store for uploaded audio.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    policy: UploadPolicy,
}

impl UploadStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, policy: UploadPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    /// Directory holding the stored files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The policy uploads are checked against.
    #[must_use]
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validate and write an upload, returning where it was stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadRejected`] if validation fails, or an I/O error
    /// if the file cannot be written.
    pub fn save(
        &self,
        original_name: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<StoredAudio> {
        let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
        let format = self
            .policy
            .validate(&sanitize_filename(original_name), size, content_type)?;

        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|source| Error::DirectoryCreate {
                path: self.dir.clone(),
                source,
            })?;
        }

        let file_name = self.write_new(original_name, format, content)?;
        info!(file = %file_name, size, "Stored uploaded audio");

        Ok(StoredAudio {
            url: format!("{UPLOADS_URL_PREFIX}{file_name}"),
            file_name,
            size,
            format,
        })
    }

    /// Write `content` under a name no other file in the store holds.
    ///
    /// Files are opened with `create_new`, so an existing upload is never
    /// overwritten even when two writers race for the same name.
    fn write_new(
        &self,
        original_name: &str,
        format: AudioFormat,
        content: &[u8],
    ) -> Result<String> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let nonce = NAME_SEQUENCE.fetch_add(1, Ordering::Relaxed);
            let file_name = unique_filename(format, original_name, Utc::now(), nonce);
            let path = self.dir.join(&file_name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(content) {
                        drop(file);
                        let _ = std::fs::remove_file(&path);
                        return Err(e.into());
                    }
                    return Ok(file_name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(file = %file_name, "Stored name taken, trying another");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not find a free name in the uploads directory",
        )
        .into())
    }

    /// Resolve a public audio URL (or bare file name) to a path in the store.
    ///
    /// Returns `None` for anything that is not a plain file name.
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(UPLOADS_URL_PREFIX).unwrap_or(url);
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.dir.join(file)),
            _ => None,
        }
    }

    /// Delete the file behind an audio URL.
    ///
    /// Returns `true` if a file was removed. Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing file cannot be removed.
    pub fn remove(&self, url: &str) -> Result<bool> {
        let Some(path) = self.resolve(url) else {
            warn!(url, "Refusing to remove audio outside the uploads directory");
            return Ok(false);
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed audio file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

//! Storage layer for soundscape.
//!
//! This module provides `SQLite`-based persistent storage for sound records,
//! including label filtering, text search, radius queries and statistics.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::format::normalize_search_text;
use crate::geo::haversine_km;
use crate::sound::{Coordinates, NewSound, SoundRecord, SoundUpdate, MAX_TAGS};

use schema::LabelTable;

/// Default number of sounds returned by [`Storage::list_recent`].
pub const DEFAULT_LIST_LIMIT: usize = 100;
/// Default number of sounds returned by [`Storage::by_emotion`].
pub const DEFAULT_EMOTION_LIMIT: usize = 20;
/// Default number of sounds returned by [`Storage::nearby`].
pub const DEFAULT_NEARBY_LIMIT: usize = 50;
/// Default radius in kilometres for [`Storage::nearby`].
pub const DEFAULT_RADIUS_KM: f64 = 10.0;
/// Default number of sounds returned by [`Storage::search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Kilometres per degree of latitude, rounded down so the prefilter box is
/// never smaller than the search circle.
const KM_PER_DEGREE_LAT: f64 = 111.0;

const SOUND_COLUMNS: &str = "id, name, author, description, latitude, longitude, \
                             audio_url, duration_secs, quality, recorded_at";

/// Storage engine for sound records.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Record insertion, update and deletion
/// - Filtering by emotion, tag and author
/// - Case-insensitive text search
/// - Radius queries around a point
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

/// A sound returned from a radius query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbySound {
    /// The matching record.
    #[serde(flatten)]
    pub sound: SoundRecord,
    /// Great-circle distance from the query point.
    pub distance_km: f64,
}

/// Criteria for [`Storage::search`]. Present criteria are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Substring matched against name, description and tags.
    #[serde(rename = "q")]
    pub text: Option<String>,
    /// Exact emotion label.
    pub emotion: Option<String>,
    /// Exact tag label.
    pub tag: Option<String>,
    /// Substring matched against the author.
    pub author: Option<String>,
}

impl SearchFilter {
    /// Drop blank criteria and trim the rest.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            text: clean(self.text),
            emotion: clean(self.emotion),
            tag: clean(self.tag),
            author: clean(self.author),
        }
    }
}

/// Outcome of [`Storage::add_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    /// The tag was attached.
    Added,
    /// The sound already had the tag.
    AlreadyPresent,
    /// No sound with that id exists.
    NotFound,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and insert a new sound, returning its id.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the sound is invalid, or an error if the
    /// database operation fails.
    pub fn insert(&self, sound: &NewSound) -> Result<i64> {
        let mut sound = sound.clone();
        sound.validate()?;
        let recorded_at = sound.recorded_at.unwrap_or_else(Utc::now);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            INSERT INTO sounds (name, author, description, latitude, longitude,
                                audio_url, duration_secs, quality, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                sound.name,
                sound.author,
                sound.description,
                sound.location.lat,
                sound.location.lng,
                sound.audio_url,
                sound.duration_secs,
                sound.quality.to_string(),
                encode_time(recorded_at),
            ],
        )?;
        let id = tx.last_insert_rowid();

        write_labels(&tx, LabelTable::Emotions, id, &sound.emotions)?;
        write_labels(&tx, LabelTable::Tags, id, &sound.tags)?;
        write_labels(&tx, LabelTable::SoundTypes, id, &sound.sound_types)?;
        tx.commit()?;

        debug!("Inserted sound with id {}", id);
        Ok(id)
    }

    /// Get a sound by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<SoundRecord>> {
        let sql = format!("SELECT {SOUND_COLUMNS} FROM sounds WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, [id], Self::row_to_sound)
            .optional()?;

        match record {
            Some(mut record) => {
                self.attach_labels(&mut record)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Get the most recent sounds, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<SoundRecord>> {
        let sql = format!(
            "SELECT {SOUND_COLUMNS} FROM sounds ORDER BY recorded_at DESC, id DESC LIMIT ?1"
        );
        self.query_sounds(&sql, [to_sql_limit(limit)])
    }

    /// Get every stored sound, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all(&self) -> Result<Vec<SoundRecord>> {
        let sql = format!("SELECT {SOUND_COLUMNS} FROM sounds ORDER BY recorded_at DESC, id DESC");
        self.query_sounds(&sql, [])
    }

    /// Get sounds carrying an emotion tag, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_emotion(&self, emotion: &str, limit: usize) -> Result<Vec<SoundRecord>> {
        let sql = format!(
            r"
            SELECT {SOUND_COLUMNS} FROM sounds
            WHERE id IN (SELECT sound_id FROM sound_emotions WHERE label = ?1)
            ORDER BY recorded_at DESC, id DESC LIMIT ?2
            "
        );
        self.query_sounds(&sql, params![emotion.trim(), to_sql_limit(limit)])
    }

    /// Get sounds within `radius_km` of `center`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid center or negative radius,
    /// or an error if the database operation fails.
    pub fn nearby(
        &self,
        center: Coordinates,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<NearbySound>> {
        let center = center.validated()?;
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(Error::invalid_field(
                "radius",
                format!("{radius_km} is not a non-negative distance"),
            ));
        }

        // Latitude band prefilter; longitude is left to the exact distance check
        let band = radius_km / KM_PER_DEGREE_LAT;
        let sql = format!(
            "SELECT {SOUND_COLUMNS} FROM sounds WHERE latitude BETWEEN ?1 AND ?2"
        );
        let candidates = self.query_sounds(&sql, params![center.lat - band, center.lat + band])?;

        let mut hits: Vec<NearbySound> = candidates
            .into_iter()
            .map(|sound| NearbySound {
                distance_km: haversine_km(center, sound.location),
                sound,
            })
            .filter(|n| n.distance_km <= radius_km)
            .collect();
        hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        hits.truncate(limit);

        debug!(
            "Found {} sounds within {} km of {}, {}",
            hits.len(),
            radius_km,
            center.lat,
            center.lng
        );
        Ok(hits)
    }

    /// Search sounds by text, labels and author, newest first.
    ///
    /// An empty filter matches every sound.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search(&self, filter: &SearchFilter, limit: usize) -> Result<Vec<SoundRecord>> {
        let filter = filter.clone().normalized();
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(emotion) = &filter.emotion {
            conditions.push("id IN (SELECT sound_id FROM sound_emotions WHERE label = ?)");
            values.push(emotion.clone());
        }
        if let Some(tag) = &filter.tag {
            conditions.push("id IN (SELECT sound_id FROM sound_tags WHERE label = ?)");
            values.push(tag.clone());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        // Text and author are matched in Rust so non-ASCII case folds; limit applies afterwards
        let filtered_in_rust = filter.text.is_some() || filter.author.is_some();
        let limit_clause = if filtered_in_rust {
            String::new()
        } else {
            format!("LIMIT {}", to_sql_limit(limit))
        };
        let sql = format!(
            "SELECT {SOUND_COLUMNS} FROM sounds {where_clause} \
             ORDER BY recorded_at DESC, id DESC {limit_clause}"
        );

        let mut records = self.query_sounds(&sql, params_from_iter(values.iter()))?;
        if let Some(text) = &filter.text {
            let matcher = TextMatcher::new(text);
            records.retain(|r| matcher.matches(r));
        }
        if let Some(author) = &filter.author {
            let needle = author.to_lowercase();
            records.retain(|r| {
                r.author
                    .as_deref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
            });
        }
        if filtered_in_rust {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Apply a partial update to a sound.
    ///
    /// Returns `false` if no sound with that id exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the update is empty or invalid, or an
    /// error if the database operation fails.
    pub fn update(&self, id: i64, update: &SoundUpdate) -> Result<bool> {
        let mut update = update.clone();
        update.validate()?;

        let Some(mut record) = self.get(id)? else {
            return Ok(false);
        };
        update.apply_to(&mut record);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            UPDATE sounds SET name = ?2, author = ?3, description = ?4, latitude = ?5,
                              longitude = ?6, duration_secs = ?7, quality = ?8
            WHERE id = ?1
            ",
            params![
                id,
                record.name,
                record.author,
                record.description,
                record.location.lat,
                record.location.lng,
                record.duration_secs,
                record.quality.to_string(),
            ],
        )?;
        if update.emotions.is_some() {
            replace_labels(&tx, LabelTable::Emotions, id, &record.emotions)?;
        }
        if update.tags.is_some() {
            replace_labels(&tx, LabelTable::Tags, id, &record.tags)?;
        }
        if update.sound_types.is_some() {
            replace_labels(&tx, LabelTable::SoundTypes, id, &record.sound_types)?;
        }
        tx.commit()?;

        debug!("Updated sound {}", id);
        Ok(true)
    }

    /// Attach a tag to a sound (set semantics).
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank tag or when the sound already
    /// holds the maximum number of tags, or an error if the database
    /// operation fails.
    pub fn add_tag(&self, id: i64, tag: &str) -> Result<TagOutcome> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::invalid_field("tag", "a tag must be provided"));
        }

        let Some(record) = self.get(id)? else {
            return Ok(TagOutcome::NotFound);
        };
        if record.has_tag(tag) {
            return Ok(TagOutcome::AlreadyPresent);
        }
        if record.tags.len() >= MAX_TAGS {
            return Err(Error::invalid_field(
                "tags",
                format!("at most {MAX_TAGS} allowed"),
            ));
        }

        let position = i64::try_from(record.tags.len()).unwrap_or(i64::MAX);
        self.conn.execute(
            "INSERT OR IGNORE INTO sound_tags (sound_id, position, label) VALUES (?1, ?2, ?3)",
            params![id, position, tag],
        )?;
        debug!("Added tag '{}' to sound {}", tag, id);
        Ok(TagOutcome::Added)
    }

    /// Delete a sound, returning the removed record.
    ///
    /// The caller is responsible for removing the audio file it referenced.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: i64) -> Result<Option<SoundRecord>> {
        let Some(record) = self.get(id)? else {
            return Ok(None);
        };

        let tx = self.conn.unchecked_transaction()?;
        for table in LabelTable::ALL {
            tx.execute(
                &format!("DELETE FROM {} WHERE sound_id = ?1", table.table()),
                [id],
            )?;
        }
        tx.execute("DELETE FROM sounds WHERE id = ?1", [id])?;
        tx.commit()?;

        info!("Deleted sound {} ('{}')", id, record.name);
        Ok(Some(record))
    }

    /// Count total sounds in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sounds", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Remove every sound. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for table in LabelTable::ALL {
            tx.execute(&format!("DELETE FROM {}", table.table()), [])?;
        }
        let affected = tx.execute("DELETE FROM sounds", [])?;
        tx.commit()?;

        if affected > 0 {
            info!("Cleared {} sounds", affected);
        }
        Ok(affected)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_sounds = self.count()?;

        let unique_authors: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT author) FROM sounds WHERE author IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(recorded_at), MAX(recorded_at) FROM sounds",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_sounds,
            unique_authors,
            oldest_sound: oldest.as_deref().and_then(decode_time),
            newest_sound: newest.as_deref().and_then(decode_time),
            db_size_bytes,
        })
    }

    /// Run a sound query and fill in the label lists of every row.
    fn query_sounds<P: Params>(&self, sql: &str, params: P) -> Result<Vec<SoundRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut records = stmt
            .query_map(params, Self::row_to_sound)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for record in &mut records {
            self.attach_labels(record)?;
        }
        Ok(records)
    }

    fn attach_labels(&self, record: &mut SoundRecord) -> Result<()> {
        record.emotions = self.load_labels(LabelTable::Emotions, record.id)?;
        record.tags = self.load_labels(LabelTable::Tags, record.id)?;
        record.sound_types = self.load_labels(LabelTable::SoundTypes, record.id)?;
        Ok(())
    }

    fn load_labels(&self, table: LabelTable, id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT label FROM {} WHERE sound_id = ?1 ORDER BY position",
            table.table()
        ))?;
        let labels = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(labels)
    }

    /// Convert a database row to a `SoundRecord` with empty label lists.
    fn row_to_sound(row: &rusqlite::Row) -> rusqlite::Result<SoundRecord> {
        let id: i64 = row.get(0)?;
        let quality_str: String = row.get(8)?;
        let recorded_at_str: String = row.get(9)?;
        let duration: i64 = row.get(7)?;

        let quality = quality_str.parse().unwrap_or_else(|_| {
            warn!(
                "Unknown audio quality: {}, defaulting to medium",
                quality_str
            );
            crate::sound::AudioQuality::Medium
        });

        let recorded_at = decode_time(&recorded_at_str).unwrap_or_else(|| {
            warn!("Unparseable timestamp on sound {}: {}", id, recorded_at_str);
            DateTime::<Utc>::default()
        });

        Ok(SoundRecord {
            id,
            name: row.get(1)?,
            author: row.get(2)?,
            description: row.get(3)?,
            location: Coordinates::new(row.get(4)?, row.get(5)?),
            audio_url: row.get(6)?,
            duration_secs: u32::try_from(duration).unwrap_or(0),
            quality,
            recorded_at,
            emotions: Vec::new(),
            tags: Vec::new(),
            sound_types: Vec::new(),
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of sounds stored.
    pub total_sounds: i64,
    /// Number of distinct named authors.
    pub unique_authors: i64,
    /// Creation time of the oldest sound.
    pub oldest_sound: Option<DateTime<Utc>>,
    /// Creation time of the newest sound.
    pub newest_sound: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

fn write_labels(conn: &Connection, table: LabelTable, id: i64, labels: &[String]) -> Result<()> {
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT OR IGNORE INTO {} (sound_id, position, label) VALUES (?1, ?2, ?3)",
        table.table()
    ))?;
    for (position, label) in labels.iter().enumerate() {
        stmt.execute(params![id, i64::try_from(position).unwrap_or(i64::MAX), label])?;
    }
    Ok(())
}

fn replace_labels(conn: &Connection, table: LabelTable, id: i64, labels: &[String]) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {} WHERE sound_id = ?1", table.table()),
        [id],
    )?;
    write_labels(conn, table, id, labels)
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Case and accent insensitive substring match over name, description and tags.
struct TextMatcher {
    needle: String,
    folded: bool,
}

impl TextMatcher {
    fn new(text: &str) -> Self {
        let needle = normalize_search_text(text);
        if needle.is_empty() {
            // Query was only punctuation; match it literally
            Self {
                needle: text.to_lowercase(),
                folded: false,
            }
        } else {
            Self {
                needle,
                folded: true,
            }
        }
    }

    fn contains(&self, haystack: &str) -> bool {
        if self.folded {
            normalize_search_text(haystack).contains(&self.needle)
        } else {
            haystack.to_lowercase().contains(&self.needle)
        }
    }

    fn matches(&self, record: &SoundRecord) -> bool {
        self.contains(&record.name)
            || self.contains(&record.description)
            || record.tags.iter().any(|t| self.contains(t))
    }
}

fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

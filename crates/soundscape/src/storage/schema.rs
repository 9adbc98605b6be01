//! `SQLite` schema definitions for soundscape.
//!
//! Label lists (emotions, tags, sound types) live in child tables so they can
//! be filtered with plain SQL; `position` preserves the order the uploader
//! gave them in.

/// SQL statement to create the sounds table.
pub const CREATE_SOUNDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sounds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    author TEXT,
    description TEXT NOT NULL DEFAULT '',
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    audio_url TEXT,
    duration_secs INTEGER NOT NULL DEFAULT 0,
    quality TEXT NOT NULL,
    recorded_at TEXT NOT NULL
)
";

/// SQL statement to create the emotion label table.
pub const CREATE_EMOTIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sound_emotions (
    sound_id INTEGER NOT NULL REFERENCES sounds(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    label TEXT NOT NULL,
    UNIQUE (sound_id, label)
)
";

/// SQL statement to create the tag label table.
pub const CREATE_TAGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sound_tags (
    sound_id INTEGER NOT NULL REFERENCES sounds(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    label TEXT NOT NULL,
    UNIQUE (sound_id, label)
)
";

/// SQL statement to create the sound type label table.
pub const CREATE_TYPES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sound_types (
    sound_id INTEGER NOT NULL REFERENCES sounds(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    label TEXT NOT NULL,
    UNIQUE (sound_id, label)
)
";

/// Index on `recorded_at` for newest-first listings.
pub const CREATE_RECORDED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sounds_recorded_at ON sounds(recorded_at DESC)
";

/// Index on `author` for author filtering.
pub const CREATE_AUTHOR_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sounds_author ON sounds(author)
";

/// Index on emotion labels.
pub const CREATE_EMOTION_LABEL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sound_emotions_label ON sound_emotions(label)
";

/// Index on tag labels.
pub const CREATE_TAG_LABEL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sound_tags_label ON sound_tags(label)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_SOUNDS_TABLE,
    CREATE_EMOTIONS_TABLE,
    CREATE_TAGS_TABLE,
    CREATE_TYPES_TABLE,
    CREATE_RECORDED_AT_INDEX,
    CREATE_AUTHOR_INDEX,
    CREATE_EMOTION_LABEL_INDEX,
    CREATE_TAG_LABEL_INDEX,
    CREATE_METADATA_TABLE,
];

/// Which label table a list is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTable {
    /// `sound_emotions`
    Emotions,
    /// `sound_tags`
    Tags,
    /// `sound_types`
    SoundTypes,
}

impl LabelTable {
    /// Every label table.
    pub const ALL: [Self; 3] = [Self::Emotions, Self::Tags, Self::SoundTypes];

    /// Table name in the schema.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::Emotions => "sound_emotions",
            Self::Tags => "sound_tags",
            Self::SoundTypes => "sound_types",
        }
    }
}

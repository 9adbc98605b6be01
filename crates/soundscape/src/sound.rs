//! Core sound record types for soundscape.
//!
//! A sound record describes one uploaded environmental recording: where it was
//! captured, who captured it, how it feels, and where its audio lives.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shortest accepted sound name.
pub const NAME_MIN_LEN: usize = 3;
/// Longest accepted sound name.
pub const NAME_MAX_LEN: usize = 100;
/// Longest accepted description.
pub const DESCRIPTION_MAX_LEN: usize = 500;
/// Shortest accepted author name.
pub const AUTHOR_MIN_LEN: usize = 2;
/// Longest accepted author name.
pub const AUTHOR_MAX_LEN: usize = 50;
/// Most emotion tags a sound may carry.
pub const MAX_EMOTIONS: usize = 5;
/// Most free-form tags a sound may carry.
pub const MAX_TAGS: usize = 10;
/// Most sound types a sound may carry.
pub const MAX_SOUND_TYPES: usize = 8;

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, `-90..=90`.
    pub lat: f64,
    /// Longitude, `-180..=180`.
    pub lng: f64,
}

impl Coordinates {
    /// Create a coordinate pair without validating it.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Return `self` if valid, otherwise a validation error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidField`] when either component is out of range.
    pub fn validated(self) -> Result<Self> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(Error::invalid_field(
                "latitude",
                format!("{} is outside -90..=90", self.lat),
            ));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(Error::invalid_field(
                "longitude",
                format!("{} is outside -180..=180", self.lng),
            ));
        }
        Ok(self)
    }
}

/// Recording quality reported by the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    /// AM radio grade.
    Low,
    /// Compressed, around 128 kbps.
    #[default]
    Medium,
    /// Compressed, around 320 kbps.
    High,
    /// Lossless studio capture.
    Professional,
}

impl AudioQuality {
    /// Every quality level, lowest first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Professional];

    /// Human readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low (AM radio)",
            Self::Medium => "Medium (MP3 128kbps)",
            Self::High => "High (MP3 320kbps)",
            Self::Professional => "Professional (WAV/FLAC)",
        }
    }
}

impl std::fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Professional => write!(f, "professional"),
        }
    }
}

impl FromStr for AudioQuality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Legacy Spanish labels are still accepted from older clients
        match s.trim().to_lowercase().as_str() {
            "low" | "baja" => Ok(Self::Low),
            "medium" | "media" => Ok(Self::Medium),
            "high" | "alta" => Ok(Self::High),
            "professional" | "profesional" => Ok(Self::Professional),
            other => Err(Error::invalid_field(
                "quality",
                format!("unknown audio quality '{other}'"),
            )),
        }
    }
}

/// A stored sound record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundRecord {
    /// Identifier assigned by storage.
    pub id: i64,
    /// Short title.
    pub name: String,
    /// Who recorded it, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Free text description.
    pub description: String,
    /// Where it was recorded.
    pub location: Coordinates,
    /// Kinds of sound present (rain, traffic, birds...).
    pub sound_types: Vec<String>,
    /// Emotion tags.
    pub emotions: Vec<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Public URL of the audio file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Length of the recording in seconds.
    pub duration_secs: u32,
    /// Reported quality.
    pub quality: AudioQuality,
    /// When the record was created.
    pub recorded_at: DateTime<Utc>,
}

impl SoundRecord {
    /// Whether this record carries the given emotion tag.
    #[must_use]
    pub fn has_emotion(&self, emotion: &str) -> bool {
        self.emotions.iter().any(|e| e == emotion)
    }

    /// Whether this record carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A sound about to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSound {
    /// Short title.
    pub name: String,
    /// Who recorded it, if known.
    #[serde(default)]
    pub author: Option<String>,
    /// Free text description.
    #[serde(default)]
    pub description: String,
    /// Where it was recorded.
    pub location: Coordinates,
    /// Kinds of sound present.
    #[serde(default)]
    pub sound_types: Vec<String>,
    /// Emotion tags.
    #[serde(default)]
    pub emotions: Vec<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Public URL of the audio file.
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Length of the recording in seconds.
    #[serde(default)]
    pub duration_secs: u32,
    /// Reported quality.
    #[serde(default)]
    pub quality: AudioQuality,
    /// Creation time; storage uses the current time when absent.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl NewSound {
    /// Create a sound with only the required fields set.
    #[must_use]
    pub fn new(name: impl Into<String>, location: Coordinates) -> Self {
        Self {
            name: name.into(),
            author: None,
            description: String::new(),
            location,
            sound_types: Vec::new(),
            emotions: Vec::new(),
            tags: Vec::new(),
            audio_url: None,
            duration_secs: 0,
            quality: AudioQuality::default(),
            recorded_at: None,
        }
    }

    /// Check field limits and normalize text and label lists in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidField`] for the first field that violates a limit.
    pub fn validate(&mut self) -> Result<()> {
        self.name = validate_name(&self.name)?;
        self.description = validate_description(&self.description)?;
        self.author = match self.author.take() {
            Some(author) if !author.trim().is_empty() => Some(validate_author(&author)?),
            _ => None,
        };
        self.location = self.location.validated()?;
        self.sound_types = validate_labels("sound_types", &self.sound_types, MAX_SOUND_TYPES)?;
        self.emotions = validate_labels("emotions", &self.emotions, MAX_EMOTIONS)?;
        self.tags = validate_labels("tags", &self.tags, MAX_TAGS)?;
        Ok(())
    }
}

/// A partial update to a stored sound.
///
/// `id` and `recorded_at` are deliberately absent: they never change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoundUpdate {
    /// New title.
    pub name: Option<String>,
    /// New author.
    pub author: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New location.
    pub location: Option<Coordinates>,
    /// Replacement sound types.
    pub sound_types: Option<Vec<String>>,
    /// Replacement emotion tags.
    pub emotions: Option<Vec<String>>,
    /// Replacement tags.
    pub tags: Option<Vec<String>>,
    /// New duration.
    pub duration_secs: Option<u32>,
    /// New quality.
    pub quality: Option<AudioQuality>,
}

impl SoundUpdate {
    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Check field limits and normalize present fields in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyUpdate`] when nothing is set, or
    /// [`Error::InvalidField`] for the first invalid field.
    pub fn validate(&mut self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyUpdate);
        }
        if let Some(name) = &self.name {
            self.name = Some(validate_name(name)?);
        }
        if let Some(author) = &self.author {
            self.author = Some(validate_author(author)?);
        }
        if let Some(description) = &self.description {
            self.description = Some(validate_description(description)?);
        }
        if let Some(location) = self.location {
            self.location = Some(location.validated()?);
        }
        if let Some(types) = &self.sound_types {
            self.sound_types = Some(validate_labels("sound_types", types, MAX_SOUND_TYPES)?);
        }
        if let Some(emotions) = &self.emotions {
            self.emotions = Some(validate_labels("emotions", emotions, MAX_EMOTIONS)?);
        }
        if let Some(tags) = &self.tags {
            self.tags = Some(validate_labels("tags", tags, MAX_TAGS)?);
        }
        Ok(())
    }

    /// Copy every present field onto `record`.
    pub fn apply_to(&self, record: &mut SoundRecord) {
        if let Some(name) = &self.name {
            record.name.clone_from(name);
        }
        if let Some(author) = &self.author {
            record.author = Some(author.clone());
        }
        if let Some(description) = &self.description {
            record.description.clone_from(description);
        }
        if let Some(location) = self.location {
            record.location = location;
        }
        if let Some(types) = &self.sound_types {
            record.sound_types.clone_from(types);
        }
        if let Some(emotions) = &self.emotions {
            record.emotions.clone_from(emotions);
        }
        if let Some(tags) = &self.tags {
            record.tags.clone_from(tags);
        }
        if let Some(duration) = self.duration_secs {
            record.duration_secs = duration;
        }
        if let Some(quality) = self.quality {
            record.quality = quality;
        }
    }
}

/// Trim labels, drop empty ones and remove duplicates keeping first occurrence.
#[must_use]
pub fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.to_string()))
        .map(str::to_string)
        .collect()
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(Error::invalid_field(
            "name",
            format!("must be {NAME_MIN_LEN}-{NAME_MAX_LEN} characters, got {len}"),
        ));
    }
    Ok(name.to_string())
}

fn validate_author(author: &str) -> Result<String> {
    let author = author.trim();
    let len = author.chars().count();
    if !(AUTHOR_MIN_LEN..=AUTHOR_MAX_LEN).contains(&len) {
        return Err(Error::invalid_field(
            "author",
            format!("must be {AUTHOR_MIN_LEN}-{AUTHOR_MAX_LEN} characters, got {len}"),
        ));
    }
    Ok(author.to_string())
}

fn validate_description(description: &str) -> Result<String> {
    let description = description.trim();
    let len = description.chars().count();
    if len > DESCRIPTION_MAX_LEN {
        return Err(Error::invalid_field(
            "description",
            format!("must be at most {DESCRIPTION_MAX_LEN} characters, got {len}"),
        ));
    }
    Ok(description.to_string())
}

fn validate_labels(field: &'static str, labels: &[String], max: usize) -> Result<Vec<String>> {
    let labels = normalize_labels(labels);
    if labels.len() > max {
        return Err(Error::invalid_field(
            field,
            format!("at most {max} allowed, got {}", labels.len()),
        ));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bogota() -> Coordinates {
        Coordinates::new(4.711, -74.0721)
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(bogota().is_valid());
        assert!(Coordinates::new(90.0, 180.0).is_valid());
        assert!(!Coordinates::new(90.1, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_coordinates_validated_names_field() {
        let err = Coordinates::new(0.0, 200.0).validated().unwrap_err();
        assert!(err.to_string().contains("longitude"));

        let err = Coordinates::new(-91.0, 0.0).validated().unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn test_audio_quality_parse() {
        assert_eq!("high".parse::<AudioQuality>().unwrap(), AudioQuality::High);
        assert_eq!("Media".parse::<AudioQuality>().unwrap(), AudioQuality::Medium);
        assert_eq!(
            "profesional".parse::<AudioQuality>().unwrap(),
            AudioQuality::Professional
        );
        assert!("excellent".parse::<AudioQuality>().is_err());
    }

    #[test]
    fn test_audio_quality_display_roundtrips_through_parse() {
        for quality in AudioQuality::ALL {
            assert_eq!(quality.to_string().parse::<AudioQuality>().unwrap(), quality);
        }
    }

    #[test]
    fn test_normalize_labels() {
        let result = normalize_labels(&labels(&[" calm ", "", "calm", "rain", "  "]));
        assert_eq!(result, labels(&["calm", "rain"]));
    }

    #[test]
    fn test_new_sound_validate_trims_and_dedups() {
        let mut sound = NewSound::new("  Rain in Bogota ", bogota());
        sound.author = Some("  Maria ".to_string());
        sound.emotions = labels(&["relaxing", "relaxing", "nostalgic"]);

        sound.validate().unwrap();
        assert_eq!(sound.name, "Rain in Bogota");
        assert_eq!(sound.author.as_deref(), Some("Maria"));
        assert_eq!(sound.emotions, labels(&["relaxing", "nostalgic"]));
    }

    #[test]
    fn test_new_sound_blank_author_becomes_none() {
        let mut sound = NewSound::new("Waves", bogota());
        sound.author = Some("   ".to_string());
        sound.validate().unwrap();
        assert!(sound.author.is_none());
    }

    #[test]
    fn test_new_sound_rejects_short_name() {
        let mut sound = NewSound::new("ab", bogota());
        let err = sound.validate().unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_new_sound_rejects_long_description() {
        let mut sound = NewSound::new("Forest", bogota());
        sound.description = "x".repeat(DESCRIPTION_MAX_LEN + 1);
        let err = sound.validate().unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_new_sound_rejects_too_many_emotions() {
        let mut sound = NewSound::new("Forest", bogota());
        sound.emotions = labels(&["a", "b", "c", "d", "e", "f"]);
        let err = sound.validate().unwrap_err();
        assert!(err.to_string().contains("emotions"));
    }

    #[test]
    fn test_new_sound_rejects_bad_location() {
        let mut sound = NewSound::new("Forest", Coordinates::new(100.0, 0.0));
        assert!(sound.validate().is_err());
    }

    #[test]
    fn test_update_empty_rejected() {
        let mut update = SoundUpdate::default();
        assert!(matches!(update.validate(), Err(Error::EmptyUpdate)));
    }

    #[test]
    fn test_update_validates_present_fields() {
        let mut update = SoundUpdate {
            name: Some(" New name ".to_string()),
            tags: Some(labels(&["x", "x", "y"])),
            ..SoundUpdate::default()
        };
        update.validate().unwrap();
        assert_eq!(update.name.as_deref(), Some("New name"));
        assert_eq!(update.tags, Some(labels(&["x", "y"])));

        let mut bad = SoundUpdate {
            author: Some("x".to_string()),
            ..SoundUpdate::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_update_apply_to_only_touches_present_fields() {
        let mut record = SoundRecord {
            id: 3,
            name: "Old".to_string(),
            author: Some("Ana".to_string()),
            description: "before".to_string(),
            location: bogota(),
            sound_types: Vec::new(),
            emotions: labels(&["calm"]),
            tags: Vec::new(),
            audio_url: None,
            duration_secs: 10,
            quality: AudioQuality::Low,
            recorded_at: Utc::now(),
        };
        let recorded_at = record.recorded_at;

        let update = SoundUpdate {
            description: Some("after".to_string()),
            quality: Some(AudioQuality::High),
            ..SoundUpdate::default()
        };
        update.apply_to(&mut record);

        assert_eq!(record.description, "after");
        assert_eq!(record.quality, AudioQuality::High);
        assert_eq!(record.name, "Old");
        assert_eq!(record.emotions, labels(&["calm"]));
        assert_eq!(record.recorded_at, recorded_at);
        assert_eq!(record.id, 3);
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        let result: std::result::Result<SoundUpdate, _> =
            serde_json::from_str(r#"{"id": 4, "name": "Renamed"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_label_lookup() {
        let record = SoundRecord {
            id: 1,
            name: "Market".to_string(),
            author: None,
            description: String::new(),
            location: bogota(),
            sound_types: Vec::new(),
            emotions: labels(&["energetic"]),
            tags: labels(&["culture"]),
            audio_url: None,
            duration_secs: 0,
            quality: AudioQuality::Medium,
            recorded_at: Utc::now(),
        };
        assert!(record.has_emotion("energetic"));
        assert!(!record.has_emotion("calm"));
        assert!(record.has_tag("culture"));
    }

    #[test]
    fn test_quality_serializes_snake_case() {
        let json = serde_json::to_string(&AudioQuality::Professional).unwrap();
        assert_eq!(json, "\"professional\"");
    }
}

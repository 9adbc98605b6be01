//! Built-in sample dataset for populating a fresh archive.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::Result;
use crate::sound::{AudioQuality, Coordinates, NewSound};
use crate::storage::Storage;

struct SampleSound {
    name: &'static str,
    description: &'static str,
    author: &'static str,
    lat: f64,
    lng: f64,
    sound_types: &'static [&'static str],
    emotions: &'static [&'static str],
    tags: &'static [&'static str],
    duration_secs: u32,
    quality: AudioQuality,
    days_ago: i64,
}

const SAMPLES: &[SampleSound] = &[
    SampleSound {
        name: "Dawn in the Amazon rainforest",
        description: "Morning rainforest chorus with birdsong and the river in the background",
        author: "Carlos Natura",
        lat: -4.2158,
        lng: -69.2167,
        sound_types: &["nature", "birds", "water", "forest"],
        emotions: &["relaxing", "peaceful", "inspiring"],
        tags: &["biodiversity", "nature", "meditation"],
        duration_secs: 180,
        quality: AudioQuality::High,
        days_ago: 2,
    },
    SampleSound {
        name: "Rain in Bogota",
        description: "Soft afternoon rain falling over downtown Bogota",
        author: "Maria Rodriguez",
        lat: 4.7110,
        lng: -74.0721,
        sound_types: &["rain", "city"],
        emotions: &["melancholic", "nostalgic", "relaxing"],
        tags: &["weather", "city", "relaxation"],
        duration_secs: 240,
        quality: AudioQuality::Medium,
        days_ago: 5,
    },
    SampleSound {
        name: "Caribbean waves in Cartagena",
        description: "Waves breaking on the beaches of Cartagena",
        author: "Jose Marinero",
        lat: 10.3997,
        lng: -75.5518,
        sound_types: &["ocean", "water", "nature"],
        emotions: &["relaxing", "peaceful", "romantic"],
        tags: &["beach", "tourism", "relaxation", "wellbeing"],
        duration_secs: 300,
        quality: AudioQuality::High,
        days_ago: 9,
    },
    SampleSound {
        name: "Morning coffee in Zona Rosa",
        description: "A busy cafe in Bogota's Zona Rosa during the morning rush",
        author: "Ana Cafetera",
        lat: 4.6694,
        lng: -74.0525,
        sound_types: &["city", "crowd", "music"],
        emotions: &["energetic", "inspiring", "joyful"],
        tags: &["work", "coffee", "social", "productivity"],
        duration_secs: 420,
        quality: AudioQuality::Medium,
        days_ago: 0,
    },
    SampleSound {
        name: "Wind over the Chingaza paramo",
        description: "Gentle wind moving through paramo vegetation in Chingaza park",
        author: "Miguel Montanero",
        lat: 4.5167,
        lng: -73.8000,
        sound_types: &["wind", "nature"],
        emotions: &["mysterious", "meditative", "peaceful"],
        tags: &["paramo", "nature", "meditation", "biodiversity"],
        duration_secs: 360,
        quality: AudioQuality::High,
        days_ago: 14,
    },
    SampleSound {
        name: "TransMilenio at rush hour",
        description: "The mass transit system during evening rush hour",
        author: "Roberto Urbano",
        lat: 4.6500,
        lng: -74.0500,
        sound_types: &["traffic", "city", "industrial"],
        emotions: &["chaotic", "energetic"],
        tags: &["transport", "city", "stress"],
        duration_secs: 180,
        quality: AudioQuality::Medium,
        days_ago: 5,
    },
    SampleSound {
        name: "La Chorrera waterfall",
        description: "The roar of the tallest waterfall in Colombia",
        author: "Diana Aventurera",
        lat: 4.5833,
        lng: -74.1167,
        sound_types: &["water", "nature"],
        emotions: &["inspiring", "energetic", "adventurous"],
        tags: &["waterfall", "tourism", "nature", "adventure"],
        duration_secs: 480,
        quality: AudioQuality::Professional,
        days_ago: 21,
    },
    SampleSound {
        name: "Vallenato in Valledupar",
        description: "Traditional vallenato music in a Valledupar home",
        author: "Rafael Juglares",
        lat: 10.4631,
        lng: -73.2481,
        sound_types: &["music"],
        emotions: &["joyful", "nostalgic", "romantic"],
        tags: &["music", "culture", "tradition"],
        duration_secs: 320,
        quality: AudioQuality::High,
        days_ago: 27,
    },
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// The sample sounds, spread over the 30 days before `now`.
#[must_use]
pub fn sample_sounds(now: DateTime<Utc>) -> Vec<NewSound> {
    SAMPLES
        .iter()
        .map(|s| NewSound {
            name: s.name.to_string(),
            author: Some(s.author.to_string()),
            description: s.description.to_string(),
            location: Coordinates::new(s.lat, s.lng),
            sound_types: owned(s.sound_types),
            emotions: owned(s.emotions),
            tags: owned(s.tags),
            audio_url: None,
            duration_secs: s.duration_secs,
            quality: s.quality,
            recorded_at: Some(now - Duration::days(s.days_ago)),
        })
        .collect()
}

/// Insert the sample sounds. Returns the new ids.
///
/// # Errors
///
/// Returns an error if any insert fails.
pub fn seed(storage: &Storage, now: DateTime<Utc>) -> Result<Vec<i64>> {
    let ids = sample_sounds(now)
        .iter()
        .map(|sound| storage.insert(sound))
        .collect::<Result<Vec<_>>>()?;
    info!("Seeded {} sample sounds", ids.len());
    Ok(ids)
}

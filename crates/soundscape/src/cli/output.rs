//! Text rendering for CLI output.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::OutputFormat;
use crate::analytics::{AnalyticsReport, Recommendation};
use crate::error::Result;
use crate::format::{
    format_coordinates, format_duration, format_file_size, format_relative, truncate_text,
};
use crate::sound::SoundRecord;
use crate::storage::{NearbySound, StorageStats};

const NAME_WIDTH: usize = 32;
const LABELS_WIDTH: usize = 28;

/// Left-aligned columns sized to their widest cell.
#[derive(Debug, Default)]
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = line(&self.header);
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("  "));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&line(row));
        }
        out
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn labels(items: &[String]) -> String {
    truncate_text(&items.join(", "), LABELS_WIDTH)
}

fn plain_line(sound: &SoundRecord, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "#{} {} ({})",
        sound.id,
        sound.name,
        format_coordinates(sound.location, 4)
    );
    if let Some(author) = &sound.author {
        let _ = write!(line, " by {author}");
    }
    if !sound.emotions.is_empty() {
        let _ = write!(line, " [{}]", sound.emotions.join(", "));
    }
    let _ = write!(line, " {}", format_relative(sound.recorded_at, now));
    line
}

fn table_row(sound: &SoundRecord, now: DateTime<Utc>) -> Vec<String> {
    vec![
        sound.id.to_string(),
        truncate_text(&sound.name, NAME_WIDTH),
        sound.author.clone().unwrap_or_else(|| "-".to_string()),
        labels(&sound.emotions),
        format_duration(sound.duration_secs),
        format_relative(sound.recorded_at, now),
    ]
}

const SOUND_HEADER: [&str; 6] = ["ID", "NAME", "AUTHOR", "EMOTIONS", "LENGTH", "RECORDED"];

/// Render a list of sounds.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_sounds(
    sounds: &[SoundRecord],
    format: OutputFormat,
    now: DateTime<Utc>,
) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(sounds);
    }
    if sounds.is_empty() {
        return Ok("No sounds found.".to_string());
    }
    Ok(match format {
        OutputFormat::Table => {
            let mut table = Table::new(&SOUND_HEADER);
            for sound in sounds {
                table.push(table_row(sound, now));
            }
            table.render()
        }
        _ => sounds
            .iter()
            .map(|s| plain_line(s, now))
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

/// Render sounds found by a radius query, nearest first.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_nearby(
    hits: &[NearbySound],
    format: OutputFormat,
    now: DateTime<Utc>,
) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(hits);
    }
    if hits.is_empty() {
        return Ok("No sounds in range.".to_string());
    }
    Ok(match format {
        OutputFormat::Table => {
            let mut header = SOUND_HEADER.to_vec();
            header.push("DISTANCE");
            let mut table = Table::new(&header);
            for hit in hits {
                let mut row = table_row(&hit.sound, now);
                row.push(format!("{:.2} km", hit.distance_km));
                table.push(row);
            }
            table.render()
        }
        _ => hits
            .iter()
            .map(|h| format!("{:>8.2} km  {}", h.distance_km, plain_line(&h.sound, now)))
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

/// Render recommendations, most similar first.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_recommendations(
    recommendations: &[Recommendation],
    format: OutputFormat,
    now: DateTime<Utc>,
) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(recommendations);
    }
    if recommendations.is_empty() {
        return Ok("No similar sounds found.".to_string());
    }
    Ok(match format {
        OutputFormat::Table => {
            let mut header = vec!["SCORE"];
            header.extend(SOUND_HEADER);
            let mut table = Table::new(&header);
            for rec in recommendations {
                let mut row = vec![rec.similarity_score.to_string()];
                row.extend(table_row(&rec.sound, now));
                table.push(row);
            }
            table.render()
        }
        _ => recommendations
            .iter()
            .map(|r| format!("{}  {}", r.similarity_score, plain_line(&r.sound, now)))
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

/// Render every field of one sound.
#[must_use]
pub fn render_sound(sound: &SoundRecord, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let none = "-".to_string();
    let _ = writeln!(out, "Sound #{}", sound.id);
    let _ = writeln!(out, "  Name:        {}", sound.name);
    let _ = writeln!(
        out,
        "  Author:      {}",
        sound.author.as_ref().unwrap_or(&none)
    );
    if !sound.description.is_empty() {
        let _ = writeln!(out, "  Description: {}", sound.description);
    }
    let _ = writeln!(
        out,
        "  Location:    {}",
        format_coordinates(sound.location, 4)
    );
    let _ = writeln!(out, "  Emotions:    {}", sound.emotions.join(", "));
    let _ = writeln!(out, "  Tags:        {}", sound.tags.join(", "));
    let _ = writeln!(out, "  Sound types: {}", sound.sound_types.join(", "));
    let _ = writeln!(out, "  Duration:    {}", format_duration(sound.duration_secs));
    let _ = writeln!(out, "  Quality:     {}", sound.quality.label());
    let _ = writeln!(
        out,
        "  Audio:       {}",
        sound.audio_url.as_ref().unwrap_or(&none)
    );
    let _ = write!(
        out,
        "  Recorded:    {} ({})",
        sound.recorded_at.format("%Y-%m-%d %H:%M UTC"),
        format_relative(sound.recorded_at, now)
    );
    out
}

/// Render the analytics report as text.
#[must_use]
pub fn render_report(report: &AnalyticsReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Collection Summary");
    let _ = writeln!(out, "==================");
    let _ = writeln!(out, "  Sounds:           {}", summary.total_sounds);
    let _ = writeln!(out, "  Contributors:     {}", summary.unique_authors);
    let _ = writeln!(out, "  Emotions:         {}", summary.unique_emotions);
    let _ = writeln!(
        out,
        "  Total duration:   {}",
        format_duration(u32::try_from(summary.total_duration_secs).unwrap_or(u32::MAX))
    );
    let _ = writeln!(
        out,
        "  Average duration: {:.0}s",
        summary.average_duration_secs
    );
    let _ = writeln!(
        out,
        "  Active days:      {} of the last {}",
        summary.days_with_activity,
        report.timeline.len()
    );

    if !report.emotions.is_empty() {
        let _ = writeln!(out, "\nTop Emotions");
        for e in &report.emotions {
            let _ = writeln!(out, "  {:<16} {}", e.emotion, e.count);
        }
    }

    if !report.locations.is_empty() {
        let _ = writeln!(out, "\nBusiest Locations");
        for bucket in &report.locations {
            let _ = writeln!(
                out,
                "  {:<20} {:>3}  {}",
                format!("{}, {}", bucket.lat, bucket.lng),
                bucket.count,
                bucket.sample_names.join(", ")
            );
        }
    }

    if !report.insights.is_empty() {
        let _ = writeln!(out, "\nInsights");
        for insight in &report.insights {
            let _ = writeln!(out, "  {}: {}", insight.title, insight.text);
        }
    }

    out.trim_end().to_string()
}

/// Render database statistics as text.
#[must_use]
pub fn render_stats(stats: &StorageStats, path: &str) -> String {
    let when = |t: Option<DateTime<Utc>>| {
        t.map_or_else(
            || "-".to_string(),
            |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
        )
    };
    let mut out = String::new();
    let _ = writeln!(out, "soundscape database");
    let _ = writeln!(out, "-------------------");
    let _ = writeln!(out, "Path:          {path}");
    let _ = writeln!(out, "Sounds:        {}", stats.total_sounds);
    let _ = writeln!(out, "Authors:       {}", stats.unique_authors);
    let _ = writeln!(out, "Oldest:        {}", when(stats.oldest_sound));
    let _ = writeln!(out, "Newest:        {}", when(stats.newest_sound));
    let _ = write!(
        out,
        "Size:          {}",
        format_file_size(stats.db_size_bytes)
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Aggregator;
    use crate::sound::{AudioQuality, Coordinates};
    use chrono::Duration;

    fn sound(id: i64, name: &str) -> SoundRecord {
        SoundRecord {
            id,
            name: name.to_string(),
            author: Some("Ana".to_string()),
            description: "Soft rain".to_string(),
            location: Coordinates::new(4.711, -74.0721),
            sound_types: vec!["rain".to_string()],
            emotions: vec!["calm".to_string(), "nostalgic".to_string()],
            tags: vec!["weather".to_string()],
            audio_url: None,
            duration_secs: 125,
            quality: AudioQuality::High,
            recorded_at: Utc::now() - Duration::hours(3),
        }
    }

    #[test]
    fn test_render_sounds_plain() {
        let out = render_sounds(&[sound(1, "Rain")], OutputFormat::Plain, Utc::now()).unwrap();
        assert_eq!(
            out,
            "#1 Rain (4.7110, -74.0721) by Ana [calm, nostalgic] 3 hours ago"
        );
    }

    #[test]
    fn test_render_sounds_table() {
        let out = render_sounds(
            &[sound(1, "Rain"), sound(22, "Market")],
            OutputFormat::Table,
            Utc::now(),
        )
        .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ID  NAME"));
        assert!(lines[1].starts_with("--  ----"));
        assert!(lines[2].contains("2:05"));
        assert!(lines[3].starts_with("22"));
    }

    #[test]
    fn test_render_sounds_json() {
        let out = render_sounds(&[sound(1, "Rain")], OutputFormat::Json, Utc::now()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["name"], "Rain");
    }

    #[test]
    fn test_render_empty() {
        let out = render_sounds(&[], OutputFormat::Table, Utc::now()).unwrap();
        assert_eq!(out, "No sounds found.");
        let out = render_sounds(&[], OutputFormat::Json, Utc::now()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_render_nearby_includes_distance() {
        let hits = vec![NearbySound {
            sound: sound(1, "Rain"),
            distance_km: 1.234,
        }];
        let out = render_nearby(&hits, OutputFormat::Table, Utc::now()).unwrap();
        assert!(out.contains("DISTANCE"));
        assert!(out.contains("1.23 km"));
    }

    #[test]
    fn test_render_recommendations() {
        let recs = vec![Recommendation {
            sound: sound(2, "Waves"),
            similarity_score: 2,
        }];
        let out = render_recommendations(&recs, OutputFormat::Plain, Utc::now()).unwrap();
        assert!(out.starts_with("2  #2 Waves"));
    }

    #[test]
    fn test_render_sound_detail() {
        let out = render_sound(&sound(5, "Rain"), Utc::now());
        assert!(out.starts_with("Sound #5"));
        assert!(out.contains("Quality:     High (MP3 320kbps)"));
        assert!(out.contains("Audio:       -"));
        assert!(out.contains("Duration:    2:05"));
    }

    #[test]
    fn test_render_report() {
        let sounds = vec![sound(1, "Rain"), sound(2, "Drizzle")];
        let report = Aggregator::default().report(&sounds, Utc::now().date_naive());
        let out = render_report(&report);
        assert!(out.contains("Sounds:           2"));
        assert!(out.contains("Top Emotions"));
        assert!(out.contains("Dominant Emotion"));
    }

    #[test]
    fn test_render_stats() {
        let stats = StorageStats {
            total_sounds: 3,
            unique_authors: 2,
            oldest_sound: None,
            newest_sound: None,
            db_size_bytes: 2048,
        };
        let out = render_stats(&stats, "/tmp/sounds.db");
        assert!(out.contains("Sounds:        3"));
        assert!(out.contains("Oldest:        -"));
        assert!(out.contains("2.0 KB"));
    }
}

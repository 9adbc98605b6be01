//! Aggregate statistics over a collection of sound records.
//!
//! Everything here is a pure function of its input slice: counting,
//! grouping and sorting, one pass per aggregate. Groups are always ordered
//! by count descending with ties kept in first-appearance order.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::config::AnalyticsConfig;
use crate::geo::round_to;
use crate::sound::SoundRecord;

/// Default number of entries in [`emotion_patterns`].
pub const DEFAULT_PATTERN_LIMIT: usize = 10;
/// Default number of entries in [`tag_stats`].
pub const DEFAULT_TAG_LIMIT: usize = 15;
/// Default number of entries in [`daily_activity`].
pub const DEFAULT_ACTIVITY_LIMIT: usize = 30;
/// Default number of entries in [`recommendations`].
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;
/// Default number of location buckets served by the locations endpoint.
pub const DEFAULT_LOCATION_LIMIT: usize = 20;

/// Sample names kept per location bucket.
const BUCKET_SAMPLE_NAMES: usize = 3;

/// How often an emotion appears across the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmotionCount {
    /// Emotion label.
    pub emotion: String,
    /// Number of sounds tagged with it.
    pub count: usize,
}

/// Sounds sharing a rounded coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationBucket {
    /// Rounded latitude.
    pub lat: f64,
    /// Rounded longitude.
    pub lng: f64,
    /// Number of sounds in the bucket.
    pub count: usize,
    /// Every emotion label of every sound in the bucket.
    pub emotions: Vec<String>,
    /// Names of the first few sounds in the bucket.
    pub sample_names: Vec<String>,
}

/// One day of the activity histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineDay {
    /// UTC calendar day.
    pub date: NaiveDate,
    /// Sounds recorded that day.
    pub count: usize,
}

/// Headline numbers for a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Number of sounds.
    pub total_sounds: usize,
    /// Distinct authors; anonymous sounds count as one author.
    pub unique_authors: usize,
    /// Distinct emotion labels.
    pub unique_emotions: usize,
    /// Sum of all durations.
    pub total_duration_secs: u64,
    /// Mean duration, 0 for an empty collection.
    pub average_duration_secs: f64,
    /// Sounds per distinct author, 0 for an empty collection.
    pub sounds_per_author: f64,
    /// Days inside the histogram window with at least one sound.
    pub days_with_activity: usize,
}

/// Which observation an [`Insight`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// The most frequent emotion.
    DominantEmotion,
    /// Contributions come from several authors.
    Collaboration,
    /// Many distinct emotions relative to collection size.
    EmotionalDiversity,
    /// Sounds were recorded inside the histogram window.
    TemporalActivity,
    /// Nothing was recorded inside the histogram window.
    RecentActivity,
}

/// A templated sentence describing the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    /// What the sentence is about.
    pub kind: InsightKind,
    /// Short heading.
    pub title: String,
    /// The sentence itself.
    pub text: String,
}

/// Everything the dashboard shows, computed in one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    /// Last day of the histogram window.
    pub today: NaiveDate,
    /// Headline numbers.
    pub summary: Summary,
    /// Most frequent emotions.
    pub emotions: Vec<EmotionCount>,
    /// Busiest locations.
    pub locations: Vec<LocationBucket>,
    /// Daily histogram, oldest day first.
    pub timeline: Vec<TimelineDay>,
    /// Generated sentences.
    pub insights: Vec<Insight>,
}

/// An emotion with the names of sounds carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmotionPattern {
    /// Emotion label.
    pub emotion: String,
    /// Number of sounds tagged with it.
    pub count: usize,
    /// Names of those sounds.
    pub examples: Vec<String>,
}

/// A tag with the names of sounds carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStat {
    /// Tag label.
    pub tag: String,
    /// Number of sounds tagged with it.
    pub count: usize,
    /// Names of those sounds.
    pub sounds: Vec<String>,
}

/// A calendar day on which sounds were recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    /// UTC calendar day.
    pub date: NaiveDate,
    /// Sounds recorded that day.
    pub count: usize,
    /// Every emotion label of those sounds.
    pub emotions: Vec<String>,
}

/// A sound similar to a reference sound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// The recommended sound.
    #[serde(flatten)]
    pub sound: SoundRecord,
    /// Shared emotions plus shared tags.
    pub similarity_score: usize,
}

/// Computes dashboard aggregates with configured limits.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AnalyticsConfig,
}

impl Aggregator {
    /// Create an aggregator.
    #[must_use]
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    /// The limits in use.
    #[must_use]
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Build the full dashboard report with `today` as the last histogram day.
    #[must_use]
    pub fn report(&self, sounds: &[SoundRecord], today: NaiveDate) -> AnalyticsReport {
        let emotions = self.emotion_counts(sounds);
        let locations = self.location_buckets(sounds, self.config.top_locations);
        let timeline = self.timeline(sounds, today);
        let summary = self.summary_with_timeline(sounds, &timeline);
        let insights = self.insights(&summary, &emotions);

        AnalyticsReport {
            today,
            summary,
            emotions,
            locations,
            timeline,
            insights,
        }
    }

    /// The most frequent emotions, at most `top_emotions` of them.
    #[must_use]
    pub fn emotion_counts(&self, sounds: &[SoundRecord]) -> Vec<EmotionCount> {
        let mut counts = count_emotions(sounds);
        counts.truncate(self.config.top_emotions);
        counts
    }

    /// Group sounds by coordinates rounded to `location_precision` decimals.
    #[must_use]
    pub fn location_buckets(&self, sounds: &[SoundRecord], limit: usize) -> Vec<LocationBucket> {
        let precision = self.config.location_precision;
        let mut groups: Groups<String, LocationBucket> = Groups::default();

        for sound in sounds {
            // Adding 0.0 folds -0.0 into 0.0 so both land in one bucket
            let lat = round_to(sound.location.lat, precision) + 0.0;
            let lng = round_to(sound.location.lng, precision) + 0.0;
            let key = format!("{lat},{lng}");

            let bucket = groups.entry(key, || LocationBucket {
                lat,
                lng,
                count: 0,
                emotions: Vec::new(),
                sample_names: Vec::new(),
            });
            bucket.count += 1;
            bucket.emotions.extend(sound.emotions.iter().cloned());
            if bucket.sample_names.len() < BUCKET_SAMPLE_NAMES {
                bucket.sample_names.push(sound.name.clone());
            }
        }

        let mut buckets = groups.into_sorted(|b| b.count);
        buckets.truncate(limit);
        buckets
    }

    /// Daily histogram of the last `timeline_days` days ending at `today`,
    /// oldest first. Sounds outside the window are ignored.
    #[must_use]
    pub fn timeline(&self, sounds: &[SoundRecord], today: NaiveDate) -> Vec<TimelineDay> {
        let days = self.config.timeline_days.max(1);
        let start = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);

        let mut timeline: Vec<TimelineDay> = start
            .iter_days()
            .take_while(|d| *d <= today)
            .map(|date| TimelineDay { date, count: 0 })
            .collect();

        for sound in sounds {
            let day = sound.recorded_at.date_naive();
            if day < start || day > today {
                continue;
            }
            let offset = (day - start).num_days();
            if let Some(slot) = usize::try_from(offset)
                .ok()
                .and_then(|i| timeline.get_mut(i))
            {
                slot.count += 1;
            }
        }

        timeline
    }

    /// Headline numbers, with activity counted over the window ending at `today`.
    #[must_use]
    pub fn summary(&self, sounds: &[SoundRecord], today: NaiveDate) -> Summary {
        let timeline = self.timeline(sounds, today);
        self.summary_with_timeline(sounds, &timeline)
    }

    fn summary_with_timeline(&self, sounds: &[SoundRecord], timeline: &[TimelineDay]) -> Summary {
        let total_sounds = sounds.len();
        let unique_authors = sounds
            .iter()
            .map(|s| s.author.as_deref())
            .collect::<HashSet<_>>()
            .len();
        let unique_emotions = sounds
            .iter()
            .flat_map(|s| s.emotions.iter())
            .collect::<HashSet<_>>()
            .len();
        let total_duration_secs: u64 = sounds.iter().map(|s| u64::from(s.duration_secs)).sum();
        let days_with_activity = timeline.iter().filter(|d| d.count > 0).count();

        let average_duration_secs = if total_sounds == 0 {
            0.0
        } else {
            to_f64(total_duration_secs) / to_f64(total_sounds)
        };
        let sounds_per_author = if unique_authors == 0 {
            0.0
        } else {
            to_f64(total_sounds) / to_f64(unique_authors)
        };

        Summary {
            total_sounds,
            unique_authors,
            unique_emotions,
            total_duration_secs,
            average_duration_secs,
            sounds_per_author,
            days_with_activity,
        }
    }

    /// Templated sentences about the collection, in a fixed order.
    #[must_use]
    pub fn insights(&self, summary: &Summary, emotions: &[EmotionCount]) -> Vec<Insight> {
        let total = summary.total_sounds;
        let window = self.config.timeline_days;
        let mut insights = Vec::new();

        if let Some(top) = emotions.first() {
            insights.push(Insight {
                kind: InsightKind::DominantEmotion,
                title: "Dominant Emotion".to_string(),
                text: format!(
                    "{} is the most common emotion with {} appearances ({:.1}% of all sounds).",
                    top.emotion,
                    top.count,
                    percent(top.count, total)
                ),
            });
        }

        if summary.unique_authors > 1 {
            insights.push(Insight {
                kind: InsightKind::Collaboration,
                title: "Collaborative Participation".to_string(),
                text: format!(
                    "{} contributors, averaging {:.1} sounds per person.",
                    summary.unique_authors, summary.sounds_per_author
                ),
            });
        }

        if emotions.len() >= 3 {
            insights.push(Insight {
                kind: InsightKind::EmotionalDiversity,
                title: "Emotional Diversity".to_string(),
                text: format!(
                    "An emotional diversity of {:.1}% shows a rich variety of moods in the collection.",
                    percent(emotions.len(), total)
                ),
            });
        }

        if summary.days_with_activity > 0 {
            insights.push(Insight {
                kind: InsightKind::TemporalActivity,
                title: "Temporal Activity".to_string(),
                text: format!(
                    "Activity on {} days over the last {} days, averaging {:.1} sounds per active day.",
                    summary.days_with_activity,
                    window,
                    to_f64(total) / to_f64(summary.days_with_activity)
                ),
            });
        } else {
            insights.push(Insight {
                kind: InsightKind::RecentActivity,
                title: "Recent Activity".to_string(),
                text: format!(
                    "No sounds were recorded in the last {window} days. A good moment to contribute new ones!"
                ),
            });
        }

        insights
    }
}

/// Every emotion with its count, most frequent first.
#[must_use]
pub fn count_emotions(sounds: &[SoundRecord]) -> Vec<EmotionCount> {
    let mut groups: Groups<&str, EmotionCount> = Groups::default();
    for sound in sounds {
        for emotion in &sound.emotions {
            groups
                .entry(emotion.as_str(), || EmotionCount {
                    emotion: emotion.clone(),
                    count: 0,
                })
                .count += 1;
        }
    }
    groups.into_sorted(|e| e.count)
}

/// Emotions with the names of the sounds carrying them.
#[must_use]
pub fn emotion_patterns(sounds: &[SoundRecord], limit: usize) -> Vec<EmotionPattern> {
    let mut groups: Groups<&str, EmotionPattern> = Groups::default();
    for sound in sounds {
        for emotion in &sound.emotions {
            let pattern = groups.entry(emotion.as_str(), || EmotionPattern {
                emotion: emotion.clone(),
                count: 0,
                examples: Vec::new(),
            });
            pattern.count += 1;
            pattern.examples.push(sound.name.clone());
        }
    }

    let mut patterns = groups.into_sorted(|p| p.count);
    patterns.truncate(limit);
    patterns
}

/// Tags with the names of the sounds carrying them.
#[must_use]
pub fn tag_stats(sounds: &[SoundRecord], limit: usize) -> Vec<TagStat> {
    let mut groups: Groups<&str, TagStat> = Groups::default();
    for sound in sounds {
        for tag in &sound.tags {
            let stat = groups.entry(tag.as_str(), || TagStat {
                tag: tag.clone(),
                count: 0,
                sounds: Vec::new(),
            });
            stat.count += 1;
            stat.sounds.push(sound.name.clone());
        }
    }

    let mut stats = groups.into_sorted(|s| s.count);
    stats.truncate(limit);
    stats
}

/// Days with at least one sound, newest first.
#[must_use]
pub fn daily_activity(sounds: &[SoundRecord], limit: usize) -> Vec<DailyActivity> {
    let mut groups: Groups<NaiveDate, DailyActivity> = Groups::default();
    for sound in sounds {
        let date = sound.recorded_at.date_naive();
        let day = groups.entry(date, || DailyActivity {
            date,
            count: 0,
            emotions: Vec::new(),
        });
        day.count += 1;
        day.emotions.extend(sound.emotions.iter().cloned());
    }

    let mut days = groups.groups;
    days.sort_by_key(|d| Reverse(d.date));
    days.truncate(limit);
    days
}

/// Sounds sharing at least one emotion or tag with `reference`, most
/// similar first, ties broken by newest first.
#[must_use]
pub fn recommendations(
    reference: &SoundRecord,
    sounds: &[SoundRecord],
    limit: usize,
) -> Vec<Recommendation> {
    let emotions: HashSet<&str> = reference.emotions.iter().map(String::as_str).collect();
    let tags: HashSet<&str> = reference.tags.iter().map(String::as_str).collect();

    let mut scored: Vec<Recommendation> = sounds
        .iter()
        .filter(|s| s.id != reference.id)
        .filter_map(|s| {
            let shared_emotions = distinct(&s.emotions)
                .filter(|e| emotions.contains(e))
                .count();
            let shared_tags = distinct(&s.tags).filter(|t| tags.contains(t)).count();
            let similarity_score = shared_emotions + shared_tags;
            (similarity_score > 0).then(|| Recommendation {
                sound: s.clone(),
                similarity_score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity_score
            .cmp(&a.similarity_score)
            .then_with(|| b.sound.recorded_at.cmp(&a.sound.recorded_at))
            .then_with(|| b.sound.id.cmp(&a.sound.id))
    });
    scored.truncate(limit);
    scored
}

fn distinct(labels: &[String]) -> impl Iterator<Item = &str> {
    labels
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .into_iter()
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        to_f64(part) / to_f64(whole) * 100.0
    }
}

fn to_f64(n: impl TryInto<u32>) -> f64 {
    n.try_into().map_or(f64::from(u32::MAX), f64::from)
}

/// Insertion-ordered grouping.
#[derive(Debug)]
struct Groups<K, V> {
    index: HashMap<K, usize>,
    groups: Vec<V>,
}

impl<K, V> Default for Groups<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, V> Groups<K, V> {
    fn entry(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        let groups = &mut self.groups;
        let slot = *self.index.entry(key).or_insert_with(|| {
            groups.push(init());
            groups.len() - 1
        });
        &mut self.groups[slot]
    }

    /// Groups by descending count; the stable sort keeps first-appearance order on ties.
    fn into_sorted(self, count: impl Fn(&V) -> usize) -> Vec<V> {
        let mut groups = self.groups;
        groups.sort_by_key(|g| Reverse(count(g)));
        groups
    }
}

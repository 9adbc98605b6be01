//! Analytics endpoints under `/api/analytics`.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use super::{ApiError, AppState, Envelope};
use crate::analytics::{
    daily_activity, emotion_patterns, recommendations, tag_stats, AnalyticsReport, DailyActivity,
    EmotionPattern, LocationBucket, Recommendation, TagStat, DEFAULT_ACTIVITY_LIMIT,
    DEFAULT_LOCATION_LIMIT, DEFAULT_PATTERN_LIMIT, DEFAULT_RECOMMENDATION_LIMIT,
    DEFAULT_TAG_LIMIT,
};
use crate::error::Error;
use crate::sound::SoundRecord;
use crate::storage::{SearchFilter, DEFAULT_SEARCH_LIMIT};

/// Build analytics routes.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/report", get(report))
        .route("/analytics/emotions", get(emotions))
        .route("/analytics/locations", get(locations))
        .route("/analytics/tags", get(tags))
        .route("/analytics/timeline", get(timeline))
        .route("/analytics/search", get(search))
        .route("/analytics/recommendations/:id", get(recommend))
}

fn all_sounds(state: &AppState) -> Result<Vec<SoundRecord>, ApiError> {
    Ok(state.storage()?.all()?)
}

/// GET /api/analytics/report
pub async fn report(
    State(state): State<AppState>,
) -> Result<Json<Envelope<AnalyticsReport>>, ApiError> {
    let sounds = all_sounds(&state)?;
    let report = state
        .aggregator()
        .report(&sounds, Utc::now().date_naive());
    Ok(Json(Envelope::data(report)))
}

/// GET /api/analytics/emotions
pub async fn emotions(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<EmotionPattern>>>, ApiError> {
    let sounds = all_sounds(&state)?;
    Ok(Json(Envelope::list(emotion_patterns(
        &sounds,
        DEFAULT_PATTERN_LIMIT,
    ))))
}

/// GET /api/analytics/locations
pub async fn locations(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<LocationBucket>>>, ApiError> {
    let sounds = all_sounds(&state)?;
    let buckets = state
        .aggregator()
        .location_buckets(&sounds, DEFAULT_LOCATION_LIMIT);
    Ok(Json(Envelope::list(buckets)))
}

/// GET /api/analytics/tags
pub async fn tags(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<TagStat>>>, ApiError> {
    let sounds = all_sounds(&state)?;
    Ok(Json(Envelope::list(tag_stats(&sounds, DEFAULT_TAG_LIMIT))))
}

/// GET /api/analytics/timeline
pub async fn timeline(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<DailyActivity>>>, ApiError> {
    let sounds = all_sounds(&state)?;
    Ok(Json(Envelope::list(daily_activity(
        &sounds,
        DEFAULT_ACTIVITY_LIMIT,
    ))))
}

/// GET /api/analytics/search?q&emotion&tag&author
pub async fn search(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> Result<Json<Envelope<Vec<SoundRecord>>>, ApiError> {
    let results = state.storage()?.search(&filter, DEFAULT_SEARCH_LIMIT)?;
    Ok(Json(Envelope::list(results)))
}

/// Recommendations plus the sound they were computed for.
#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    /// Always `true`.
    pub success: bool,
    /// Similar sounds, most similar first.
    pub data: Vec<Recommendation>,
    /// Number of recommendations.
    pub count: usize,
    /// The reference sound.
    pub reference: SoundRecord,
}

/// GET /api/analytics/recommendations/:id
pub async fn recommend(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid sound id: {id}")))?;

    let (reference, sounds) = {
        let storage = state.storage()?;
        let reference = storage.get(id)?.ok_or(Error::SoundNotFound { id })?;
        (reference, storage.all()?)
    };

    let data = recommendations(&reference, &sounds, DEFAULT_RECOMMENDATION_LIMIT);
    Ok(Json(RecommendationResponse {
        success: true,
        count: data.len(),
        data,
        reference,
    }))
}

//! Sound record endpoints.
//!
//! - `GET    /api/sounds` recent, by emotion, or near a point
//! - `POST   /api/sounds` multipart upload of audio plus metadata
//! - `GET    /api/sounds/:id`
//! - `PUT    /api/sounds/:id` partial update
//! - `DELETE /api/sounds/:id` removes the record and its audio file
//! - `POST   /api/sounds/:id/tags`

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiError, AppState, Envelope};
use crate::error::Error;
use crate::sound::{AudioQuality, Coordinates, NewSound, SoundRecord, SoundUpdate};
use crate::storage::{
    NearbySound, TagOutcome, DEFAULT_EMOTION_LIMIT, DEFAULT_LIST_LIMIT, DEFAULT_NEARBY_LIMIT,
    DEFAULT_RADIUS_KM,
};

/// Query parameters for `GET /api/sounds`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Latitude of the search center.
    pub lat: Option<f64>,
    /// Longitude of the search center.
    pub lng: Option<f64>,
    /// Search radius in kilometres.
    pub radius: Option<f64>,
    /// Emotion filter.
    pub emotion: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// Either plain records or records with their distance.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SoundList {
    /// Recent or filtered records.
    Records(Vec<SoundRecord>),
    /// Records near a point, nearest first.
    Nearby(Vec<NearbySound>),
}

impl SoundList {
    fn len(&self) -> usize {
        match self {
            Self::Records(r) => r.len(),
            Self::Nearby(n) => n.len(),
        }
    }
}

/// GET /api/sounds
///
/// With `lat` and `lng` returns sounds within `radius` km; otherwise with
/// `emotion` returns sounds carrying it; otherwise the most recent sounds.
pub async fn list_sounds(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Envelope<SoundList>>, ApiError> {
    let storage = state.storage()?;
    let emotion = query
        .emotion
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let list = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => SoundList::Nearby(storage.nearby(
            Coordinates::new(lat, lng),
            query.radius.unwrap_or(DEFAULT_RADIUS_KM),
            query.limit.unwrap_or(DEFAULT_NEARBY_LIMIT),
        )?),
        (Some(_), None) | (None, Some(_)) => {
            return Err(ApiError::bad_request(
                "lat and lng must be provided together",
            ))
        }
        (None, None) => match emotion {
            Some(emotion) => SoundList::Records(
                storage.by_emotion(emotion, query.limit.unwrap_or(DEFAULT_EMOTION_LIMIT))?,
            ),
            None => SoundList::Records(
                storage.list_recent(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))?,
            ),
        },
    };

    let count = list.len();
    Ok(Json(Envelope {
        count: Some(count),
        ..Envelope::data(list)
    }))
}

/// GET /api/sounds/:id
pub async fn get_sound(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<SoundRecord>>, ApiError> {
    let id = parse_id(&id)?;
    let record = state
        .storage()?
        .get(id)?
        .ok_or(Error::SoundNotFound { id })?;
    Ok(Json(Envelope::data(record)))
}

/// Response body of a successful upload.
#[derive(Debug, Serialize)]
pub struct CreatedSound {
    /// Id of the new record.
    pub id: i64,
    /// Where its audio is served.
    pub audio_url: String,
}

/// POST /api/sounds
///
/// Multipart form with an `audio` file and the record fields. The audio is
/// only written once the fields validate, and removed again if the insert
/// fails.
pub async fn create_sound(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<CreatedSound>>), ApiError> {
    let form = SoundForm::read(multipart).await?;
    let (mut sound, audio) = form.into_parts()?;
    sound.validate()?;

    let uploads = state.shared_uploads();
    let stored = tokio::task::spawn_blocking(move || {
        uploads.save(&audio.file_name, &audio.bytes, audio.content_type.as_deref())
    })
    .await
    .map_err(ApiError::internal)??;
    sound.audio_url = Some(stored.url.clone());

    let inserted = state.storage()?.insert(&sound);
    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            remove_audio(&state, stored.url.clone()).await;
            return Err(e.into());
        }
    };

    info!("Created sound {} ('{}')", id, sound.name);
    Ok((
        StatusCode::CREATED,
        Json(
            Envelope::data(CreatedSound {
                id,
                audio_url: stored.url,
            })
            .with_message("sound created"),
        ),
    ))
}

/// PUT /api/sounds/:id
pub async fn update_sound(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SoundUpdate>, JsonRejection>,
) -> Result<Json<Envelope<SoundRecord>>, ApiError> {
    let id = parse_id(&id)?;
    let Json(update) = body?;

    let storage = state.storage()?;
    if !storage.update(id, &update)? {
        return Err(Error::SoundNotFound { id }.into());
    }
    let record = storage.get(id)?.ok_or(Error::SoundNotFound { id })?;

    Ok(Json(Envelope::data(record).with_message("sound updated")))
}

/// Body of `POST /api/sounds/:id/tags`.
#[derive(Debug, Deserialize)]
pub struct TagRequest {
    /// Tag to attach.
    #[serde(default)]
    pub tag: Option<String>,
}

/// POST /api/sounds/:id/tags
pub async fn add_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TagRequest>, JsonRejection>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_id(&id)?;
    let Json(request) = body?;
    let tag = request
        .tag
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("a tag must be provided"))?;

    match state.storage()?.add_tag(id, &tag)? {
        TagOutcome::Added => Ok(Json(Envelope::message("tag added"))),
        TagOutcome::AlreadyPresent => Ok(Json(Envelope::message("tag already present"))),
        TagOutcome::NotFound => Err(Error::SoundNotFound { id }.into()),
    }
}

/// DELETE /api/sounds/:id
pub async fn delete_sound(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_id(&id)?;
    let removed = state
        .storage()?
        .delete(id)?
        .ok_or(Error::SoundNotFound { id })?;

    if let Some(url) = removed.audio_url {
        remove_audio(&state, url).await;
    }

    Ok(Json(Envelope::message("sound deleted")))
}

/// Delete a stored audio file on the blocking pool. Failures are logged only.
async fn remove_audio(state: &AppState, url: String) {
    let uploads = state.shared_uploads();
    let outcome = tokio::task::spawn_blocking(move || {
        let result = uploads.remove(&url);
        (url, result)
    })
    .await;
    match outcome {
        Ok((_, Ok(_))) => {}
        Ok((url, Err(e))) => warn!("Failed to remove audio {}: {}", url, e),
        Err(e) => warn!("Audio removal task failed: {}", e),
    }
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid sound id: {raw}")))
}

/// The uploaded file part of the form.
#[derive(Debug)]
struct AudioPart {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Raw multipart fields before parsing.
#[derive(Debug, Default)]
struct SoundForm {
    audio: Option<AudioPart>,
    name: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    description: Option<String>,
    author: Option<String>,
    duration: Option<String>,
    quality: Option<String>,
    sound_types: Vec<String>,
    emotions: Vec<String>,
    tags: Vec<String>,
}

impl SoundForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "audio" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                form.audio = Some(AudioPart {
                    file_name,
                    content_type,
                    bytes,
                });
                continue;
            }

            let value = field.text().await?;
            match name.as_str() {
                "name" => form.name = Some(value),
                "latitude" => form.latitude = Some(value),
                "longitude" => form.longitude = Some(value),
                "description" => form.description = Some(value),
                "author" => form.author = Some(value),
                "duration" => form.duration = Some(value),
                "quality" => form.quality = Some(value),
                "sound_types" => form.sound_types.push(value),
                "emotions" => form.emotions.push(value),
                "tags" => form.tags.push(value),
                other => warn!("Ignoring unknown form field '{}'", other),
            }
        }

        Ok(form)
    }

    fn into_parts(self) -> Result<(NewSound, AudioPart), ApiError> {
        let audio = self
            .audio
            .ok_or_else(|| ApiError::bad_request("no audio file provided"))?;
        let (Some(name), Some(latitude), Some(longitude)) =
            (self.name, self.latitude, self.longitude)
        else {
            return Err(ApiError::bad_request(
                "missing required fields: name, latitude, longitude",
            ));
        };

        let lat = parse_number::<f64>("latitude", &latitude)?;
        let lng = parse_number::<f64>("longitude", &longitude)?;
        let duration_secs = match self.duration.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(d) => parse_number::<u32>("duration", d)?,
        };
        let quality = match self.quality.as_deref().map(str::trim) {
            None | Some("") => AudioQuality::default(),
            Some(q) => q.parse()?,
        };

        let mut sound = NewSound::new(name, Coordinates::new(lat, lng));
        sound.description = self.description.unwrap_or_default();
        sound.author = self.author;
        sound.duration_secs = duration_secs;
        sound.quality = quality;
        sound.sound_types = self.sound_types;
        sound.emotions = self.emotions;
        sound.tags = self.tags;

        Ok((sound, audio))
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| Error::invalid_field(field, format!("'{raw}' is not a number")).into())
}

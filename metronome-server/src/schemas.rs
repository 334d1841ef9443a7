use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterProfileSchema {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTrackSchema {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub artists: String,
    /// Track length in whole seconds
    #[validate(range(min = 1, max = 86400))]
    pub duration: i64,
    #[validate(url)]
    pub playback_url: String,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewRoomSchema {
    /// Tracks to seed the queue with, in playback order
    #[validate(length(min = 1))]
    pub track_ids: Vec<u64>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddTrackSchema {
    pub track_id: u64,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinWithCodeSchema {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

/// An action performed on a room's shared playback
#[derive(Debug, ToSchema, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomActionSchema {
    /// Resumes a paused room, or restarts the current track from the top
    Play,
    Pause,
    Next,
    SkipTo { roomtrack_id: u64 },
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}

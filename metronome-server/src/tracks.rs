use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json,
};
use chrono::Duration;
use metronome_core::{Catalog, NewTrack, TrackId, TrackPayload};

use crate::{
    context::ServerContext,
    directory::Actor,
    errors::ServerResult,
    schemas::{NewTrackSchema, ValidatedJson},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/tracks",
    tag = "tracks",
    responses(
        (status = 200, description = "The most played tracks in the catalog")
    )
)]
pub(crate) async fn browse(State(context): State<ServerContext>) -> Json<Vec<TrackPayload>> {
    let tracks = context
        .catalog
        .browse()
        .into_iter()
        .map(|track| track.payload())
        .collect();

    Json(tracks)
}

#[utoipa::path(
    post,
    path = "/v1/tracks",
    tag = "tracks",
    request_body = NewTrackSchema,
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "The newly registered track")
    )
)]
pub(crate) async fn register(
    _actor: Actor,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewTrackSchema>,
) -> Json<TrackPayload> {
    let track = context.catalog.insert(NewTrack {
        title: body.title,
        artists: body.artists,
        duration: Duration::seconds(body.duration),
        playback_url: body.playback_url,
        image_url: body.image_url,
    });

    Json(track.payload())
}

#[utoipa::path(
    get,
    path = "/v1/tracks/{id}",
    tag = "tracks",
    params(
        ("id" = u64, Path, description = "The id of the track to fetch")
    ),
    responses(
        (status = 200, description = "The track with the given id")
    )
)]
pub(crate) async fn track(
    State(context): State<ServerContext>,
    Path(id): Path<u64>,
) -> ServerResult<Json<TrackPayload>> {
    let track = context.catalog.track(TrackId::from(id))?;

    Ok(Json(track.payload()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(browse))
        .route("/", post(register))
        .route("/:id", get(track))
}

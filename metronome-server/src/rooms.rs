use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};
use metronome_core::{
    MemberProfile, RoomId, RoomStatePayload, RoomTrackId, RoomTrackPayload, TrackId, UserId,
};

use crate::{
    context::ServerContext,
    directory::Actor,
    errors::{ServerError, ServerResult},
    schemas::{
        AddTrackSchema, JoinWithCodeSchema, NewRoomSchema, RoomActionSchema, ValidatedJson,
    },
    Router,
};

/// Playback and queue changes are reserved for the room's members
fn ensure_member(
    context: &ServerContext,
    room_id: RoomId,
    user_id: UserId,
) -> Result<(), ServerError> {
    match context.metronome.rooms.room_of(user_id) {
        Some(current) if current == room_id => Ok(()),
        _ => Err(ServerError::NotInRoom),
    }
}

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "The state of every live room")
    )
)]
pub(crate) async fn list_rooms(State(context): State<ServerContext>) -> Json<Vec<RoomStatePayload>> {
    let rooms: Vec<_> = context
        .metronome
        .rooms
        .list_all()
        .into_iter()
        .map(|room| room.state())
        .collect();

    Json(rooms)
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "The state of the newly created room")
    )
)]
pub(crate) async fn create_room(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<RoomStatePayload>> {
    let track_ids = body.track_ids.into_iter().map(TrackId::from).collect();
    let room = context.metronome.rooms.create_room(profile, track_ids)?;

    Ok(Json(room.state()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    params(
        ("id" = u64, Path, description = "The id of the room")
    ),
    responses(
        (status = 200, description = "The state of the room with the given id")
    )
)]
pub(crate) async fn room(
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
) -> ServerResult<Json<RoomStatePayload>> {
    let room = context.metronome.rooms.room_by_id(RoomId::from(room_id))?;

    Ok(Json(room.state()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/code/{code}",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "The join code of the room")
    ),
    responses(
        (status = 200, description = "The state of the room behind the code")
    )
)]
pub(crate) async fn room_by_code(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<RoomStatePayload>> {
    let room = context.metronome.rooms.room_by_code(&code)?;

    Ok(Json(room.state()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/members",
    tag = "rooms",
    request_body = JoinWithCodeSchema,
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "User was admitted to the room behind the code")
    )
)]
pub(crate) async fn join_with_code(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<JoinWithCodeSchema>,
) -> ServerResult<Json<RoomStatePayload>> {
    let room = context.metronome.rooms.join_with_code(&body.code, profile)?;

    Ok(Json(room.state()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    params(
        ("id" = u64, Path, description = "The id of the room to join")
    ),
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "User was added as a member of the room")
    )
)]
pub(crate) async fn join_room(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
) -> ServerResult<Json<RoomStatePayload>> {
    let room = context
        .metronome
        .rooms
        .join_room(RoomId::from(room_id), profile)?;

    Ok(Json(room.state()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    params(
        ("id" = u64, Path, description = "The id of the room to leave")
    ),
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "User is no longer a member of the room")
    )
)]
pub(crate) async fn leave_room(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
) -> ServerResult<()> {
    ensure_member(&context, RoomId::from(room_id), profile.user_id)?;
    context.metronome.rooms.leave_room(profile.user_id);

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/members/heartbeat",
    tag = "rooms",
    params(
        ("id" = u64, Path, description = "The id of the room the user is in")
    ),
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "The user's liveness clock was refreshed")
    )
)]
pub(crate) async fn heartbeat(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
) -> ServerResult<()> {
    ensure_member(&context, RoomId::from(room_id), profile.user_id)?;
    context.metronome.rooms.heartbeat(profile.user_id)?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    params(
        ("id" = u64, Path, description = "The id of the room")
    ),
    responses(
        (status = 200, description = "The profiles of everyone currently in the room")
    )
)]
pub(crate) async fn members(
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
) -> ServerResult<Json<Vec<MemberProfile>>> {
    let room = context.metronome.rooms.room_by_id(RoomId::from(room_id))?;
    let profiles = room
        .members()
        .into_iter()
        .map(|member| member.profile)
        .collect();

    Ok(Json(profiles))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/queue",
    tag = "rooms",
    params(
        ("id" = u64, Path, description = "The id of the room")
    ),
    responses(
        (status = 200, description = "The room's queue in playback order, starting at the current track")
    )
)]
pub(crate) async fn queue(
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
) -> ServerResult<Json<Vec<RoomTrackPayload>>> {
    let room = context.metronome.rooms.room_by_id(RoomId::from(room_id))?;

    Ok(Json(room.queue()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/queue",
    tag = "rooms",
    request_body = AddTrackSchema,
    params(
        ("id" = u64, Path, description = "The id of the room")
    ),
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "The queue entry the track became")
    )
)]
pub(crate) async fn add_to_queue(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
    ValidatedJson(body): ValidatedJson<AddTrackSchema>,
) -> ServerResult<Json<RoomTrackPayload>> {
    ensure_member(&context, RoomId::from(room_id), profile.user_id)?;

    let room = context.metronome.rooms.room_by_id(RoomId::from(room_id))?;
    let roomtrack = room.add_track(TrackId::from(body.track_id), Some(&profile))?;

    Ok(Json(roomtrack))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/queue/{roomtrack_id}",
    tag = "rooms",
    params(
        ("id" = u64, Path, description = "The id of the room"),
        ("roomtrack_id" = u64, Path, description = "The queue entry to remove")
    ),
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "The entry was removed from the queue")
    )
)]
pub(crate) async fn remove_from_queue(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    Path((room_id, roomtrack_id)): Path<(u64, u64)>,
) -> ServerResult<()> {
    ensure_member(&context, RoomId::from(room_id), profile.user_id)?;

    let room = context.metronome.rooms.room_by_id(RoomId::from(room_id))?;
    let removed = room.remove_track(RoomTrackId::from(roomtrack_id), Some(&profile))?;

    if removed {
        Ok(())
    } else {
        Err(ServerError::QueueRemovalRefused)
    }
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/actions",
    tag = "rooms",
    request_body = RoomActionSchema,
    params(
        ("id" = u64, Path, description = "The id of the room")
    ),
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "Action was performed")
    )
)]
pub(crate) async fn perform_room_action(
    Actor(profile): Actor,
    State(context): State<ServerContext>,
    Path(room_id): Path<u64>,
    Json(body): Json<RoomActionSchema>,
) -> ServerResult<()> {
    ensure_member(&context, RoomId::from(room_id), profile.user_id)?;

    let room = context.metronome.rooms.room_by_id(RoomId::from(room_id))?;

    match body {
        RoomActionSchema::Play => room.play(Some(&profile)),
        RoomActionSchema::Pause => room.pause(Some(&profile)),
        RoomActionSchema::Next => room.skip_to_next(Some(&profile)),
        RoomActionSchema::SkipTo { roomtrack_id } => {
            room.skip_to(RoomTrackId::from(roomtrack_id), Some(&profile))?
        }
    };

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/", post(create_room))
        .route("/members", post(join_with_code))
        .route("/code/:code", get(room_by_code))
        .route("/:id", get(room))
        .route("/:id/members", get(members))
        .route("/:id/members", post(join_room))
        .route("/:id/members", delete(leave_room))
        .route("/:id/members/heartbeat", post(heartbeat))
        .route("/:id/queue", get(queue))
        .route("/:id/queue", post(add_to_queue))
        .route("/:id/queue/:roomtrack_id", delete(remove_from_queue))
        .route("/:id/actions", post(perform_room_action))
}

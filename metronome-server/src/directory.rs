use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json,
};
use dashmap::DashMap;
use metronome_core::{Id, MemberProfile, UserId};

use crate::{
    context::ServerContext,
    schemas::{RegisterProfileSchema, ValidatedJson},
    Router,
};

/// The header clients identify themselves with
pub const USER_ID_HEADER: &str = "x-user-id";

/// An in-memory stand-in for the host application's user accounts.
///
/// Rooms only care about profiles, so this is the smallest thing that can
/// mint them.
#[derive(Default)]
pub struct Directory {
    users: DashMap<UserId, MemberProfile>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: String, avatar_url: Option<String>) -> MemberProfile {
        let profile = MemberProfile {
            user_id: Id::<Self>::new().value(),
            name,
            avatar_url,
        };

        self.users.insert(profile.user_id, profile.clone());
        profile
    }

    pub fn profile(&self, user_id: UserId) -> Option<MemberProfile> {
        self.users.get(&user_id).map(|profile| profile.clone())
    }
}

/// The user making the current request, resolved from the id header
pub struct Actor(pub MemberProfile);

#[async_trait]
impl FromRequestParts<ServerContext> for Actor {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let user_id: UserId = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing or malformed user id"))?;

        let profile = context
            .directory
            .profile(user_id)
            .ok_or((StatusCode::UNAUTHORIZED, "User is not registered"))?;

        Ok(Self(profile))
    }
}

#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "users",
    request_body = RegisterProfileSchema,
    responses(
        (status = 200, description = "The registered profile, including the id to authenticate with")
    )
)]
pub(crate) async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterProfileSchema>,
) -> Json<MemberProfile> {
    Json(context.directory.register(body.name, body.avatar_url))
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "users",
    security(
        ("UserId" = [])
    ),
    responses(
        (status = 200, description = "The profile belonging to the supplied user id")
    )
)]
pub(crate) async fn me(Actor(profile): Actor) -> Json<MemberProfile> {
    Json(profile)
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(register))
        .route("/me", get(me))
}

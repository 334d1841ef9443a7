use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipauto::utoipauto;

use crate::directory::USER_ID_HEADER;

#[utoipauto(paths = "./metronome-server/src")]
#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        description = "metronome-server exposes endpoints to create and take part in listening rooms"
    ))
]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER)));

            components.add_security_scheme("UserId", scheme)
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

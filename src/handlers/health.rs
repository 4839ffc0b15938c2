use axum::{Json, response::IntoResponse};
use http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Healthz {
    pub status: String,
}

pub async fn healthz_route() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(Healthz {
            status: String::from("healthy"),
        }),
    )
}

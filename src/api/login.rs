use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::tracker::LoginRequest;
use crate::Document;

#[derive(Debug, Deserialize)]
pub(super) struct LoginBody {
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Serialize)]
pub(super) struct LoginResponse {
    token: String,
    user: Document,
}

/// `POST /login`.
pub(super) async fn login(
    State(app): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(body) = body?;
    for (field, value) in [("access_token", &body.access_token), ("email", &body.email)] {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "attribute {field} is required, but not present in request"
            )));
        }
    }

    let session = app
        .tracker()
        .login(LoginRequest {
            id_token: body.id_token,
            access_token: body.access_token,
            email: body.email,
        })
        .await?;

    Ok(Json(LoginResponse {
        token: session.token,
        user: session.user,
    }))
}

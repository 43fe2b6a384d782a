//! HTTP surface over a [`Tracker`].
//!
//! Every route except `POST /event` and `POST /login` requires an
//! `Authorization: bearer <token>` header whose token holds at least the
//! route's access level. Failures are reported as
//! `{"code": "...", "message": "..."}` (see [`ApiError`]).

mod error;
mod events;
mod login;
mod resources;
mod search;

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;

pub use error::{error_code, ApiError};

use crate::access::AccessLevel;
use crate::schema::{ITEM, MAP, SENSOR, USER};
use crate::tracker::Tracker;
use crate::Document;
use resources::Resource;

#[derive(Debug, Clone)]
pub struct AppState {
    tracker: Arc<Tracker>,
}

impl AppState {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Checks the request's bearer token against `required`.
    pub(crate) async fn authorize(
        &self,
        headers: &HeaderMap,
        required: AccessLevel,
    ) -> Result<Document, ApiError> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        Ok(self.tracker.authorize(header, required).await?)
    }
}

pub fn router(tracker: Arc<Tracker>) -> Router {
    let resources = [
        Resource::new(&SENSOR, AccessLevel::Limited, AccessLevel::Default),
        Resource::new(&ITEM, AccessLevel::Limited, AccessLevel::Default),
        Resource::new(&MAP, AccessLevel::Limited, AccessLevel::Default),
        Resource::new(&USER, AccessLevel::Master, AccessLevel::Master),
    ];

    let mut router = Router::new()
        .route("/event", post(events::register).get(events::list))
        .route("/event_count", get(events::count))
        .route("/search/sensor", post(search::sensors))
        .route("/search/item", post(search::items))
        .route("/search/event", post(search::events))
        .route("/login", post(login::login));

    for resource in resources {
        router = resource.mount(router);
    }

    router.with_state(AppState::new(tracker))
}

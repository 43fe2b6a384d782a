//! CRUD routes shared by sensors, items, maps and users.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tracing::info;

use super::{ApiError, AppState};
use crate::access::AccessLevel;
use crate::mapper::Record;
use crate::schema::EntitySchema;
use crate::Document;

/// One entity exposed at `/{collection}` and `/{collection}/{id}`, where
/// `id` is the business id or the store id.
#[derive(Debug, Clone, Copy)]
pub(super) struct Resource {
    schema: &'static EntitySchema,
    read: AccessLevel,
    write: AccessLevel,
}

type Body = Result<Json<Value>, JsonRejection>;

impl Resource {
    pub(super) fn new(schema: &'static EntitySchema, read: AccessLevel, write: AccessLevel) -> Self {
        Self {
            schema,
            read,
            write,
        }
    }

    pub(super) fn mount(self, router: Router<AppState>) -> Router<AppState> {
        let collection = format!("/{}", self.schema.collection);
        let member = format!("/{}/{{id}}", self.schema.collection);

        router
            .route(
                &collection,
                post(move |State(app): State<AppState>, headers: HeaderMap, body: Body| async move {
                    self.create(app, headers, body).await
                })
                .get(move |State(app): State<AppState>, headers: HeaderMap| async move {
                    self.list(app, headers).await
                }),
            )
            .route(
                &member,
                get(
                    move |State(app): State<AppState>, headers: HeaderMap, Path(id): Path<String>| async move {
                        self.fetch(app, headers, id).await
                    },
                )
                .put(
                    move |State(app): State<AppState>,
                          headers: HeaderMap,
                          Path(id): Path<String>,
                          body: Body| async move { self.update(app, headers, id, body).await },
                )
                .delete(
                    move |State(app): State<AppState>, headers: HeaderMap, Path(id): Path<String>| async move {
                        self.delete(app, headers, id).await
                    },
                ),
            )
    }

    async fn create(
        self,
        app: AppState,
        headers: HeaderMap,
        body: Body,
    ) -> Result<(StatusCode, Json<Value>), ApiError> {
        app.authorize(&headers, self.write).await?;
        let Json(body) = body?;
        let record = app
            .tracker()
            .mapper(self.schema)
            .create(&object(body)?)
            .await?;
        info!(collection = self.schema.collection, id = ?record.id(), "created");
        Ok((StatusCode::CREATED, Json(to_json(record))))
    }

    async fn list(self, app: AppState, headers: HeaderMap) -> Result<Json<Vec<Value>>, ApiError> {
        app.authorize(&headers, self.read).await?;
        let records = app.tracker().mapper(self.schema).list_all().await?;
        Ok(Json(records.into_iter().map(to_json).collect()))
    }

    async fn fetch(self, app: AppState, headers: HeaderMap, id: String) -> Result<Json<Value>, ApiError> {
        app.authorize(&headers, self.read).await?;
        let record = app.tracker().mapper(self.schema).lookup(&id).await?;
        Ok(Json(to_json(record)))
    }

    async fn update(
        self,
        app: AppState,
        headers: HeaderMap,
        id: String,
        body: Body,
    ) -> Result<Json<Value>, ApiError> {
        app.authorize(&headers, self.write).await?;
        let Json(body) = body?;
        let payload = object(body)?;
        let mapper = app.tracker().mapper(self.schema);
        let mut record = mapper.lookup(&id).await?;
        mapper.update(&mut record, &payload).await?;
        Ok(Json(to_json(record)))
    }

    async fn delete(self, app: AppState, headers: HeaderMap, id: String) -> Result<StatusCode, ApiError> {
        app.authorize(&headers, self.write).await?;
        let mapper = app.tracker().mapper(self.schema);
        let mut record = mapper.lookup(&id).await?;
        mapper.soft_delete(&mut record).await?;
        info!(collection = self.schema.collection, %id, "deleted");
        Ok(StatusCode::NO_CONTENT)
    }
}

pub(super) fn object(body: Value) -> Result<Document, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::Validation("request body must be a JSON object".into())),
    }
}

fn to_json(record: Record) -> Value {
    Value::Object(record.into_document())
}

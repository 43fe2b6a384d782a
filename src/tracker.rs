//! The tracker: every use case the HTTP surface exposes, wired over one
//! shared store.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use time::Duration;
use tracing::{debug, info, warn};

use crate::access::AccessLevel;
use crate::clock::{Clock, SystemClock};
use crate::event::{ActivityOf, EventError, EventFilter, Events, NewEvent, OneOrMany};
use crate::identity::{Credentials, IdentityError, IdentityProvider};
use crate::mapper::{not_deleted, Mapper, MapperError, Record};
use crate::query::Filter;
use crate::schema::{EntitySchema, USER};
use crate::store::DocumentStore;
use crate::token::{parse_bearer, AuthError, TokenService};
use crate::Document;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("email does not match the verified identity")]
    EmailMismatch,

    #[error("user {0} is not registered")]
    UnknownUser(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub id_token: String,
    pub access_token: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: Document,
}

/// Event search with optional free-text patterns resolving the sensors and
/// items of interest.
#[derive(Debug, Clone, Default)]
pub struct EventSearch {
    pub sensor_query: Option<String>,
    pub item_query: Option<String>,
    pub filter: EventFilter,
}

#[derive(Debug)]
pub struct Tracker {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    tokens: TokenService,
    identity: Arc<dyn IdentityProvider>,
}

impl Tracker {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            tokens: TokenService::new(store.clone()),
            store,
            clock: Arc::new(SystemClock),
            identity,
        }
    }

    /// Shares `clock` with the token service. The store must be built over
    /// the same clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.tokens = TokenService::new(self.store.clone())
            .with_ttl(self.tokens.ttl())
            .with_clock(clock.clone());
        self.clock = clock;
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.tokens = TokenService::new(self.store.clone())
            .with_ttl(ttl)
            .with_clock(self.clock.clone());
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn mapper(&self, schema: &'static EntitySchema) -> Mapper<'_> {
        Mapper::new(self.store.as_ref(), schema)
    }

    pub fn events(&self) -> Events<'_> {
        Events::new(self.store.as_ref())
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register_event(&self, event: NewEvent) -> Result<Record, EventError> {
        self.events().register(self.clock.as_ref(), event).await
    }

    /// Searches sensors or items, attaching each match's most recent events
    /// under `last_activity`.
    pub async fn search_with_activity(
        &self,
        of: ActivityOf,
        pattern: &str,
        history_limit: u64,
        history_skip: u64,
    ) -> Result<Vec<Document>, MapperError> {
        let mut found = self.mapper(of.schema()).search_raw(pattern).await?;
        let events = self.events();
        for doc in &mut found {
            let history = match doc.get(of.field()) {
                Some(id) => {
                    events
                        .last_activity(of, id, history_limit, history_skip)
                        .await?
                }
                None => Vec::new(),
            };
            doc.insert(
                "last_activity".into(),
                Value::Array(history.into_iter().map(Value::Object).collect()),
            );
        }
        Ok(found)
    }

    /// Filters events and attaches the `sensor` and `item` each refers to.
    ///
    /// A pattern that matches nothing yields no events.
    pub async fn search_events(&self, search: EventSearch) -> Result<Vec<Document>, MapperError> {
        let mut filter = search.filter;

        if let Some(pattern) = search.sensor_query.as_deref() {
            match self.resolve_ids(ActivityOf::Sensor, pattern).await? {
                Some(ids) => filter.sensor_id = Some(ids),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(pattern) = search.item_query.as_deref() {
            match self.resolve_ids(ActivityOf::Item, pattern).await? {
                Some(ids) => filter.item_id = Some(ids),
                None => return Ok(Vec::new()),
            }
        }

        let mut events = self.events().filter(&filter).await?;
        for event in &mut events {
            let sensor = self.referenced(ActivityOf::Sensor, event).await?;
            let item = self.referenced(ActivityOf::Item, event).await?;
            event.insert("sensor".into(), sensor);
            event.insert("item".into(), item);
        }
        Ok(events)
    }

    async fn resolve_ids(
        &self,
        of: ActivityOf,
        pattern: &str,
    ) -> Result<Option<OneOrMany>, MapperError> {
        let ids: Vec<Value> = self
            .mapper(of.schema())
            .search_raw(pattern)
            .await?
            .into_iter()
            .filter_map(|mut doc| doc.remove(of.field()))
            .collect();
        debug!(pattern, matched = ids.len(), "search pattern resolved");
        Ok((!ids.is_empty()).then_some(OneOrMany::Many(ids)))
    }

    async fn referenced(&self, of: ActivityOf, event: &Document) -> Result<Value, MapperError> {
        let Some(id) = event.get(of.field()).filter(|v| !v.is_null()) else {
            return Ok(Value::Null);
        };
        let schema = of.schema();
        let found = self
            .store
            .find_one(
                schema.collection,
                &not_deleted().and(Filter::Eq(of.field().to_string(), id.clone())),
            )
            .await?;
        Ok(found
            .map(|doc| Value::Object(Record::from_document(schema, doc).into_document()))
            .unwrap_or(Value::Null))
    }

    pub async fn event_count(&self) -> Result<u64, MapperError> {
        self.events().mapper().count().await
    }

    /// Exchanges identity-provider credentials for an access token.
    ///
    /// The first caller ever to log in is provisioned as a master user.
    /// After that, only emails with a live user record are accepted.
    pub async fn login(&self, request: LoginRequest) -> Result<Session, LoginError> {
        let identity = self
            .identity
            .verified_identity(Credentials {
                id_token: &request.id_token,
                access_token: &request.access_token,
            })
            .await?;

        if !identity.email.eq_ignore_ascii_case(request.email.trim()) {
            warn!(claimed = %request.email, "login email does not match identity");
            return Err(LoginError::EmailMismatch);
        }

        // Soft-deleted users still count: once anyone has existed, nobody
        // else is provisioned.
        let users = self.mapper(&USER);
        let ever_registered = self
            .store
            .count(USER.collection, &Filter::All)
            .await
            .map_err(MapperError::from)?;
        if ever_registered == 0 {
            let mut payload = Document::new();
            payload.insert(
                "name".into(),
                Value::String(identity.name.clone().unwrap_or_else(|| identity.email.clone())),
            );
            payload.insert("email".into(), Value::String(identity.email.clone()));
            payload.insert("access".into(), AccessLevel::Master.to_json());
            if let Some(picture) = &identity.picture {
                payload.insert("picture".into(), Value::String(picture.clone()));
            }
            users.create(&payload).await?;
            info!(email = %identity.email, "first user provisioned as master");
        }

        let user = match users.lookup(&identity.email).await {
            Ok(user) => user,
            Err(MapperError::NotFound { .. }) => {
                return Err(LoginError::UnknownUser(identity.email));
            }
            Err(e) => return Err(e.into()),
        };

        let user = user.into_document();
        let token = self.tokens.issue(&user).await?;
        info!(email = %identity.email, "user logged in");
        Ok(Session { token, user })
    }

    /// Validates the `Authorization` header for an operation requiring
    /// `required`, returning the caller's user snapshot.
    pub async fn authorize(
        &self,
        header: Option<&str>,
        required: AccessLevel,
    ) -> Result<Document, AuthError> {
        let token = parse_bearer(header)?;
        self.tokens.validate_and_refresh(token, required).await
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use async_trait::async_trait;

    use crate::identity::{Credentials, Identity, IdentityError, IdentityProvider};

    /// Vouches for the email passed as the access token.
    #[derive(Debug, Default)]
    pub(crate) struct EchoIdentity;

    #[async_trait]
    impl IdentityProvider for EchoIdentity {
        async fn verified_identity(
            &self,
            credentials: Credentials<'_>,
        ) -> Result<Identity, IdentityError> {
            if credentials.access_token.is_empty() {
                return Err(IdentityError::Unverified);
            }
            Ok(Identity {
                email: credentials.access_token.to_string(),
                name: None,
                picture: None,
            })
        }
    }
}

//! Opaque bearer tokens with a sliding inactivity window.
//!
//! A token document snapshots the user it was issued to together with the
//! user's access level at issue time. Every successful validation rewrites
//! `last_modified`, which the store's expiry index on that field turns into
//! a sliding TTL.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::access::{grants, AccessLevel};
use crate::clock::{self, Clock, SystemClock};
use crate::mapper::{not_deleted, Mapper, MapperError, Record};
use crate::query::Filter;
use crate::schema::TOKEN;
use crate::store::{DocumentStore, StoreError};
use crate::Document;

/// Inactivity after which a token stops being accepted.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::hours(24);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential supplied")]
    MissingCredential,

    #[error("credential is not a bearer token")]
    MalformedCredential,

    #[error("token is unknown or expired")]
    InvalidToken,

    #[error("access level {held} cannot perform an operation requiring {required}")]
    Forbidden {
        held: AccessLevel,
        required: AccessLevel,
    },

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Extracts the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredential)?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedCredential);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

#[derive(Debug)]
pub struct TokenService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    index_ready: OnceCell<()>,
}

impl TokenService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TOKEN_TTL,
            index_ready: OnceCell::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Must be the same clock the store evaluates expiry with.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper::new(self.store.as_ref(), &TOKEN)
    }

    async fn ensure_index(&self) -> Result<(), AuthError> {
        self.index_ready
            .get_or_try_init(|| async {
                let created = self
                    .store
                    .create_expiry_index(TOKEN.collection, "last_modified", self.ttl)
                    .await?;
                if created {
                    info!(ttl_secs = self.ttl.whole_seconds(), "token expiry index ensured");
                }
                Ok::<_, AuthError>(())
            })
            .await?;
        Ok(())
    }

    /// Issues a fresh token for `user_data`, snapshotting its `access` level.
    pub async fn issue(&self, user_data: &Document) -> Result<String, AuthError> {
        self.ensure_index().await?;

        let token = Uuid::new_v4().to_string();
        let mut payload = Document::new();
        payload.insert("token".into(), Value::String(token.clone()));
        payload.insert("user_data".into(), Value::Object(user_data.clone()));
        payload.insert(
            "access_level".into(),
            user_data.get("access").cloned().unwrap_or(Value::Null),
        );
        payload.insert(
            "last_modified".into(),
            clock::to_document_value(self.clock.now()),
        );

        self.mapper().create(&payload).await?;
        debug!(user = ?user_data.get("email"), "token issued");
        Ok(token)
    }

    /// Accepts `token` for an operation requiring `required`, sliding its
    /// expiry forward. Returns the user snapshot stored with the token.
    ///
    /// The refresh happens before the level check, so a token used for a
    /// forbidden operation is still kept alive.
    pub async fn validate_and_refresh(
        &self,
        token: &str,
        required: AccessLevel,
    ) -> Result<Document, AuthError> {
        // Only the token value is a credential, never the document's `_id`.
        let by_token = not_deleted().and(Filter::eq("token", token));
        let Some(doc) = self.store.find_one(TOKEN.collection, &by_token).await? else {
            return Err(AuthError::InvalidToken);
        };

        let mut record = Record::from_document(&TOKEN, doc);
        record.set("last_modified", clock::to_document_value(self.clock.now()))?;
        self.mapper().save(&record).await?;

        let held = record
            .get("access_level")
            .ok_or(AuthError::InvalidToken)
            .and_then(|v| {
                AccessLevel::from_json(v).map_err(|e| {
                    warn!(error = %e, "token carries an unreadable access level");
                    AuthError::InvalidToken
                })
            })?;

        if !grants(held, required) {
            return Err(AuthError::Forbidden { held, required });
        }

        match record.get("user_data") {
            Some(Value::Object(user)) => Ok(user.clone()),
            _ => Ok(Document::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(parse_bearer(Some("bearer abc")).unwrap(), "abc");
        assert_eq!(parse_bearer(Some("Bearer  abc ")).unwrap(), "abc");
        assert_eq!(parse_bearer(Some("BEARER abc")).unwrap(), "abc");
    }

    #[test]
    fn bad_headers_are_rejected() {
        assert!(matches!(parse_bearer(None), Err(AuthError::MissingCredential)));
        assert!(matches!(
            parse_bearer(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedCredential)
        ));
        assert!(matches!(
            parse_bearer(Some("bearer")),
            Err(AuthError::MalformedCredential)
        ));
        assert!(matches!(
            parse_bearer(Some("bearer   ")),
            Err(AuthError::MalformedCredential)
        ));
    }
}

#[cfg(all(test, feature = "migration"))]
mod store_tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::clock::ManualClock;
    use crate::test_util::{doc, memory_store};
    use crate::ID_FIELD;

    async fn service(ttl: Duration) -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 08:00 UTC)));
        let store = memory_store(clock.clone()).await;
        let service = TokenService::new(Arc::new(store))
            .with_ttl(ttl)
            .with_clock(clock.clone());
        (service, clock)
    }

    fn user(access: Value) -> Document {
        doc(json!({"name": "Ada", "email": "ada@example.com", "access": access}))
    }

    #[tokio::test]
    async fn issued_token_returns_user_snapshot() {
        let (service, _) = service(DEFAULT_TOKEN_TTL).await;
        let token = service.issue(&user(json!(1))).await.unwrap();
        assert!(Uuid::parse_str(&token).is_ok());

        let snapshot = service
            .validate_and_refresh(&token, AccessLevel::Limited)
            .await
            .unwrap();
        assert_eq!(snapshot["email"], json!("ada@example.com"));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let (service, _) = service(DEFAULT_TOKEN_TTL).await;
        let err = service
            .validate_and_refresh("nope", AccessLevel::Limited)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn document_id_is_not_a_credential() {
        let (service, _) = service(DEFAULT_TOKEN_TTL).await;
        let token = service.issue(&user(json!(1))).await.unwrap();
        let stored = service
            .store
            .find_one(TOKEN.collection, &Filter::eq("token", token.clone()))
            .await
            .unwrap()
            .unwrap();
        let store_id = stored[ID_FIELD].as_str().unwrap();
        assert_ne!(store_id, token);

        let err = service
            .validate_and_refresh(store_id, AccessLevel::Limited)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn levels_gate_operations() {
        let (service, _) = service(DEFAULT_TOKEN_TTL).await;
        let limited = service.issue(&user(json!("limited"))).await.unwrap();
        let master = service.issue(&user(json!(-1))).await.unwrap();

        assert!(service
            .validate_and_refresh(&limited, AccessLevel::Limited)
            .await
            .is_ok());
        let err = service
            .validate_and_refresh(&limited, AccessLevel::Default)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Forbidden {
                held: AccessLevel::Limited,
                required: AccessLevel::Default
            }
        ));

        for required in [AccessLevel::Master, AccessLevel::Default, AccessLevel::Limited] {
            assert!(service.validate_and_refresh(&master, required).await.is_ok());
        }
    }

    #[tokio::test]
    async fn use_slides_the_expiry_window() {
        let ttl = Duration::minutes(20);
        let (service, clock) = service(ttl).await;
        let token = service.issue(&user(json!(1))).await.unwrap();

        // each use restarts the window, so the token outlives a single ttl
        for _ in 0..3 {
            clock.advance(ttl - Duration::seconds(1));
            service
                .validate_and_refresh(&token, AccessLevel::Default)
                .await
                .unwrap();

            let stored = service
                .store
                .find_one(TOKEN.collection, &Filter::eq("token", token.clone()))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored["last_modified"], clock::to_document_value(clock.now()));
        }

        clock.advance(ttl + Duration::seconds(1));
        let err = service
            .validate_and_refresh(&token, AccessLevel::Default)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn expired_tokens_are_swept() {
        let ttl = Duration::minutes(20);
        let (service, clock) = service(ttl).await;
        service.issue(&user(json!(1))).await.unwrap();
        service.issue(&user(json!(2))).await.unwrap();

        clock.advance(ttl + Duration::seconds(1));
        assert_eq!(service.store.delete_expired().await.unwrap(), 2);
        assert_eq!(
            service.store.count(TOKEN.collection, &Filter::All).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn issue_requires_an_access_level() {
        let (service, _) = service(DEFAULT_TOKEN_TTL).await;
        let err = service
            .issue(&doc(json!({"email": "nobody@example.com"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Mapper(MapperError::MissingRequiredField(f)) if f == "access_level"
        ));
    }
}

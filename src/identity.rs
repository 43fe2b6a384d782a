//! Verification of login credentials against an external identity provider.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Google's OAuth2 userinfo endpoint.
pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/userinfo/v2/me";

/// Tokens a client obtained from the identity provider.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub id_token: &'a str,
    pub access_token: &'a str,
}

/// What the provider vouches for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("identity provider did not return a verified email")]
    Unverified,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + Debug {
    async fn verified_identity(&self, credentials: Credentials<'_>) -> Result<Identity, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default = "assume_verified")]
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

fn assume_verified() -> bool {
    true
}

/// Resolves the caller through an OAuth2 userinfo endpoint using the
/// access token.
#[derive(Debug, Clone)]
pub struct UserInfoProvider {
    client: reqwest::Client,
    url: String,
}

impl UserInfoProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Default for UserInfoProvider {
    fn default() -> Self {
        Self::new(DEFAULT_USERINFO_URL)
    }
}

#[async_trait]
impl IdentityProvider for UserInfoProvider {
    async fn verified_identity(&self, credentials: Credentials<'_>) -> Result<Identity, IdentityError> {
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(credentials.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected { status, body });
        }

        let info: UserInfo = resp.json().await?;
        identity_from(info)
    }
}

fn identity_from(info: UserInfo) -> Result<Identity, IdentityError> {
    match info.email {
        Some(email) if info.verified_email && !email.is_empty() => {
            debug!(%email, "identity verified");
            Ok(Identity {
                email,
                name: info.name,
                picture: info.picture,
            })
        }
        _ => Err(IdentityError::Unverified),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Result<Identity, IdentityError> {
        identity_from(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn userinfo_with_verified_email_is_accepted() {
        let identity = parse(json!({
            "id": "1234",
            "email": "ada@example.com",
            "verified_email": true,
            "name": "Ada Lovelace",
            "picture": "https://example.com/ada.png"
        }))
        .unwrap();
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn unverified_or_missing_email_is_rejected() {
        assert!(matches!(
            parse(json!({"email": "ada@example.com", "verified_email": false})),
            Err(IdentityError::Unverified)
        ));
        assert!(matches!(
            parse(json!({"name": "Ada"})),
            Err(IdentityError::Unverified)
        ));
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{IdentityError, IdentityProvider, Session};

/// Client for a GoTrue-compatible identity service (e.g. Supabase Auth).
pub struct GoTrueIdentity {
    client: Client,
    base_url: String,
    public_key: String,
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl GoTrueIdentity {
    pub fn new(base_url: &str, public_key: &str) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            public_key: public_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }
}

fn unavailable(err: reqwest::Error) -> IdentityError {
    IdentityError::Unavailable(err.to_string())
}

#[async_trait]
impl IdentityProvider for GoTrueIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let res = self
            .client
            .post(self.url("/token?grant_type=password"))
            .header("apikey", &self.public_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(unavailable)?;

        match res.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                return Err(IdentityError::InvalidCredentials);
            }
            status if !status.is_success() => {
                return Err(IdentityError::Unavailable(format!(
                    "token endpoint returned {status}"
                )));
            }
            _ => {}
        }

        let token: TokenResponse = res.json().await.map_err(unavailable)?;
        Ok(Session {
            access_token: token.access_token,
            expires_in: token.expires_in,
            user_id: token.user.id,
            email: token.user.email,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let res = self
            .client
            .post(self.url("/logout"))
            .header("apikey", &self.public_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(unavailable)?;

        // An already-expired session is as good as signed out.
        match res.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            status => Err(IdentityError::Unavailable(format!(
                "logout endpoint returned {status}"
            ))),
        }
    }
}

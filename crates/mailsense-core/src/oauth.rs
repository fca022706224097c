//! OAuth 2.0 flow for Google authentication

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::OAuthConfig;
use crate::credentials::{Credential, CredentialUpdate};
use crate::error::{Error, Result};
use crate::models::Profile;

/// Required OAuth scopes for Mailsense
pub const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly", // List and read messages
    "https://www.googleapis.com/auth/gmail.send",     // Send emails
    "https://www.googleapis.com/auth/userinfo.email", // Get email address
    "https://www.googleapis.com/auth/userinfo.profile", // Get display name
    "openid",
];

/// Google authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google userinfo endpoint
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Response from Google token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    token_type: String,
    scope: Option<String>,
}

impl TokenResponse {
    fn expires_at(&self) -> i64 {
        chrono::Utc::now().timestamp() + self.expires_in
    }
}

/// OAuth client for the Google authorization-code flow
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// Create a new OAuth client
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Generate the OAuth authorization URL
    pub fn authorization_url(&self, state: &str) -> String {
        let scopes = OAUTH_SCOPES.join(" ");
        format!(
            "{}?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             prompt=consent&\
             state={}",
            AUTH_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for the initial credential
    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {} - {}", status, body);
            return Err(Error::OAuth(format!(
                "Token exchange failed: {} - {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        debug!("Token exchange successful");

        if token_response.refresh_token.is_none() {
            warn!("No refresh token in exchange response; session will not survive expiry");
        }

        let expires_at = token_response.expires_at();
        Ok(Credential {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_at: Some(expires_at),
            scope: token_response.scope,
            token_type: Some(token_response.token_type),
        })
    }

    /// Refresh an access token.
    ///
    /// Returns a partial update for the store to merge: Google normally
    /// omits the refresh token from refresh responses, and that omission
    /// must not clobber the stored one.
    pub async fn refresh(&self, current: &Credential) -> Result<CredentialUpdate> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(Error::AuthenticationRequired)?;

        debug!("Refreshing access token");

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token refresh failed: {} - {}", status, body);
            return Err(Error::TokenRefreshFailed {
                reason: format!("{} - {}", status, body),
            });
        }

        let token_response: TokenResponse = response.json().await?;
        let expires_at = token_response.expires_at();
        info!("Refreshed access token");

        Ok(CredentialUpdate {
            access_token: Some(token_response.access_token),
            refresh_token: token_response.refresh_token,
            expires_at: Some(expires_at),
            scope: token_response.scope,
            token_type: Some(token_response.token_type),
        })
    }

    /// Get the authenticated user's profile from Google
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<Profile> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth(format!(
                "Failed to get user info: {} - {}",
                status, body
            )));
        }

        let profile: Profile = response.json().await?;
        Ok(profile)
    }
}

// URL encoding helper
mod urlencoding {
    pub fn encode(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_carries_offline_access_and_state() {
        let client = OAuthClient::new(OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:5000/auth/google/callback".to_string(),
        });

        let url = client.authorization_url("nonce-123");
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=nonce-123"));
        assert!(url.contains("gmail.readonly"));
    }
}

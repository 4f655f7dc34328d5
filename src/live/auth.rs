use crate::error::{ReportError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

pub const SHEETS_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service-account key file needed to mint tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReportError::Credentials(format!(
                "Service account key not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| ReportError::Credentials(format!("Invalid service account key: {}", e)))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, scopes: &[&str], now: DateTime<Utc>) -> Self {
        Self {
            iss: key.client_email.clone(),
            scope: scopes.join(" "),
            aud: key.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges signed service-account assertions for OAuth access tokens.
pub struct ServiceAccountAuthenticator {
    client: Client,
    key: ServiceAccountKey,
    scopes: Vec<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuthenticator {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            client: Client::new(),
            key,
            scopes: SHEETS_SCOPES.iter().map(|s| s.to_string()).collect(),
            cached: Mutex::new(None),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ServiceAccountKey::from_file(path)?))
    }

    /// Signs the RS256 assertion sent to the token endpoint.
    pub fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let claims = AssertionClaims::new(&self.key, &scopes, now);

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| ReportError::Credentials(format!("Invalid private key: {}", e)))?;

        encode(&header, &claims, &encoding_key)
            .map_err(|e| ReportError::Credentials(format!("Could not sign assertion: {}", e)))
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        debug!(
            "Requesting access token for {} from {}",
            self.key.client_email, self.key.token_uri
        );

        let assertion = self.signed_assertion(now)?;
        let res = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await?;
            return Err(ReportError::Credentials(format!(
                "Token exchange failed (status {}): {}",
                status, error_text
            )));
        }

        let body: TokenResponse = res.json().await?;
        let token = CachedToken {
            access_token: body.access_token,
            expires_at: now + Duration::seconds(body.expires_in),
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }
}

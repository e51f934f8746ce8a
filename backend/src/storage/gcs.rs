//! Dépôt d'objets dans Google Cloud Storage via l'API JSON.
//!
//! L'authentification suit le flux « service account » : un JWT RS256 signé
//! avec la clé privée du fichier d'identifiants est échangé contre un jeton
//! OAuth2, mis en cache jusqu'à une minute avant son expiration.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::debug;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{BlobStore, StoredBlob};

const UPLOAD_ENDPOINT: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const PUBLIC_HOST: &str = "https://storage.googleapis.com";
const TOKEN_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

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
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("identifiants introuvables: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("identifiants invalides: {}", path.display()))
    }
}

#[derive(Debug, Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    TOKEN_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// URL publique d'un objet, au format `storage.googleapis.com/{bucket}/{clé}`.
pub fn public_url(bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", PUBLIC_HOST, bucket, key)
}

pub struct GcsStore {
    bucket: String,
    account: ServiceAccountKey,
    signing_key: EncodingKey,
    upload_endpoint: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GcsStore {
    pub fn new<P: AsRef<Path>>(
        bucket: &str,
        credentials_path: P,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let account = ServiceAccountKey::from_file(credentials_path)?;
        Self::with_account(bucket, account, timeout)
    }

    pub fn with_account(
        bucket: &str,
        account: ServiceAccountKey,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .context("clé privée du compte de service invalide")?;

        // Pas de délai par défaut : un backend lent bloque la requête en cours.
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            bucket: bucket.to_string(),
            account,
            signing_key,
            upload_endpoint: UPLOAD_ENDPOINT.to_string(),
            client: builder.build()?,
            token: Mutex::new(None),
        })
    }

    /// Remplace la base `.../upload/storage/v1/b` (émulateur, tests).
    pub fn with_upload_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.upload_endpoint = endpoint.into();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn signed_grant(&self, now: DateTime<Utc>) -> anyhow::Result<String> {
        let iat = now.timestamp();
        let claims = GrantClaims {
            iss: &self.account.client_email,
            scope: TOKEN_SCOPE,
            aud: &self.account.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.account.private_key_id.clone();
        Ok(jsonwebtoken::encode(&header, &claims, &self.signing_key)?)
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let assertion = self.signed_grant(now)?;
        let response = self
            .client
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("échange du jeton OAuth2")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("jeton OAuth2 refusé ({}): {}", status, body);
        }

        let token: TokenResponse = response.json().await?;
        debug!("Nouveau jeton GCS valable {}s", token.expires_in);
        let fresh = CachedToken {
            value: token.access_token,
            expires_at: now + ChronoDuration::seconds(token.expires_in),
        };
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

#[async_trait]
impl BlobStore for GcsStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<StoredBlob> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/{}/o", self.upload_endpoint, self.bucket))
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("envoi de {} vers gs://{}", key, self.bucket))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("dépôt de {} refusé ({}): {}", key, status, body);
        }

        Ok(StoredBlob {
            key: key.to_string(),
            public_url: public_url(&self.bucket, key),
        })
    }

    fn backend(&self) -> &'static str {
        "gcs"
    }
}

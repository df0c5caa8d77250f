//! Bearer tokens for the worker endpoint.
//!
//! Project endpoints accept short-lived Entra ID tokens. [`TokenCache`]
//! hands out the current token and asks its [`TokenSource`] for a new one
//! once the cached token is within the refresh margin of its expiry, or
//! after the endpoint rejected it.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::errors::WorkerError;
use crate::infrastructure::logging::redact_token;

/// A bearer token and the instant it stops being accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_on,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &redact_token(&self.secret))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Where fresh tokens come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<AccessToken, WorkerError>;
}

/// A configured key that never expires.
pub struct StaticToken {
    secret: String,
}

impl StaticToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    fn name(&self) -> &'static str {
        "api_key"
    }

    async fn fetch(&self) -> Result<AccessToken, WorkerError> {
        Ok(AccessToken::new(self.secret.clone(), DateTime::<Utc>::MAX_UTC))
    }
}

/// Tokens from `az account get-access-token` for the signed-in identity.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
    resource: String,
}

impl AzureCliCredential {
    pub fn new(program: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            resource: resource.into(),
        }
    }
}

#[async_trait]
impl TokenSource for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure_cli"
    }

    async fn fetch(&self) -> Result<AccessToken, WorkerError> {
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--resource"])
            .arg(&self.resource)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| WorkerError::Auth(format!("failed to run `{}`: {e}", self.program)))?;

        if !output.status.success() {
            return Err(WorkerError::Auth(format!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_cli_token(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Unix seconds; newer CLI versions only.
    #[serde(default, rename = "expires_on")]
    expires_on_unix: Option<i64>,
    /// Local wall-clock time, e.g. `2025-05-01 13:45:10.000000`.
    #[serde(default)]
    expires_on: Option<String>,
}

fn parse_cli_token(stdout: &str) -> Result<AccessToken, WorkerError> {
    let token: CliToken = serde_json::from_str(stdout)
        .map_err(|e| WorkerError::Auth(format!("unreadable CLI token output: {e}")))?;

    let expires_on = token
        .expires_on_unix
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| {
            let local = token.expires_on.as_deref()?;
            let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f").ok()?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
        })
        .ok_or_else(|| WorkerError::Auth("CLI token output has no expiry".to_string()))?;

    Ok(AccessToken::new(token.access_token, expires_on))
}

/// Caches the current token of a [`TokenSource`].
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    refresh_margin: TimeDelta,
    current: Mutex<Option<AccessToken>>,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("source", &self.source.name())
            .field("refresh_margin", &self.refresh_margin)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>, refresh_margin_secs: u32) -> Self {
        Self {
            source,
            refresh_margin: TimeDelta::seconds(i64::from(refresh_margin_secs)),
            current: Mutex::new(None),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// The token to send now, fetching a new one when the cached token is
    /// missing or about to expire.
    pub async fn bearer(&self) -> Result<String, WorkerError> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|t| !self.is_stale(t)) {
            return Ok(token.secret.clone());
        }

        let token = self.source.fetch().await?;
        debug!(
            source = self.source.name(),
            expires_on = %token.expires_on,
            "access token acquired"
        );
        let secret = token.secret.clone();
        *current = Some(token);
        Ok(secret)
    }

    /// Drop the cached token; the next request fetches a new one.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    fn is_stale(&self, token: &AccessToken) -> bool {
        Utc::now() + self.refresh_margin >= token.expires_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        lifetime: TimeDelta,
        fetches: AtomicU32,
    }

    #[async_trait]
    impl TokenSource for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self) -> Result<AccessToken, WorkerError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(format!("tok-{n}"), Utc::now() + self.lifetime))
        }
    }

    fn cache(lifetime: TimeDelta) -> (Arc<Counting>, TokenCache) {
        let source = Arc::new(Counting {
            lifetime,
            fetches: AtomicU32::new(0),
        });
        let cache = TokenCache::new(Arc::clone(&source) as Arc<dyn TokenSource>, 300);
        (source, cache)
    }

    #[tokio::test]
    async fn fresh_token_is_reused() {
        let (source, cache) = cache(TimeDelta::hours(1));
        assert_eq!(cache.bearer().await.unwrap(), "tok-1");
        assert_eq!(cache.bearer().await.unwrap(), "tok-1");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_inside_refresh_margin_is_replaced() {
        let (source, cache) = cache(TimeDelta::seconds(60));
        assert_eq!(cache.bearer().await.unwrap(), "tok-1");
        assert_eq!(cache.bearer().await.unwrap(), "tok-2");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fetch() {
        let (_, cache) = cache(TimeDelta::hours(1));
        cache.bearer().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.bearer().await.unwrap(), "tok-2");
    }

    #[tokio::test]
    async fn static_token_never_goes_stale() {
        let cache = TokenCache::new(Arc::new(StaticToken::new("key")), u32::MAX);
        assert_eq!(cache.bearer().await.unwrap(), "key");
        assert_eq!(cache.source_name(), "api_key");
    }

    #[test]
    fn cli_output_with_unix_expiry() {
        let output = serde_json::json!({
            "accessToken": "eyJ0eXAi",
            "expiresOn": "2030-01-01 00:00:00.000000",
            "expires_on": 1_893_456_000,
            "tokenType": "Bearer",
        });
        let token = parse_cli_token(&output.to_string()).unwrap();
        assert_eq!(token.secret, "eyJ0eXAi");
        assert_eq!(token.expires_on.timestamp(), 1_893_456_000);
    }

    #[test]
    fn cli_output_with_local_expiry_only() {
        let token =
            parse_cli_token(r#"{"accessToken":"abc","expiresOn":"2030-06-01 12:30:00.000000"}"#)
                .unwrap();
        assert!(token.expires_on > Utc::now());
    }

    #[test]
    fn cli_output_without_expiry_is_rejected() {
        let err = parse_cli_token(r#"{"accessToken":"abc"}"#).unwrap_err();
        assert!(matches!(err, WorkerError::Auth(_)));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let token = AccessToken::new("eyJ0eXAiOiJKV1QiLCJhbGciOi", Utc::now());
        assert!(!format!("{token:?}").contains("KV1Q"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn azure_cli_credential_reads_token_from_the_cli() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("az");
        std::fs::write(
            &script,
            concat!(
                "#!/bin/sh\n",
                "[ \"$1\" = account ] || exit 3\n",
                "echo '{\"accessToken\":\"cli-token\",\"expires_on\":4102444800}'\n",
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let credential = AzureCliCredential::new(script.to_string_lossy(), "https://ai.azure.com");
        let token = credential.fetch().await.unwrap();

        assert_eq!(token.secret, "cli-token");
        assert_eq!(token.expires_on.timestamp(), 4_102_444_800);
    }

    #[tokio::test]
    async fn missing_cli_is_an_auth_error() {
        let credential = AzureCliCredential::new("/definitely/not/az", "https://ai.azure.com");
        assert!(matches!(credential.fetch().await, Err(WorkerError::Auth(_))));
    }
}

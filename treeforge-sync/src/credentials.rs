//! Bearer credentials for the hosting API.
//!
//! [`CachedCredentials`] keeps one token and refreshes it shortly before it
//! expires. The cache lock is held across the refresh, so concurrent callers
//! wait for one fetch instead of each starting their own.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::error::AuthError;

/// Tokens within this window of expiry are refreshed.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    /// `None` for tokens that do not expire (personal access tokens).
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Token {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn expiring(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Token {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Whether the token is unusable at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies a currently valid token.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Result<Token, AuthError>;
}

/// Produces a fresh token on demand.
pub trait TokenSource: Send + Sync {
    fn fetch(&self) -> Result<Token, AuthError>;
}

/// Reads a non-expiring token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvTokenSource {
    var: String,
}

impl EnvTokenSource {
    pub fn new(var: impl Into<String>) -> Self {
        EnvTokenSource { var: var.into() }
    }
}

impl TokenSource for EnvTokenSource {
    fn fetch(&self) -> Result<Token, AuthError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(Token::new(value.trim())),
            _ => Err(AuthError::MissingToken(self.var.clone())),
        }
    }
}

/// Caching [`CredentialProvider`] over any [`TokenSource`].
pub struct CachedCredentials<S> {
    source: S,
    cached: Mutex<Option<Token>>,
}

impl<S: TokenSource> CachedCredentials<S> {
    pub fn new(source: S) -> Self {
        CachedCredentials {
            source,
            cached: Mutex::new(None),
        }
    }
}

impl<S: TokenSource> CredentialProvider for CachedCredentials<S> {
    fn token(&self) -> Result<Token, AuthError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| AuthError::Source("credential cache lock poisoned".to_string()))?;

        let horizon = Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS);
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(horizon) {
                return Ok(token.clone());
            }
        }

        tracing::debug!("refreshing hosting credential");
        let fresh = self.source.fetch()?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct Counting {
        fetches: AtomicUsize,
        lifetime: Duration,
    }

    impl TokenSource for Counting {
        fn fetch(&self) -> Result<Token, AuthError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            Ok(Token::expiring(format!("t{n}"), Utc::now() + self.lifetime))
        }
    }

    fn counting(lifetime: Duration) -> Counting {
        Counting {
            fetches: AtomicUsize::new(0),
            lifetime,
        }
    }

    #[test]
    fn valid_token_is_reused() {
        let creds = CachedCredentials::new(counting(Duration::hours(1)));
        assert_eq!(creds.token().expect("token").value, "t0");
        assert_eq!(creds.token().expect("token").value, "t0");
        assert_eq!(creds.source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn near_expiry_token_is_refreshed() {
        let creds = CachedCredentials::new(counting(Duration::seconds(30)));
        creds.token().expect("token");
        assert_eq!(creds.token().expect("token").value, "t1");
    }

    #[test]
    fn concurrent_callers_share_one_refresh() {
        let creds = Arc::new(CachedCredentials::new(counting(Duration::hours(1))));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let creds = Arc::clone(&creds);
                std::thread::spawn(move || creds.token().expect("token").value)
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("join"), "t0");
        }
        assert_eq!(creds.source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_env_var_is_auth_error() {
        let source = EnvTokenSource::new("TREEFORGE_TEST_TOKEN_THAT_IS_NEVER_SET");
        assert_eq!(
            source.fetch().unwrap_err(),
            AuthError::MissingToken("TREEFORGE_TEST_TOKEN_THAT_IS_NEVER_SET".to_string())
        );
    }

    #[test]
    fn debug_redacts_value() {
        let shown = format!("{:?}", Token::new("secret-value"));
        assert!(!shown.contains("secret-value"));
    }
}

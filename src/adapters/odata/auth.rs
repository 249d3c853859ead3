//! Shared bearer-token cache
//!
//! All concurrent fetches read the same token. Refreshing happens under a
//! single async mutex; the generation counter lets a caller that saw a stale
//! token detect that somebody else already replaced it, so a burst of 401s
//! results in one token request.

use crate::domain::FetchError;
use std::future::Future;
use tokio::sync::Mutex;

/// A token together with the generation it was issued in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<String>,
    generation: u64,
}

/// Bearer token shared by every request of one client
#[derive(Debug, Default)]
pub struct TokenCache {
    state: Mutex<TokenState>,
}

impl TokenCache {
    /// Creates an empty cache; the first caller issues a token
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache seeded with an existing token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(TokenState {
                token: Some(token.into()),
                generation: 0,
            }),
        }
    }

    /// Returns the cached token, issuing one first if the cache is empty
    ///
    /// # Errors
    ///
    /// Propagates the error of `issue`
    pub async fn current<F, Fut>(&self, issue: F) -> Result<AccessToken, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FetchError>>,
    {
        let mut state = self.state.lock().await;
        if let Some(token) = &state.token {
            return Ok(AccessToken {
                value: token.clone(),
                generation: state.generation,
            });
        }

        let token = issue().await?;
        state.generation += 1;
        state.token = Some(token.clone());
        Ok(AccessToken {
            value: token,
            generation: state.generation,
        })
    }

    /// Replaces the token of generation `stale`
    ///
    /// If the cache has already moved past `stale`, the newer token is
    /// returned without calling `issue`.
    ///
    /// # Errors
    ///
    /// Propagates the error of `issue`; the cache is left empty in that case
    pub async fn refresh<F, Fut>(&self, stale: u64, issue: F) -> Result<AccessToken, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FetchError>>,
    {
        let mut state = self.state.lock().await;
        if state.generation != stale {
            if let Some(token) = &state.token {
                return Ok(AccessToken {
                    value: token.clone(),
                    generation: state.generation,
                });
            }
        }

        state.token = None;
        let token = issue().await?;
        state.generation += 1;
        state.token = Some(token.clone());

        tracing::debug!(generation = state.generation, "Access token refreshed");

        Ok(AccessToken {
            value: token,
            generation: state.generation,
        })
    }

    /// Number of tokens issued so far
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_current_issues_once() {
        let cache = TokenCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let token = cache
                .current(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("t1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(token.value, "t1");
            assert_eq!(token.generation, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_seeded_token_is_generation_zero() {
        let cache = TokenCache::with_token("seed");
        let token = cache
            .current(|| async { Err(FetchError::Auth("unused".to_string())) })
            .await
            .unwrap();
        assert_eq!(token, AccessToken { value: "seed".to_string(), generation: 0 });
    }

    #[tokio::test]
    async fn test_concurrent_refresh_of_same_generation_issues_once() {
        let cache = Arc::new(TokenCache::with_token("expired"));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .refresh(0, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok("fresh".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.value, "fresh");
            assert_eq!(token.generation, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.generation().await, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_token() {
        let cache = TokenCache::with_token("expired");
        let err = cache
            .refresh(0, || async { Err(FetchError::Auth("bad password".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));

        let token = cache
            .current(|| async { Ok("second".to_string()) })
            .await
            .unwrap();
        assert_eq!(token.value, "second");
    }
}

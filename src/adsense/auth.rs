use crate::adsense::callback::CallbackListener;
use crate::adsense::token::{OAuthToken, TokenStore};
use crate::config::ClientCredentials;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, StandardRevocableToken,
    TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use tracing::{debug, info, instrument, warn};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUTH_SCOPE: &str = "https://www.googleapis.com/auth/adsense.readonly";

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Ways of obtaining a token from the provider.
#[async_trait]
pub(super) trait Authorizer {
    /// Run the interactive authorization-code flow.
    async fn authorize(&self) -> Result<OAuthToken>;

    async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken>;
}

pub(super) struct GoogleAuth {
    client: ConfiguredClient,
    http_client: reqwest::Client,
}

impl GoogleAuth {
    pub(super) fn new(credentials: &ClientCredentials) -> Result<Self> {
        let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
            .map_err(|e| AppError::Auth(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url);

        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
        })
    }

    pub(super) fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }
}

#[async_trait]
impl Authorizer for GoogleAuth {
    async fn authorize(&self) -> Result<OAuthToken> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let csrf_token = CsrfToken::new_random();

        // The redirect URI points at this run's listener, so the client is
        // completed per authorization.
        let listener = CallbackListener::start(csrf_token.secret().clone())?;
        let redirect_url = RedirectUrl::new(listener.redirect_url().to_string())
            .map_err(|e| AppError::Auth(format!("Invalid redirect URL: {}", e)))?;
        let client = self.client.clone().set_redirect_uri(redirect_url);

        let (auth_url, _) = client
            .authorize_url(move || csrf_token)
            .add_scope(Scope::new(AUTH_SCOPE.to_string()))
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        eprintln!("Visit this URL to authorize:\n{}", auth_url);
        eprintln!();
        if let Err(e) = open::that_detached(auth_url.as_str()) {
            warn!("Failed to open browser: {}", e);
        }

        info!("Waiting for authorization...");
        let code = listener.wait_for_code().await?;
        debug!("Authorization code received");

        let token_result = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to exchange code: {:?}", e)))?;

        parse_token(token_result, None)
    }

    async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(token.refresh_token.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {:?}", e)))?;

        parse_token(token_result, Some(&token.refresh_token))
    }
}

/// Convert a token response into an [`OAuthToken`].
///
/// Refresh responses usually omit the refresh token, in which case
/// `fallback_refresh_token` is kept.
fn parse_token(
    token_result: BasicTokenResponse,
    fallback_refresh_token: Option<&str>,
) -> Result<OAuthToken> {
    let access_token = token_result.access_token().secret().clone();

    let refresh_token = match token_result.refresh_token() {
        Some(token) => token.secret().clone(),
        None => match fallback_refresh_token {
            Some(fallback) => fallback.to_string(),
            None => return Err(AppError::Auth("No refresh token received".to_string())),
        },
    };

    let expires_in = token_result
        .expires_in()
        .map(|d| d.as_secs() as i64)
        .unwrap_or(3600); // Default to 1 hour if not provided

    Ok(OAuthToken {
        access_token,
        refresh_token,
        expiry: Utc::now() + Duration::seconds(expires_in),
    })
}

/// Get a usable token, from the cache when possible.
///
/// `force_auth` discards the cache first. Otherwise a cached token is used
/// as is while it is fresh, refreshed once it has expired, and the
/// interactive flow runs only when neither works. New tokens are saved to
/// `store`; nothing is written when obtaining one fails.
#[instrument(name = "Authenticating to AdSense", skip(auth, store))]
pub(super) async fn get_valid_token<A>(
    auth: &A,
    store: &TokenStore,
    force_auth: bool,
) -> Result<OAuthToken>
where
    A: Authorizer + Sync,
{
    let cached = match force_auth {
        true => {
            store.clear()?;
            None
        }
        false => store.load(),
    };

    let token = match cached {
        None => {
            debug!("No usable cached token, starting authorization");
            auth.authorize().await?
        }
        Some(token) if !token.is_expired() => {
            debug!("Using cached token");
            return Ok(token);
        }
        Some(token) => {
            debug!("Access token expired, refreshing...");
            match auth.refresh(&token).await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    debug!("Token refresh failed ({}), re-authorizing...", e);
                    auth.authorize().await?
                }
            }
        }
    };

    store.save(&token)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adsense::token::test_helpers::mock_token;
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields};
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Default, Clone)]
    struct MockAuthorizer {
        fail_authorize: bool,
        fail_refresh: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MockAuthorizer {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Authorizer for MockAuthorizer {
        async fn authorize(&self) -> Result<OAuthToken> {
            self.calls.lock().unwrap().push("authorize");
            if self.fail_authorize {
                return Err(AppError::Auth("Failed to exchange code: invalid_grant".to_string()));
            }
            Ok(OAuthToken {
                access_token: "fresh".to_string(),
                ..mock_token(Duration::hours(1))
            })
        }

        async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken> {
            self.calls.lock().unwrap().push("refresh");
            if self.fail_refresh {
                return Err(AppError::Auth("Failed to refresh token".to_string()));
            }
            Ok(OAuthToken {
                access_token: "refreshed".to_string(),
                expiry: Utc::now() + Duration::hours(1),
                ..token.clone()
            })
        }
    }

    fn token_response(refresh_token: Option<&str>, expires_in: Option<u64>) -> BasicTokenResponse {
        let mut response = BasicTokenResponse::new(
            AccessToken::new("ya29.new".to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        response.set_refresh_token(refresh_token.map(|t| RefreshToken::new(t.to_string())));
        response.set_expires_in(expires_in.map(std::time::Duration::from_secs).as_ref());
        response
    }

    #[test]
    fn test_parse_token() {
        let token = parse_token(token_response(Some("1//new"), Some(600)), None).unwrap();

        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(token.refresh_token, "1//new");
        let remaining = token.expiry - Utc::now();
        assert!(remaining > Duration::seconds(590) && remaining <= Duration::seconds(600));
    }

    #[test]
    fn test_parse_token_keeps_previous_refresh_token() {
        let token = parse_token(token_response(None, None), Some("1//old")).unwrap();

        assert_eq!(token.refresh_token, "1//old");
        assert!(!token.is_expired(), "defaults to one hour");
    }

    #[test]
    fn test_parse_token_requires_refresh_token() {
        let err = parse_token(token_response(None, Some(3600)), None).unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
    }

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("auth_cache.json"))
    }

    #[tokio::test]
    async fn test_valid_cached_token_skips_authorization() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let cached = mock_token(Duration::hours(1));
        store.save(&cached).unwrap();
        let auth = MockAuthorizer::default();

        let token = get_valid_token(&auth, &store, false).await.unwrap();

        assert_eq!(token, cached);
        assert!(auth.calls().is_empty(), "no flow should run for a valid token");
    }

    #[tokio::test]
    async fn test_force_auth_ignores_cache() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&mock_token(Duration::hours(1))).unwrap();
        let auth = MockAuthorizer::default();

        let token = get_valid_token(&auth, &store, true).await.unwrap();

        assert_eq!(token.access_token, "fresh");
        assert_eq!(auth.calls(), vec!["authorize"]);
        assert_eq!(store.load().unwrap().access_token, "fresh");
    }

    #[tokio::test]
    async fn test_failed_forced_authorization_leaves_no_cache() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&mock_token(Duration::hours(1))).unwrap();
        let auth = MockAuthorizer {
            fail_authorize: true,
            ..Default::default()
        };

        assert!(get_valid_token(&auth, &store, true).await.is_err());
        assert_eq!(store.load(), None);
    }

    #[tokio::test]
    async fn test_unreadable_cache_routes_to_authorization() {
        for contents in [None, Some("{\"access_tok"), Some("[1, 2, 3]")] {
            let dir = tempdir().unwrap();
            let store = store_in(&dir);
            if let Some(contents) = contents {
                fs::write(dir.path().join("auth_cache.json"), contents).unwrap();
            }
            let auth = MockAuthorizer::default();

            let token = get_valid_token(&auth, &store, false).await.unwrap();

            assert_eq!(token.access_token, "fresh");
            assert_eq!(auth.calls(), vec!["authorize"]);
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let expired = mock_token(Duration::hours(-1));
        store.save(&expired).unwrap();
        let auth = MockAuthorizer::default();

        let token = get_valid_token(&auth, &store, false).await.unwrap();

        assert_eq!(token.access_token, "refreshed");
        assert_eq!(token.refresh_token, expired.refresh_token);
        assert_eq!(auth.calls(), vec!["refresh"]);
        assert_eq!(store.load(), Some(token));
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_authorization() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&mock_token(Duration::hours(-1))).unwrap();
        let auth = MockAuthorizer {
            fail_refresh: true,
            ..Default::default()
        };

        let token = get_valid_token(&auth, &store, false).await.unwrap();

        assert_eq!(token.access_token, "fresh");
        assert_eq!(auth.calls(), vec!["refresh", "authorize"]);
    }

    #[tokio::test]
    async fn test_exchange_failure_writes_no_cache() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let auth = MockAuthorizer {
            fail_authorize: true,
            ..Default::default()
        };

        let err = get_valid_token(&auth, &store, true).await.unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
        assert!(!dir.path().join("auth_cache.json").exists());
    }
}

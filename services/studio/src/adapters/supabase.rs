//! services/studio/src/adapters/supabase.rs
//!
//! The shared HTTP client for the hosted backend and its auth (GoTrue)
//! adapter. The client keeps the current session, attaches the `apikey` and
//! bearer headers to every request, refreshes an expired access token, and
//! publishes session changes to subscribers.
//!
//! The table and storage adapters sit on top of the same client so they act
//! as the signed-in user.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use sonicwave_core::domain::{AuthEvent, AuthEventKind, AuthSession, Identity};
use sonicwave_core::ports::{AuthEventStream, AuthService, PortError, PortResult};

//=========================================================================================
// Errors
//=========================================================================================

/// Errors from the hosted backend's HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl SupabaseError {
    /// Maps the backend's error codes onto the port taxonomy.
    pub fn into_port(self) -> PortError {
        match self {
            SupabaseError::Request(e) => PortError::Unexpected(e.to_string()),
            SupabaseError::Api {
                status,
                code,
                message,
            } => match (status, code.as_deref()) {
                (_, Some("PGRST116")) => PortError::NotFound(message),
                (_, Some("23505" | "user_already_exists" | "email_exists")) => {
                    PortError::Conflict(message)
                }
                (_, Some("42501" | "invalid_grant" | "invalid_credentials")) | (401 | 403, _) => {
                    PortError::Unauthorized(message)
                }
                _ => PortError::Unexpected(message),
            },
        }
    }
}

/// The union of the error bodies GoTrue, PostgREST, and Storage send back.
#[derive(Deserialize, Default)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    error_code: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(code)) => Some(code.clone()),
            _ => self.error_code.clone().or_else(|| self.error.clone()),
        }
    }

    fn message(self, fallback: String) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or(fallback)
    }
}

/// Ensures the response has a success status code, turning the error body
/// into a [`SupabaseError::Api`] otherwise.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    Err(SupabaseError::Api {
        status: status.as_u16(),
        code: body.code(),
        message: body.message(text),
    })
}

//=========================================================================================
// Wire records
//=========================================================================================

#[derive(Deserialize)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> Identity {
        Identity {
            id: self.id,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    expires_at: Option<i64>,
    user: UserRecord,
}

impl TokenResponse {
    fn to_domain(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            identity: self.user.to_domain(),
        }
    }
}

/// Sign-up answers with a session when confirmation is off, and with the bare
/// user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserRecord),
}

//=========================================================================================
// The Shared Client
//=========================================================================================

struct Inner {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

/// HTTP client for one hosted-backend project.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<Inner>,
}

impl SupabaseClient {
    /// Creates a client reusing an existing [`reqwest::Client`].
    pub fn new(http: reqwest::Client, base_url: &Url, anon_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.as_str().trim_end_matches('/').to_string(),
                anon_key: anon_key.into(),
                session: RwLock::new(None),
                events,
            }),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// A request carrying the project key and the caller's bearer token. The
    /// anon key stands in for the token while signed out.
    pub async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = match self.current_session().await {
            Some(session) => session.access_token,
            None => self.inner.anon_key.clone(),
        };
        self.inner
            .http
            .request(method, self.url(path))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(bearer)
    }

    fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, self.url(path))
            .header("apikey", &self.inner.anon_key)
    }

    fn publish(&self, kind: AuthEventKind, session: Option<AuthSession>) {
        // No subscribers is fine.
        let _ = self.inner.events.send(AuthEvent { kind, session });
    }

    async fn store(&self, kind: AuthEventKind, session: Option<AuthSession>) {
        *self.inner.session.write().await = session.clone();
        self.publish(kind, session);
    }

    /// The stored session, refreshed first when its access token expired.
    ///
    /// Refreshes run under the write lock, so concurrent callers wait for the
    /// first one and then see the session it stored.
    async fn current_session(&self) -> Option<AuthSession> {
        {
            let slot = self.inner.session.read().await;
            let session = slot.as_ref()?;
            if !session.is_expired(Utc::now()) {
                return Some(session.clone());
            }
        }

        let mut slot = self.inner.session.write().await;
        let session = slot.clone()?;
        if !session.is_expired(Utc::now()) {
            return Some(session);
        }

        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                info!("Refreshed the access token for {}", refreshed.identity.id);
                *slot = Some(refreshed.clone());
                drop(slot);
                self.publish(AuthEventKind::TokenRefreshed, Some(refreshed.clone()));
                Some(refreshed)
            }
            Err(e) => {
                warn!("Failed to refresh the session, signing out: {}", e);
                *slot = None;
                drop(slot);
                self.publish(AuthEventKind::SignedOut, None);
                None
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, SupabaseError> {
        let response = self
            .anonymous(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = ensure_success(response).await?.json().await?;
        Ok(token.to_domain())
    }
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for SupabaseClient {
    async fn get_session(&self) -> PortResult<Option<AuthSession>> {
        Ok(self.current_session().await)
    }

    fn subscribe(&self) -> AuthEventStream {
        let mut rx = self.inner.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Session feed lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<Identity>> {
        let response = self
            .anonymous(Method::POST, "/auth/v1/signup")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_port())?;
        let response = ensure_success(response)
            .await
            .map_err(SupabaseError::into_port)?;
        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        match body {
            SignUpResponse::Session(token) => {
                let session = token.to_domain();
                let identity = session.identity.clone();
                self.store(AuthEventKind::SignedIn, Some(session)).await;
                Ok(Some(identity))
            }
            SignUpResponse::User(user) => Ok(Some(user.to_domain())),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let response = self
            .anonymous(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_port())?;
        let token: TokenResponse = ensure_success(response)
            .await
            .map_err(SupabaseError::into_port)?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let session = token.to_domain();
        self.store(AuthEventKind::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> PortResult<()> {
        let Some(session) = self.inner.session.read().await.clone() else {
            return Ok(());
        };
        // The local session goes away even if the backend call fails.
        self.store(AuthEventKind::SignedOut, None).await;

        let response = self
            .anonymous(Method::POST, "/auth/v1/logout")
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_port())?;
        ensure_success(response)
            .await
            .map_err(SupabaseError::into_port)?;
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str) -> PortResult<()> {
        let response = self
            .anonymous(Method::POST, "/auth/v1/recover")
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(|e| SupabaseError::from(e).into_port())?;
        ensure_success(response)
            .await
            .map_err(SupabaseError::into_port)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mockito::{Matcher, Server};

    const USER_ID: &str = "6f1c2a3b-0000-4000-8000-00000000a11c";

    fn token_body(access_token: &str, expires_in: i64) -> String {
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": expires_in,
            "refresh_token": "refresh-1",
            "user": {
                "id": USER_ID,
                "email": "ada@example.com",
                "created_at": "2024-03-01T10:00:00Z"
            }
        })
        .to_string()
    }

    fn client(server: &Server) -> SupabaseClient {
        let url = Url::parse(&server.url()).unwrap();
        SupabaseClient::new(reqwest::Client::new(), &url, "anon-key")
    }

    #[test]
    fn error_codes_map_onto_the_port_taxonomy() {
        let api = |status: u16, code: Option<&str>| SupabaseError::Api {
            status,
            code: code.map(str::to_string),
            message: "m".to_string(),
        };
        assert_eq!(api(406, Some("PGRST116")).into_port(), PortError::NotFound("m".into()));
        assert_eq!(api(409, Some("23505")).into_port(), PortError::Conflict("m".into()));
        assert_eq!(api(403, Some("42501")).into_port(), PortError::Unauthorized("m".into()));
        assert_eq!(api(401, None).into_port(), PortError::Unauthorized("m".into()));
        assert_eq!(
            api(400, Some("invalid_grant")).into_port(),
            PortError::Unauthorized("m".into())
        );
        assert_eq!(api(500, Some("XX000")).into_port(), PortError::Unexpected("m".into()));
    }

    #[tokio::test]
    async fn sign_in_stores_the_session_and_notifies_subscribers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .match_header("apikey", "anon-key")
            .match_body(Matcher::PartialJson(json!({ "email": "ada@example.com" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("access-1", 3600))
            .create_async()
            .await;

        let client = client(&server);
        let mut events = client.subscribe();
        let session = client
            .sign_in_with_password("ada@example.com", "analytical")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.access_token, "access-1");
        assert_eq!(session.identity.id.to_string(), USER_ID);
        assert_eq!(client.get_session().await.unwrap(), Some(session.clone()));

        let event = events.next().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedIn);
        assert_eq!(event.session, Some(session));
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .sign_in_with_password("ada@example.com", "nope")
            .await
            .unwrap_err();
        assert_eq!(err, PortError::Unauthorized("Invalid login credentials".into()));
    }

    #[tokio::test]
    async fn sign_up_without_confirmation_returns_the_user() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/v1/signup")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "id": USER_ID, "email": "ada@example.com", "created_at": "2024-03-01T10:00:00Z" })
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client(&server);
        let identity = client
            .sign_up("ada@example.com", "analytical")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.id.to_string(), USER_ID);
        // Confirmation pending: no session yet.
        assert_eq!(client.get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_before_use() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("stale", -60))
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .match_body(Matcher::Json(json!({ "refresh_token": "refresh-1" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("fresh", 3600))
            .expect(1)
            .create_async()
            .await;

        let client = client(&server);
        client
            .sign_in_with_password("ada@example.com", "analytical")
            .await
            .unwrap();
        let session = client.get_session().await.unwrap().unwrap();

        refresh.assert_async().await;
        assert_eq!(session.access_token, "fresh");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("stale", -60))
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("fresh", 3600))
            .expect(1)
            .create_async()
            .await;

        let client = client(&server);
        client
            .sign_in_with_password("ada@example.com", "analytical")
            .await
            .unwrap();
        let mut events = client.subscribe();

        let (first, second, third) = tokio::join!(
            client.get_session(),
            client.get_session(),
            client.get_session()
        );

        refresh.assert_async().await;
        for session in [first, second, third] {
            assert_eq!(session.unwrap().unwrap().access_token, "fresh");
        }
        let event = events.next().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::TokenRefreshed);
        assert_eq!(client.get_session().await.unwrap().unwrap().access_token, "fresh");
    }

    #[tokio::test]
    async fn failed_refresh_signs_out() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("stale", -60))
            .create_async()
            .await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#)
            .create_async()
            .await;

        let client = client(&server);
        client
            .sign_in_with_password("ada@example.com", "analytical")
            .await
            .unwrap();
        let mut events = client.subscribe();

        assert_eq!(client.get_session().await.unwrap(), None);
        let event = events.next().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedOut);
    }

    #[tokio::test]
    async fn sign_out_forgets_the_session_even_when_the_call_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("access-1", 3600))
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/v1/logout")
            .match_header("authorization", "Bearer access-1")
            .with_status(500)
            .create_async()
            .await;

        let client = client(&server);
        client
            .sign_in_with_password("ada@example.com", "analytical")
            .await
            .unwrap();

        assert!(client.sign_out().await.is_err());
        logout.assert_async().await;
        assert_eq!(client.get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reset_goes_to_the_recover_endpoint() {
        let mut server = Server::new_async().await;
        let recover = server
            .mock("POST", "/auth/v1/recover")
            .match_body(Matcher::Json(json!({ "email": "ada@example.com" })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client(&server)
            .reset_password_for_email("ada@example.com")
            .await
            .unwrap();
        recover.assert_async().await;
    }
}

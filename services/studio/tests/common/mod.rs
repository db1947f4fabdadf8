use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use sonicwave_core::testing::{FakeSpeech, InMemoryBackend};
use studio_lib::web::{router, AppState};

/// Build the application router over the in-memory backend.
///
/// The same backend serves as auth provider, database, and audio storage, so
/// tests can seed and inspect it directly. The returned state shares the
/// session bootstrap with the router.
pub fn build_test_app(backend: &InMemoryBackend, speech: &FakeSpeech) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        Arc::new(speech.clone()),
    ));
    (router(state.clone()), state)
}

/// Wait until the session bootstrap has finished its initial lookup.
pub async fn settled(state: &AppState) {
    let mut context = state.context.clone();
    context
        .wait_until_loaded()
        .await
        .expect("bootstrap should still be running");
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json(app: Router, method: Method, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send_json(app, Method::PUT, uri, body).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

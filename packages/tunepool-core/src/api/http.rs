//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::response::{api_created, api_error, api_ok, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::{ErrorCode, TunepoolResult};
use crate::protocol_constants::SERVICE_ID;
use crate::room::Song;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateRoomRequest {
    name: String,
    code: String,
}

#[derive(Deserialize)]
struct BindDeviceRequest {
    #[serde(rename = "deviceId")]
    device_id: String,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

#[derive(Deserialize)]
struct AddSongRequest {
    song: Song,
}

fn default_like_delta() -> i64 {
    1
}

#[derive(Deserialize)]
struct LikeRequest {
    uri: String,
    #[serde(default = "default_like_delta")]
    delta: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// True if `origin` is `trusted`, or `trusted` with an explicit port.
fn origin_is_trusted(origin: &str, trusted: &str) -> bool {
    match origin.strip_prefix(trusted) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix(':')
            .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

/// Browsers may call the API only from the configured trusted origins.
fn cors_layer(state: &AppState) -> CorsLayer {
    let trusted_origins = state.config.read().trusted_origins.clone();
    log::info!("[Server] CORS trusted origins: {:?}", trusted_origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let origin = origin.to_str().unwrap_or("");
            trusted_origins
                .iter()
                .any(|allowed| origin_is_trusted(origin, allowed))
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(false)
}

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/health", get(health_check))
        .route("/authorize", get(authorize_redirect))
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{room}", get(get_room))
        .route("/api/rooms/{room}/devices", get(list_devices))
        .route("/api/rooms/{room}/device", put(bind_device))
        .route("/api/rooms/{room}/search", post(search_tracks))
        .route("/api/rooms/{room}/queue", get(get_queue).post(add_song))
        .route("/api/rooms/{room}/queue/like", post(like_song))
        .route("/api/rooms/{room}/play", put(play))
        .route("/api/rooms/{room}/stop", put(stop))
        .route("/ws/{room}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness check.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "connections": state.ws_manager.connection_count(),
    }))
}

/// Sends the browser to the provider's consent page.
async fn authorize_redirect(State(state): State<AppState>) -> Response {
    match state.provider.authorize_url() {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            log::error!("[Server] Cannot build authorize URL: {}", e);
            api_error(StatusCode::SERVICE_UNAVAILABLE, e.code(), e).into_response()
        }
    }
}

async fn create_room(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoomRequest>,
) -> TunepoolResult<impl IntoResponse> {
    let room = state
        .registrar
        .create_room(&payload.name, &payload.code)
        .await?;
    Ok(api_created(room.summary()))
}

async fn get_room(
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> TunepoolResult<impl IntoResponse> {
    Ok(api_success(state.registrar.summary(&room).await?))
}

async fn list_devices(
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> TunepoolResult<impl IntoResponse> {
    let devices = state.binder.list_devices(&room).await?;
    Ok(api_success(json!({ "devices": devices })))
}

async fn bind_device(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<BindDeviceRequest>,
) -> TunepoolResult<impl IntoResponse> {
    state.binder.bind_device(&room, &payload.device_id).await?;
    Ok(api_ok())
}

async fn search_tracks(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> TunepoolResult<impl IntoResponse> {
    let tracks = state.catalog.search(&room, &payload.query).await?;
    Ok(api_success(json!({ "tracks": tracks })))
}

async fn get_queue(
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> TunepoolResult<impl IntoResponse> {
    let queue = state.editor.queue(&room).await?;
    Ok(api_success(json!({ "queue": queue })))
}

async fn add_song(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AddSongRequest>,
) -> TunepoolResult<impl IntoResponse> {
    let song = state.editor.add_song(&room, payload.song).await?;
    Ok(api_created(song))
}

async fn like_song(
    Path(room): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<LikeRequest>,
) -> TunepoolResult<impl IntoResponse> {
    let likes = state
        .editor
        .like_song(&room, &payload.uri, payload.delta)
        .await?;
    Ok(api_success(json!({ "uri": payload.uri, "likes": likes })))
}

/// Plays the next song. Always answers 200 with `{ok, message}`.
async fn play(Path(room): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.advancer.play(&room).await)
}

async fn stop(
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> TunepoolResult<impl IntoResponse> {
    let cancelled = state.advancer.stop(&room).await?;
    Ok(api_success(json!({ "stopped": cancelled })))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use parking_lot::RwLock;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::events::BroadcastEventBridge;
    use crate::provider::ProviderClient;
    use crate::room::test_support::{room_with_queue, song};
    use crate::services::test_support::Harness;
    use crate::state::{ClientCredentials, Config};

    pub(crate) fn app_state(h: &Harness, bridge: Arc<BroadcastEventBridge>) -> AppState {
        let config = Config::default();
        let provider = ProviderClient::new(&config, ClientCredentials::new("id", "secret")).unwrap();
        AppState::builder()
            .registrar(h.registrar.clone())
            .advancer(h.advancer.clone())
            .binder(h.binder.clone())
            .catalog(h.catalog.clone())
            .editor(h.editor.clone())
            .provider(Arc::new(provider))
            .event_bridge(bridge)
            .config(Arc::new(RwLock::new(config)))
            .build()
            .unwrap()
    }

    /// Serves `state` on an ephemeral loopback port and returns its base URL.
    pub(crate) async fn spawn_server(state: AppState, shutdown: CancellationToken) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(crate::api::serve(listener, state, shutdown));
        format!("http://{addr}")
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    #[test]
    fn trusted_origin_allows_only_its_own_ports() {
        assert!(origin_is_trusted("http://localhost", "http://localhost"));
        assert!(origin_is_trusted("http://localhost:5173", "http://localhost"));
        assert!(!origin_is_trusted("http://localhost.attacker.example", "http://localhost"));
        assert!(!origin_is_trusted("http://localhost:", "http://localhost"));
        assert!(!origin_is_trusted("http://localhost:80@evil", "http://localhost"));
        assert!(!origin_is_trusted("https://localhost", "http://localhost"));
    }

    #[tokio::test]
    async fn cors_rejects_lookalike_origin() {
        let h = Harness::new(vec![]);
        let shutdown = CancellationToken::new();
        let base = spawn_server(app_state(&h, Arc::new(BroadcastEventBridge::new(8))), shutdown.clone()).await;

        let allowed = client()
            .get(format!("{base}/health"))
            .header("Origin", "http://localhost:5173")
            .send()
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()["access-control-allow-origin"],
            "http://localhost:5173"
        );

        let rejected = client()
            .get(format!("{base}/health"))
            .header("Origin", "http://localhost.attacker.example")
            .send()
            .await
            .unwrap();
        assert!(rejected.headers().get("access-control-allow-origin").is_none());

        shutdown.cancel();
    }

    #[test]
    fn builder_reports_missing_component() {
        let err = AppState::builder().build().err().unwrap();
        assert!(err.to_string().contains("registrar"));
    }

    #[tokio::test]
    async fn health_reports_service() {
        let h = Harness::new(vec![]);
        let shutdown = CancellationToken::new();
        let base = spawn_server(app_state(&h, Arc::new(BroadcastEventBridge::new(8))), shutdown.clone()).await;

        let body: Value = client()
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], SERVICE_ID);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn room_lifecycle_over_http() {
        let h = Harness::new(vec![]);
        let shutdown = CancellationToken::new();
        let base = spawn_server(app_state(&h, Arc::new(BroadcastEventBridge::new(8))), shutdown.clone()).await;
        let http = client();

        let created = http
            .post(format!("{base}/api/rooms"))
            .json(&json!({ "name": "party", "code": "code-1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), reqwest::StatusCode::CREATED);
        let summary: Value = created.json().await.unwrap();
        assert_eq!(summary["name"], "party");
        assert!(summary.get("accessToken").is_none());

        let added = http
            .post(format!("{base}/api/rooms/party/queue"))
            .json(&json!({ "song": {
                "uri": "spotify:track:a",
                "title": "A",
                "artist": "Artist",
                "image": "",
                "length": 200000
            }}))
            .send()
            .await
            .unwrap();
        assert_eq!(added.status(), reqwest::StatusCode::CREATED);

        let liked: Value = http
            .post(format!("{base}/api/rooms/party/queue/like"))
            .json(&json!({ "uri": "spotify:track:a" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(liked["likes"], 1);

        let played: Value = http
            .put(format!("{base}/api/rooms/party/play"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(played, json!({ "ok": true, "message": "Song played" }));

        let empty: Value = http
            .put(format!("{base}/api/rooms/party/play"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(empty, json!({ "ok": true, "message": "Queue is empty" }));

        let stopped: Value = http
            .put(format!("{base}/api/rooms/party/stop"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stopped["stopped"], true);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn errors_map_to_status_and_code() {
        let h = Harness::new(vec![room_with_queue("lobby", vec![song("A", 0)])]);
        let shutdown = CancellationToken::new();
        let base = spawn_server(app_state(&h, Arc::new(BroadcastEventBridge::new(8))), shutdown.clone()).await;
        let http = client();

        let missing = http
            .get(format!("{base}/api/rooms/ghost"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["error"], "room_not_found");

        let duplicate = http
            .post(format!("{base}/api/rooms"))
            .json(&json!({ "name": "lobby", "code": "code-1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(duplicate.status(), reqwest::StatusCode::CONFLICT);

        let blank_search = http
            .post(format!("{base}/api/rooms/lobby/search"))
            .json(&json!({ "query": " " }))
            .send()
            .await
            .unwrap();
        assert_eq!(blank_search.status(), reqwest::StatusCode::BAD_REQUEST);

        let play_missing: Value = http
            .put(format!("{base}/api/rooms/ghost/play"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(play_missing["ok"], false);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn authorize_redirects_to_consent_page() {
        let h = Harness::new(vec![]);
        let shutdown = CancellationToken::new();
        let base = spawn_server(app_state(&h, Arc::new(BroadcastEventBridge::new(8))), shutdown.clone()).await;

        let response = client()
            .get(format!("{base}/authorize"))
            .send()
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        let location = response.headers()[reqwest::header::LOCATION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(location.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(location.contains("client_id=id"));
        shutdown.cancel();
    }
}

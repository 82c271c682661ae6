use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::stream;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use solace_reasoning::{InsightGenerator, StreamEvent, TurnEngine};

use crate::auth::{bearer_token, IdentityResolver};
use crate::types::{ChatRequest, ErrorBody, InsightRequest, InsightResponse};

/// Shared state for the HTTP server.
#[derive(Clone)]
struct AppState {
    engine: Arc<TurnEngine>,
    insights: Arc<InsightGenerator>,
    auth: Arc<dyn IdentityResolver>,
}

/// The companion HTTP server.
///
/// - `POST /v1/chat`: bearer-gated, streams the reply as SSE
/// - `POST /v1/insight`: bearer-gated, weekly insight on demand
/// - `GET /health`: health check
pub struct SolaceServer {
    state: AppState,
    host: String,
    port: u16,
}

impl SolaceServer {
    pub fn new(
        engine: Arc<TurnEngine>,
        insights: Arc<InsightGenerator>,
        auth: Arc<dyn IdentityResolver>,
        host: &str,
        port: u16,
    ) -> Self {
        Self {
            state: AppState {
                engine,
                insights,
                auth,
            },
            host: host.to_string(),
            port,
        }
    }

    /// Start the server. This spawns a background task and returns the join handle.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        let app = Router::new()
            .route("/health", get(health))
            .route("/v1/chat", post(chat))
            .route("/v1/insight", post(insight))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let addr = format!("{}:{}", self.host, self.port);
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!("Server failed to bind {}: {}", addr, e);
                    return;
                }
            };
            tracing::info!("Listening on {}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
            }
        })
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

/// POST /v1/chat: classify, run both passes, relay the rewrite stream.
///
/// The reply arrives as SSE data events ending with a `[DONE]` sentinel;
/// the chosen bucket label travels in the `X-Support-Bucket` header.
async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let Some(user_id) = authenticate(&state, &headers).await else {
        return error_response(StatusCode::UNAUTHORIZED, "Missing or unknown bearer token");
    };

    match state.engine.respond(request.into_turn(user_id)).await {
        Ok(reply) => {
            let bucket = reply.bucket;
            let events = stream::unfold(reply.stream, |mut rx| async move {
                let event = rx.recv().await?;
                let sse_event = match event {
                    StreamEvent::TextDelta(chunk) => Event::default().data(chunk),
                    StreamEvent::Done => Event::default().data("[DONE]"),
                    StreamEvent::Error(detail) => {
                        tracing::warn!("Reply stream broke: {}", detail);
                        let body = serde_json::json!({
                            "error": "Something went wrong. Let's try again in a moment."
                        });
                        Event::default().data(body.to_string())
                    }
                };
                Some((Ok::<_, Infallible>(sse_event), rx))
            });

            let mut response = Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response();
            if let Ok(value) = HeaderValue::from_str(bucket.label()) {
                response.headers_mut().insert("x-support-bucket", value);
            }
            response
        }
        Err(e) => {
            tracing::warn!("Turn failed: {}", e);
            let status =
                StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, e.user_message())
        }
    }
}

/// POST /v1/insight: run the weekly aggregator for the target user.
async fn insight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InsightRequest>,
) -> Response {
    let Some(caller) = authenticate(&state, &headers).await else {
        return error_response(StatusCode::UNAUTHORIZED, "Missing or unknown bearer token");
    };

    let user_id = request.user_id.unwrap_or(caller);
    match state.insights.generate(user_id).await {
        Ok(outcome) => Json(InsightResponse::from_outcome(&outcome)).into_response(),
        Err(e) => {
            tracing::error!("Insight generation failed: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not generate this week's insight. Please try again later.",
            )
        }
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Option<Uuid> {
    let token = bearer_token(headers)?;
    state.auth.resolve(token).await
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

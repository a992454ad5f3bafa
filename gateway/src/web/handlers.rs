//! Callback endpoint handlers.
//!
//! Each POST runs the full exchange in-line: authenticate, unwrap, parse,
//! ask the application for a reply, then write it back in the same response.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::crypto::MessageCrypt;
use crate::error::{Result, WebhookError};
use crate::exchange::{validate, CallbackQuery, Exchange, InboundOptions, InboundRequest};
use crate::handler::MessageHandler;
use crate::web::response::ResponseWriter;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub crypt: Arc<MessageCrypt>,
    pub handler: Arc<dyn MessageHandler>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: Config, handler: Arc<dyn MessageHandler>) -> Result<Self> {
        let crypt = config.message_crypt()?;
        Ok(Self {
            config: Arc::new(config),
            crypt: Arc::new(crypt),
            handler,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn inbound_options(&self) -> InboundOptions {
        InboundOptions {
            skip_validation: self.config.skip_signature,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Errors
// =============================================================================

/// Error body.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn error_response(err: &WebhookError) -> Response {
    let (status, label) = if err.is_authentication() {
        (StatusCode::UNAUTHORIZED, "unauthorized")
    } else if err.is_bad_request() {
        (StatusCode::BAD_REQUEST, "bad_request")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "error")
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "wechat_callback_failed");
        None
    } else {
        warn!(error = %err, status = status.as_u16(), "wechat_callback_rejected");
        Some(err.to_string())
    };

    (
        status,
        Json(WebhookResponse {
            status: label,
            message,
        }),
    )
        .into_response()
}

// =============================================================================
// URL Verification
// =============================================================================

/// Answers the platform's URL verification by echoing `echostr`.
pub async fn verify_url(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    info!(
        has_echostr = query.echostr.is_some(),
        "wechat_verify_received"
    );

    if let Err(e) = validate(&state.crypt, &query, &state.inbound_options()) {
        return error_response(&e);
    }

    let echostr = query.echostr.unwrap_or_default();
    match ResponseWriter::new().result_string(echostr) {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// Message Callback
// =============================================================================

/// Message and event push endpoint.
pub async fn wechat_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!(
        encrypt_type = ?query.encrypt_type,
        body_length = body.len(),
        "wechat_callback_received"
    );

    match process_callback(&state, query, &headers, body) {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

fn process_callback(
    state: &AppState,
    query: CallbackQuery,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = InboundRequest {
        query,
        content_type,
        body: body.to_vec(),
    };
    let mut exchange =
        Exchange::handle_inbound(state.crypt.clone(), request, &state.inbound_options())?;

    let reply = state.handler.handle(exchange.message());

    match exchange.handle_reply(reply, state.clock.as_ref())? {
        Some(body) => {
            info!(
                msg_type = ?exchange.response().map(|r| r.message.kind()),
                safe_mode = exchange.is_safe_mode(),
                "wechat_reply_sent"
            );
            ResponseWriter::new().reply(body)
        }
        None => {
            info!(msg_type = %exchange.message().msg_type(), "wechat_no_reply");
            ResponseWriter::new().empty()
        }
    }
}

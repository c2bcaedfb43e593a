//! axum wiring for the batch and locking handlers.
//!
//! The handlers are synchronous and may block on their backends, so every
//! request is run on tokio's blocking pool.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{BatchHandler, Error, GatewayConfig, LfsResponse, LockingHandler, RequestContext};

/// Request extension naming a user the surrounding server already authenticated.
///
/// When present it wins over the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub String);

#[derive(Clone)]
struct GatewayState {
    batch: BatchHandler,
    locking: LockingHandler,
    locks_route: String,
    max_body_bytes: usize,
}

/// Create the gateway router.
pub fn router(config: &GatewayConfig, batch: BatchHandler, locking: LockingHandler) -> Router {
    let locks = config.locks_route();
    let state = GatewayState {
        batch,
        locking,
        locks_route: locks.clone(),
        max_body_bytes: config.max_body_bytes,
    };

    Router::new()
        .route(&config.batch_route(), post(batch_endpoint))
        .route(&locks, get(list_locks).post(create_lock))
        // verify, unlock and anything malformed; the locking handler sorts them out
        .route(
            &format!("{}/{{*rest}}", locks),
            get(locks_subpath_get).post(locks_subpath_post),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the gateway until the process exits.
pub async fn serve(
    addr: SocketAddr,
    config: &GatewayConfig,
    batch: BatchHandler,
    locking: LockingHandler,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "LFS gateway listening");
    axum::serve(listener, router(config, batch, locking)).await
}

impl IntoResponse for LfsResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(CONTENT_TYPE, crate::CONTENT_TYPE)], self.body).into_response()
    }
}

/// POST {batch}/objects/batch
async fn batch_endpoint(State(state): State<GatewayState>, req: Request) -> LfsResponse {
    let (ctx, body) = match read_request(req, state.max_body_bytes).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    run_blocking(move || state.batch.handle(&ctx, &body)).await
}

/// GET {locks}/locks
async fn list_locks(State(state): State<GatewayState>, req: Request) -> LfsResponse {
    let ctx = request_context(&req);
    let query = req.uri().query().map(String::from);
    run_blocking(move || state.locking.handle_get(&ctx, None, query.as_deref())).await
}

/// GET {locks}/locks/*
async fn locks_subpath_get(
    State(state): State<GatewayState>,
    rest: Result<Path<String>, PathRejection>,
    req: Request,
) -> LfsResponse {
    let rest = match rest {
        Ok(Path(rest)) => rest,
        Err(rejection) => {
            return path_rejected(
                rejection,
                "Invalid path info in the GET request",
                &state.locks_route,
                &req,
            )
        }
    };
    let ctx = request_context(&req);
    let query = req.uri().query().map(String::from);
    let path_info = format!("/{}", rest);
    run_blocking(move || {
        state
            .locking
            .handle_get(&ctx, Some(&path_info), query.as_deref())
    })
    .await
}

/// POST {locks}/locks
async fn create_lock(State(state): State<GatewayState>, req: Request) -> LfsResponse {
    let (ctx, body) = match read_request(req, state.max_body_bytes).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    run_blocking(move || state.locking.handle_post(&ctx, None, &body)).await
}

/// POST {locks}/locks/verify and POST {locks}/locks/:id/unlock
async fn locks_subpath_post(
    State(state): State<GatewayState>,
    rest: Result<Path<String>, PathRejection>,
    req: Request,
) -> LfsResponse {
    let rest = match rest {
        Ok(Path(rest)) => rest,
        Err(rejection) => {
            return path_rejected(
                rejection,
                "Invalid delete lock endpoint",
                &state.locks_route,
                &req,
            )
        }
    };
    let (ctx, body) = match read_request(req, state.max_body_bytes).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    let path_info = format!("/{}", rest);
    run_blocking(move || state.locking.handle_post(&ctx, Some(&path_info), &body)).await
}

/// A lock sub-path axum could not decode, reported like any other malformed path.
fn path_rejected(
    rejection: PathRejection,
    message: &str,
    locks_route: &str,
    req: &Request,
) -> LfsResponse {
    tracing::debug!(error = %rejection.body_text(), "undecodable lock path");
    let path = req.uri().path();
    let path_info = path.strip_prefix(locks_route).unwrap_or(path);
    LfsResponse::from(Error::protocol(format!("{}: {}", message, path_info)))
}

fn request_context(req: &Request) -> RequestContext {
    RequestContext {
        remote_user: req.extensions().get::<RemoteUser>().map(|u| u.0.clone()),
        authorization: req
            .headers()
            .get(AUTHORIZATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
    }
}

async fn read_request(
    req: Request,
    max_body_bytes: usize,
) -> Result<(RequestContext, Bytes), LfsResponse> {
    let ctx = request_context(&req);
    // Oversized bodies are rejected like any other unreadable request.
    let body = axum::body::to_bytes(req.into_body(), max_body_bytes)
        .await
        .map_err(|e| {
            LfsResponse::from(Error::validation(format!(
                "Failed to read request body: {}",
                e
            )))
        })?;
    Ok((ctx, body))
}

async fn run_blocking<F>(handler: F) -> LfsResponse
where
    F: FnOnce() -> LfsResponse + Send + 'static,
{
    match tokio::task::spawn_blocking(handler).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "LFS handler task failed");
            LfsResponse::from(Error::internal("LFS request handler failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_headers() {
        let response = LfsResponse::from(Error::RateLimitExceeded("slow down".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/vnd.git-lfs+json; charset=utf-8"
        );
    }

    #[test]
    fn test_nonstandard_status_codes() {
        let response = LfsResponse::from(Error::BandwidthLimitExceeded("quota".into()))
            .into_response();
        assert_eq!(response.status().as_u16(), 509);
    }

    #[test]
    fn test_remote_user_extension_wins() {
        let mut req = axum::http::Request::builder()
            .uri("/info/lfs/locks")
            .header(AUTHORIZATION, "Bearer nope")
            .body(axum::body::Body::empty())
            .unwrap();
        req.extensions_mut().insert(RemoteUser("erin".into()));

        let ctx = request_context(&req);
        assert_eq!(ctx.principal().unwrap().username(), Some("erin"));
    }
}

//! HTTP surface: a single `POST /tag_image` route.

use std::{future::Future, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    response::Json,
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::service::{ApiResponse, TagRequest, TagService};

/// Builds the router. `body_limit` is in bytes.
pub fn router(service: Arc<TagService>, body_limit: usize) -> Router {
    Router::new()
        .route("/tag_image", post(tag_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

async fn tag_image(
    State(service): State<Arc<TagService>>,
    payload: Result<Json<TagRequest>, JsonRejection>,
) -> Json<ApiResponse> {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejecting malformed request");
            return Json(ApiResponse::failure(format!(
                "invalid request: {}",
                rejection.body_text()
            )));
        }
    };

    Json(service.tag(&request).await)
}

/// Serves `router` on `addr` until the process receives Ctrl-C.
pub async fn serve(addr: &str, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await
}

/// Resolves once `signal` fires. If the handler cannot be installed the
/// error is logged and this never resolves, so the server keeps running.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutting down"),
        Err(e) => {
            error!(error = %e, "cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

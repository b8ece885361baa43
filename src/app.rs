use std::net::SocketAddr;

use axum::{response::IntoResponse, routing::get, Router};
use axum_extra::extract::cookie::CookieJar;
use tower_http::trace::TraceLayer;

use crate::auth::extractors::CurrentUser;
use crate::state::AppState;
use crate::views::{self, Notice};
use crate::{auth, flash, moods};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(|| async { "ok" }))
        .merge(auth::router())
        .merge(moods::router())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn home(current: Option<CurrentUser>, jar: CookieJar) -> impl IntoResponse {
    let (jar, pending) = flash::take(jar);
    let notice = pending.map(|f| Notice::success(f.message()));
    let username = current.as_ref().map(|u| u.username.as_str());
    (jar, views::home(username, notice.as_ref()))
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;
    Ok(())
}

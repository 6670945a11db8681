use crate::core::{
    FundDataProvider, HandlerError, PageViewTracker,
    config::AppConfig,
    telemetry::{NoopTracker, spawn_page_view},
};
use crate::providers::{google_analytics::GoogleAnalyticsTracker, vanguard::VanguardProvider};
use crate::render::{self, RenderedResponse};
use crate::router;
use anyhow::Result;
use axum::{Router, extract::State, http::Uri};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

/// Everything a request needs, built once at startup.
pub struct AppState {
    pub provider: Arc<dyn FundDataProvider>,
    pub tracker: Arc<dyn PageViewTracker>,
    pub deadline: Duration,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = Arc::new(VanguardProvider::new(&config.provider)?);
        let tracker: Arc<dyn PageViewTracker> = match &config.analytics {
            Some(analytics) => Arc::new(GoogleAnalyticsTracker::new(analytics)?),
            None => {
                info!("Analytics not configured, page views will not be reported");
                Arc::new(NoopTracker)
            }
        };

        Ok(AppState {
            provider,
            tracker,
            deadline: config.deadline(),
        })
    }
}

/// Answers one request path, always producing a document within the deadline.
///
/// When the deadline passes first the pipeline future is dropped, which
/// aborts any provider requests still in flight.
#[instrument(name = "FundRequest", skip(state))]
pub async fn handle_path(state: &AppState, path: &str) -> RenderedResponse {
    let pipeline = AssertUnwindSafe(run_pipeline(state, path)).catch_unwind();

    let result = match tokio::time::timeout(state.deadline, pipeline).await {
        Ok(Ok(result)) => result,
        Ok(Err(_panic)) => Err(HandlerError::Unhandled("Internal error".to_string())),
        Err(_elapsed) => Err(HandlerError::Timeout(state.deadline)),
    };

    match result {
        Ok(response) => {
            debug!(status = %response.status, "Rendered fund document");
            response
        }
        Err(e) if e.is_caller_error() => {
            warn!(error = %e, status = %e.status(), "Rejected request");
            render::failure(&e)
        }
        Err(e) => {
            error!(error = %e, status = %e.status(), "Request failed");
            render::failure(&e)
        }
    }
}

async fn run_pipeline(state: &AppState, path: &str) -> Result<RenderedResponse, HandlerError> {
    let fund = router::match_fund(path)?;
    let record = state.provider.fetch_fund(&fund).await?;
    render::success(&record)
}

async fn handle(State(state): State<Arc<AppState>>, uri: Uri) -> RenderedResponse {
    let url = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    spawn_page_view(Arc::clone(&state.tracker), url);

    handle_path(&state, uri.path()).await
}

/// Every path and method is answered by the fund handler.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app_router(state)).await?;
    Ok(())
}

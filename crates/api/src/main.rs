use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rsiwatch_core::ingest::provider::YahooChartSource;
use rsiwatch_core::notify::webhook::WebhookNotifier;
use rsiwatch_core::notify::Notifier;
use rsiwatch_core::run::{handle_invocation, InvocationContext, RunOptions, RunSummary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = rsiwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let opts = RunOptions::from_env()?;
    let source = YahooChartSource::from_settings(&settings)?;

    let notifier: Option<Arc<dyn Notifier>> = match WebhookNotifier::from_settings(&settings) {
        Ok(n) => Some(Arc::new(n)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "notifier unavailable; starting trigger in degraded mode");
            None
        }
    };

    let state = AppState {
        source: Arc::new(source),
        notifier,
        opts: Arc::new(opts),
        run_lock: Arc::new(tokio::sync::Mutex::new(())),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "trigger listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct AppState {
    source: Arc<YahooChartSource>,
    notifier: Option<Arc<dyn Notifier>>,
    opts: Arc<RunOptions>,
    // One report run at a time per process.
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/invoke", post(invoke))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn invoke(
    State(state): State<AppState>,
    event: Option<Json<Value>>,
) -> Result<Json<RunSummary>, StatusCode> {
    let Some(notifier) = &state.notifier else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let Ok(_guard) = state.run_lock.try_lock() else {
        tracing::warn!("report run already in progress; rejecting invocation");
        return Err(StatusCode::CONFLICT);
    };

    let event = event.map(|Json(v)| v).unwrap_or(Value::Null);
    let ctx = InvocationContext::new();

    handle_invocation(
        &event,
        &ctx,
        &*state.source,
        &**notifier,
        &state.opts,
    )
    .await
    .map(Json)
    .map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(
            invocation_id = %ctx.invocation_id,
            error = %format!("{e:#}"),
            "report run failed"
        );
        StatusCode::BAD_GATEWAY
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &rsiwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsiwatch_core::notify::console::ConsoleNotifier;

    fn state(notifier: Option<Arc<dyn Notifier>>) -> AppState {
        let settings = rsiwatch_core::config::Settings::default();
        AppState {
            source: Arc::new(YahooChartSource::from_settings(&settings).unwrap()),
            notifier,
            opts: Arc::new(RunOptions::default()),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    #[tokio::test]
    async fn invoke_without_notifier_is_unavailable() {
        let res = invoke(State(state(None)), None).await;
        assert_eq!(res.err(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn overlapping_invocation_is_rejected() {
        let state = state(Some(Arc::new(ConsoleNotifier)));
        let _held = state.run_lock.clone().try_lock_owned().unwrap();

        let res = invoke(State(state), None).await;
        assert_eq!(res.err(), Some(StatusCode::CONFLICT));
    }
}

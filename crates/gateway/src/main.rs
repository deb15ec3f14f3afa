//! DocGuard API Gateway
//!
//! HTTP surface over the document assistant.
//! Handles:
//! - Session lifecycle with per-session isolation
//! - Queries, conversation reset and document ingestion
//! - Rate limiting
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;
mod registry;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    BoxError, Router,
};
use docguard_common::{
    config::AppConfig,
    errors::AppError,
    metrics::{self, LATENCY_BUCKETS, METRICS_PREFIX, SYNTHESIS_BUCKETS},
};
use docguard_context::Assistant;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use registry::SessionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub assistant: Arc<Assistant>,
    pub sessions: Arc<SessionRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);
    info!("Starting DocGuard API Gateway v{}", docguard_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    install_metrics_exporter(&config)?;

    std::fs::create_dir_all(&config.ingestion.upload_dir)?;

    let assistant = Assistant::from_config(&config).map_err(|e| {
        error!(error = %e, "Failed to build assistant");
        e
    })?;
    info!(
        llm = assistant.model_name(),
        embedding = assistant.embedding_model(),
        threshold = config.retrieval.score_threshold,
        "Assistant ready"
    );

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        assistant: Arc::new(assistant),
        sessions: Arc::new(SessionRegistry::new()),
    };

    spawn_session_sweeper(state.sessions.clone(), config.session_idle());

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.observability.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn install_metrics_exporter(config: &AppConfig) -> anyhow::Result<()> {
    let port = config.observability.metrics_port;
    if port == 0 {
        info!("Prometheus exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_synthesis_duration_seconds", METRICS_PREFIX)),
            SYNTHESIS_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Periodically drop sessions idle for longer than `max_idle`
fn spawn_session_sweeper(sessions: Arc<SessionRegistry>, max_idle: Duration) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(max_idle).await;
            if evicted > 0 {
                let remaining = sessions.len().await;
                info!(evicted, remaining, "Idle sessions evicted");
            }
        }
    });
}

/// Create the main application router
fn create_router(state: AppState) -> Result<Router, AppError> {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Synthesis has its own timeout; this bounds the whole request
    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|_: BoxError| async {
            StatusCode::REQUEST_TIMEOUT
        }))
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    let mut session_routes = Router::new()
        .route("/sessions", post(handlers::sessions::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route("/sessions/{id}/query", post(handlers::query::query))
        .route("/sessions/{id}/reset", post(handlers::query::reset))
        .route("/sessions/{id}/documents", post(handlers::knowledge::ingest))
        .route(
            "/sessions/{id}/knowledge-base",
            delete(handlers::knowledge::clear_knowledge_base),
        );

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::RateLimitState::from_config(&state.config.rate_limit)?;
        session_routes = session_routes.route_layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // API routes; health endpoints are never rate limited
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(session_routes)
        .route_layer(from_fn(middleware::metrics::track_requests));

    // Compose the app
    Ok(Router::new()
        .nest("/v1", api_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use docguard_common::audit::{AuditLogger, AuditPayload, MemoryAuditSink};
    use docguard_common::embeddings::HashingEmbedder;
    use docguard_context::llm::OfflineModel;
    use docguard_context::pipeline::CANCELLED_MESSAGE;
    use docguard_context::{LanguageModel, Prompt, QueryPipeline, Synthesizer, TopicGuard};
    use docguard_ingestion::DocumentLoader;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tower::ServiceExt;

    const STORAGE_TEXT: &str =
        "Cold chain handbook\n\nVaccine storage temperature must be kept between 2 and 8 degrees Celsius.";

    /// Answers only after a delay longer than the request timeout
    struct SlowModel(Duration);

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _prompt: &Prompt) -> docguard_common::errors::Result<String> {
            tokio::time::sleep(self.0).await;
            Ok("Too late (source: handbook.md)".to_string())
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    struct TestApp {
        router: Router,
        audit: Arc<MemoryAuditSink>,
        upload_dir: PathBuf,
    }

    fn build_app(config: AppConfig, model: Arc<dyn LanguageModel>) -> TestApp {
        let upload_dir =
            std::env::temp_dir().join(format!("docguard-uploads-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&upload_dir).unwrap();

        let audit = Arc::new(MemoryAuditSink::new());
        let pipeline = QueryPipeline::new(
            TopicGuard::new().unwrap(),
            Synthesizer::new(model, Duration::from_secs(90)),
            AuditLogger::new(audit.clone(), "test-host"),
            config.retrieval.score_threshold,
        );
        let assistant = Assistant::new(
            pipeline,
            DocumentLoader::default().with_upload_root(&upload_dir),
            Arc::new(HashingEmbedder::new(384)),
            config.top_k(),
            None,
        );

        let router = create_router(AppState {
            config: Arc::new(config),
            assistant: Arc::new(assistant),
            sessions: Arc::new(SessionRegistry::new()),
        })
        .unwrap();

        TestApp {
            router,
            audit,
            upload_dir,
        }
    }

    fn test_router(config: AppConfig) -> Router {
        build_app(config, Arc::new(OfflineModel::new())).router
    }

    fn app() -> Router {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        test_router(config)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response<Body> {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        };
        app.clone().oneshot(request.unwrap()).await.unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_session(app: &Router) -> String {
        let response = send(app, "POST", "/v1/sessions", Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["resumed"], false);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = app();

        let response = send(&app, "GET", "/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["status"], "healthy");

        create_session(&app).await;
        let body = json_body(send(&app, "GET", "/v1/ready", None).await).await;
        assert_eq!(body["checks"]["llm"]["model"], "offline-extractive");
        assert_eq!(body["checks"]["sessions"]["active"], 1);
    }

    #[tokio::test]
    async fn test_query_without_knowledge_base() {
        let app = app();
        let id = create_session(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/query", id),
            Some(json!({"query": "What is the capital of France?"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["answer"], docguard_context::REFUSAL_NO_KB);
        assert_eq!(body["refusal_type"], "no_kb");
        assert_eq!(body["grounded"], false);
    }

    #[tokio::test]
    async fn test_blocked_topic() {
        let app = app();
        let id = create_session(&app).await;

        let body = json_body(
            send(
                &app,
                "POST",
                &format!("/v1/sessions/{}/query", id),
                Some(json!({"query": "Who should be the next prime minister?"})),
            )
            .await,
        )
        .await;
        assert_eq!(body["answer"], docguard_context::REFUSAL_OOS);
        assert_eq!(body["refusal_type"], "category_block");
    }

    #[tokio::test]
    async fn test_ingest_then_grounded_answer() {
        let app = app();
        let id = create_session(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/documents", id),
            Some(json!({"documents": [{"name": "handbook.md", "text": STORAGE_TEXT}]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["chunks"], 1);
        assert_eq!(body["total_chunks"], 1);

        let body = json_body(
            send(
                &app,
                "POST",
                &format!("/v1/sessions/{}/query", id),
                Some(json!({"query": "What is vaccine storage temperature?"})),
            )
            .await,
        )
        .await;
        assert_eq!(body["grounded"], true);
        assert_eq!(body["refusal_type"], "none");
        assert_eq!(body["citations"][0]["source"], "handbook.md");

        let session = json_body(send(&app, "GET", &format!("/v1/sessions/{}", id), None).await).await;
        assert_eq!(session["history"].as_array().unwrap().len(), 2);
        assert_eq!(session["knowledge_base"]["loaded"], true);

        let response = send(
            &app,
            "DELETE",
            &format!("/v1/sessions/{}/knowledge-base", id),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let body = json_body(
            send(
                &app,
                "POST",
                &format!("/v1/sessions/{}/query", id),
                Some(json!({"query": "What is vaccine storage temperature?"})),
            )
            .await,
        )
        .await;
        assert_eq!(body["refusal_type"], "no_kb");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let app = app();
        let first = create_session(&app).await;
        let second = create_session(&app).await;

        send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/documents", first),
            Some(json!({"documents": [{"name": "handbook.md", "text": STORAGE_TEXT}]})),
        )
        .await;

        let body = json_body(
            send(
                &app,
                "POST",
                &format!("/v1/sessions/{}/query", second),
                Some(json!({"query": "What is vaccine storage temperature?"})),
            )
            .await,
        )
        .await;
        assert_eq!(body["refusal_type"], "no_kb");
    }

    #[tokio::test]
    async fn test_reset_and_delete() {
        let app = app();
        let id = create_session(&app).await;

        send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/query", id),
            Some(json!({"query": "What is the capital of France?"})),
        )
        .await;

        let body = json_body(send(&app, "POST", &format!("/v1/sessions/{}/reset", id), None).await).await;
        assert!(body["history"].as_array().unwrap().is_empty());

        let response = send(&app, "DELETE", &format!("/v1/sessions/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "GET", &format!("/v1/sessions/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let app = app();
        let id = create_session(&app).await;

        let response = send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/query", id),
            Some(json!({"query": "a".repeat(4001)})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/documents", id),
            Some(json!({})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/documents", id),
            Some(json!({"paths": ["/nonexistent/deck.pptx"]})),
        )
        .await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut config = AppConfig::default();
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = test_router(config);

        let missing = format!("/v1/sessions/{}", uuid::Uuid::new_v4());
        let response = send(&app, "GET", &missing, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "GET", &missing, None).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Health checks bypass the limiter
        let response = send(&app, "GET", "/v1/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ingest_paths_confined_to_upload_dir() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        let test_app = build_app(config, Arc::new(OfflineModel::new()));
        let app = &test_app.router;
        let id = create_session(app).await;

        std::fs::write(test_app.upload_dir.join("handbook.md"), STORAGE_TEXT).unwrap();
        let outside = test_app.upload_dir.with_extension("md");
        std::fs::write(&outside, "Private notes.").unwrap();

        let response = send(
            app,
            "POST",
            &format!("/v1/sessions/{}/documents", id),
            Some(json!({"paths": ["handbook.md"]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["chunks"], 1);

        for path in [
            "../escape.md".to_string(),
            outside.display().to_string(),
            "/etc/passwd".to_string(),
        ] {
            let response = send(
                app,
                "POST",
                &format!("/v1/sessions/{}/documents", id),
                Some(json!({"paths": [path]})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
            assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
        }

        let _ = std::fs::remove_file(&outside);
        let _ = std::fs::remove_dir_all(&test_app.upload_dir);
    }

    #[tokio::test]
    async fn test_request_timeout_still_audits_response() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config.server.request_timeout_secs = 1;
        let test_app = build_app(config, Arc::new(SlowModel(Duration::from_secs(3))));
        let app = &test_app.router;
        let id = create_session(app).await;

        let response = send(
            app,
            "POST",
            &format!("/v1/sessions/{}/documents", id),
            Some(json!({"documents": [{"name": "handbook.md", "text": STORAGE_TEXT}]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            app,
            "POST",
            &format!("/v1/sessions/{}/query", id),
            Some(json!({"query": "What is vaccine storage temperature?"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let events = test_app.audit.events();
        let types: Vec<&str> = events.iter().map(|e| e.payload.type_name()).collect();
        assert_eq!(types, vec!["query", "response"]);
        match &events[1].payload {
            AuditPayload::Response(record) => {
                assert!(!record.grounded);
                let failure = record.failure.as_ref().unwrap();
                assert_eq!(failure.message, CANCELLED_MESSAGE);
            }
            other => panic!("expected response event, got {:?}", other),
        }

        let _ = std::fs::remove_dir_all(&test_app.upload_dir);
    }
}

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use triage_desk::collaborators::{
    DepartmentRegistry, HttpAvailabilityChecker, LlmAssigneeRouter, LlmClassifier,
    LlmDepartmentMatcher, LlmDrafter, LlmValidator, StaffDirectory,
};
use triage_desk::config::TriageConfig;
use triage_desk::flow::{EmailFlow, FlowDeps};
use triage_desk::llm::{LlmConfig, create_provider};
use triage_desk::pipeline::rules::RulesEngine;
use triage_desk::server;
use triage_desk::sink::WebhookSink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install rustls crypto provider")?;

    let config = TriageConfig::from_env()?;

    // Initialize tracing; the guard must outlive the server
    let _log_guard = init_tracing(&config);

    let llm_config = LlmConfig::from_env()?;
    let llm = create_provider(&llm_config)?;

    eprintln!("📬 Triage Desk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Trigger: http://0.0.0.0:{}/run", config.port);

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    // ── Directories ─────────────────────────────────────────────────────
    let registry = Arc::new(DepartmentRegistry::load(
        config.departments_path.as_deref(),
        &config.endpoints,
        &http,
    )?);
    let staff = Arc::new(StaffDirectory::load(config.staff_path.as_deref())?);
    eprintln!("   Departments: {}", registry.len());
    if staff.is_empty() {
        eprintln!("   Warning: no staff directory loaded; routing relies on the model alone");
    }

    // ── Collaborators ───────────────────────────────────────────────────
    let rules = RulesEngine::with_always_classify(&config.always_classify)?;
    let endpoints = &config.endpoints;
    let deps = FlowDeps {
        classifier: Arc::new(LlmClassifier::new(llm.clone(), rules)),
        matcher: Arc::new(LlmDepartmentMatcher::new(llm.clone(), registry.clone())),
        router: Arc::new(LlmAssigneeRouter::new(llm.clone(), staff)),
        availability: Arc::new(HttpAvailabilityChecker::new(
            http.clone(),
            endpoints.user_status_url.clone(),
        )),
        registry,
        drafter: Arc::new(LlmDrafter::new(llm.clone())),
        validator: Arc::new(LlmValidator::new(llm)),
        sink: Arc::new(WebhookSink::new(
            http,
            endpoints.task_board_url.clone(),
            endpoints.auto_reply_url.clone(),
            endpoints.spam_url.clone(),
        )),
    };
    for (name, url) in [
        ("TASK_BOARD_WEBHOOK_URL", &endpoints.task_board_url),
        ("AUTO_REPLY_WEBHOOK_URL", &endpoints.auto_reply_url),
        ("SPAM_WEBHOOK_URL", &endpoints.spam_url),
        ("USER_STATUS_URL", &endpoints.user_status_url),
    ] {
        if url.is_none() {
            tracing::warn!(var = name, "Endpoint not configured");
        }
    }

    let flow = Arc::new(EmailFlow::new(deps, config.flow.clone()));
    let app = server::routes(flow);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Triage server started");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Console logging, plus a daily rolling file when `TRIAGE_LOG_DIR` is set.
fn init_tracing(config: &TriageConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "triage-desk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}

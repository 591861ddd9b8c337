use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neurobeacon::{
    event::EventBus,
    prediction::{HttpPredictionModel, OfflinePredictionModel, PredictionModel},
    router,
    session::{start_cleanup_task, InMemorySessionRepository},
    storage::{InMemoryKeyValueStore, KeyValueStore, PostgresKeyValueStore},
    AppState, EngineConfig, ReconciliationController, SessionService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neurobeacon=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting neurobeacon engine");
    let config = EngineConfig::from_env()?;

    // Postgres when DATABASE_URL is set, in-memory otherwise
    let store: Arc<dyn KeyValueStore> = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;
            let store = PostgresKeyValueStore::new(pool);
            store.ensure_schema().await?;
            info!("Using Postgres key-value store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, state is kept in memory only");
            Arc::new(InMemoryKeyValueStore::new())
        }
    };

    let model: Arc<dyn PredictionModel> = match &config.model_endpoint {
        Some(endpoint) => Arc::new(HttpPredictionModel::new(
            endpoint.clone(),
            config.model_policy.deadline,
        )?),
        None => {
            warn!("No model endpoint configured, predictions keep prior values");
            Arc::new(OfflinePredictionModel)
        }
    };
    info!(model = model.name(), "Prediction model ready");

    let controller = ReconciliationController::builder(store)
        .with_config(&config)
        .with_model(model)
        .with_event_bus(EventBus::with_capacity(config.event_capacity))
        .build();
    let sessions = Arc::new(SessionService::new(
        controller.clone(),
        Arc::new(InMemorySessionRepository::new()),
        config.default_session,
        config.lock_timeout,
    ));
    tokio::spawn(start_cleanup_task(sessions.clone(), config.session_cleanup));
    let app_state = AppState::new(controller, sessions);

    let app = router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "Server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

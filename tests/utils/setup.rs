#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use neurobeacon::{
    event::{EventBus, UserSubscription},
    prediction::PredictionModel,
    retry::RetryPolicy,
    session::InMemorySessionRepository,
    storage::{InMemoryKeyValueStore, KeyValueStore},
    AppState, ReconciliationController, SessionConfig, SessionService, UserId,
};

use super::mocks::RecordingHandler;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub user_id: UserId,
    pub store: Arc<dyn KeyValueStore>,
    pub controller: ReconciliationController,
    pub sessions: Arc<SessionService>,
    pub event_bus: EventBus,
    pub recorder: Arc<RecordingHandler>,
    pub _subscription_handle: JoinHandle<()>,
}

impl TestSetup {
    pub fn app_state(&self) -> AppState {
        AppState::new(self.controller.clone(), self.sessions.clone())
    }
}

pub struct TestSetupBuilder {
    user_id: String,
    store: Option<Arc<dyn KeyValueStore>>,
    model: Option<Arc<dyn PredictionModel>>,
    storage_retry: Option<RetryPolicy>,
    session_config: SessionConfig,
    lock_timeout: Duration,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            user_id: "player-1".to_string(),
            store: None,
            model: None,
            storage_retry: None,
            session_config: SessionConfig::default(),
            lock_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn PredictionModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_storage_retry(mut self, policy: RetryPolicy) -> Self {
        self.storage_retry = Some(policy);
        self
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub async fn build(self) -> TestSetup {
        let user_id = UserId::parse(&self.user_id).expect("test user id is not blank");
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryKeyValueStore::new()));
        let event_bus = EventBus::new();

        let mut builder = ReconciliationController::builder(store.clone())
            .with_event_bus(event_bus.clone())
            .with_lock_timeout(self.lock_timeout);
        if let Some(model) = self.model {
            builder = builder.with_model(model);
        }
        if let Some(policy) = self.storage_retry {
            builder = builder.with_storage_retry(policy);
        }
        let controller = builder.build();

        let sessions = Arc::new(SessionService::new(
            controller.clone(),
            Arc::new(InMemorySessionRepository::new()),
            self.session_config,
            self.lock_timeout,
        ));

        let recorder = Arc::new(RecordingHandler::new());
        let subscription =
            UserSubscription::new(user_id.clone(), recorder.clone(), event_bus.clone());
        let subscription_handle = subscription.start().await;

        TestSetup {
            user_id,
            store,
            controller,
            sessions,
            event_bus,
            recorder,
            _subscription_handle: subscription_handle,
        }
    }
}

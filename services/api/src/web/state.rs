//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of open wizards.

use crate::adapters::{ClientStorage, MemoryAdapter, TracingNotifier};
use crate::config::Config;
use eco_portal_core::ports::{
    CampaignRepository, ChallengeRepository, Notifier, StudentRepository,
};
use eco_portal_core::{ProfileWizard, RoleSession};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// Wizard Registry
//=========================================================================================

/// An open wizard and the last time a request touched it.
pub struct OpenWizard {
    pub wizard: ProfileWizard,
    pub last_touched: Instant,
}

impl OpenWizard {
    pub fn new(wizard: ProfileWizard) -> Self {
        Self {
            wizard,
            last_touched: Instant::now(),
        }
    }

    /// Marks the wizard as in use and hands it out.
    pub fn touch(&mut self) -> &mut ProfileWizard {
        self.last_touched = Instant::now();
        &mut self.wizard
    }
}

pub type WizardRegistry = HashMap<Uuid, OpenWizard>;

/// Drops wizards idle for at least `ttl`. A wizard with a submission in
/// flight is kept; its outcome still has to be applied.
pub fn evict_idle(wizards: &mut WizardRegistry, ttl: Duration) -> usize {
    let before = wizards.len();
    wizards.retain(|_, open| open.wizard.is_submitting() || open.last_touched.elapsed() < ttl);
    before - wizards.len()
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub students: Arc<dyn StudentRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub challenges: Arc<dyn ChallengeRepository>,
    pub client_storage: Arc<dyn ClientStorage>,
    pub notifier: Arc<dyn Notifier>,
    /// Wizards that have not been cancelled or submitted yet.
    pub wizards: Arc<Mutex<WizardRegistry>>,
}

impl AppState {
    /// Wires every port to one adapter that implements them all.
    pub fn from_adapter<A>(config: Arc<Config>, adapter: Arc<A>) -> Self
    where
        A: StudentRepository
            + CampaignRepository
            + ChallengeRepository
            + ClientStorage
            + 'static,
    {
        Self {
            config,
            students: adapter.clone(),
            campaigns: adapter.clone(),
            challenges: adapter.clone(),
            client_storage: adapter,
            notifier: Arc::new(TracingNotifier),
            wizards: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn in_memory(config: Arc<Config>) -> Self {
        Self::from_adapter(config, Arc::new(MemoryAdapter::new()))
    }

    /// Sweeps the registry once, returning how many wizards were dropped.
    pub async fn evict_idle_wizards(&self) -> usize {
        let evicted = evict_idle(&mut *self.wizards.lock().await, self.config.wizard_idle_ttl);
        if evicted > 0 {
            info!(evicted, "Dropped idle profile wizards");
        }
        evicted
    }

    /// Runs `evict_idle_wizards` every `period` until the runtime shuts down.
    pub fn spawn_wizard_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                self.evict_idle_wizards().await;
            }
        })
    }

    /// A fresh role session for one browser. Its in-memory copy starts empty,
    /// so reads fall back to the client's durable storage.
    pub fn role_session(&self, client_id: &str) -> RoleSession {
        RoleSession::new(
            self.client_storage.for_client(client_id),
            self.config.override_policy,
        )
    }
}

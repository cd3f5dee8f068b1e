//! crates/eco_portal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the platform's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of browser storage, databases or toast surfaces.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::domain::{
    Campaign, CampaignStatus, Challenge, NewCampaign, NewChallenge, Notification, ProfileDraft,
    StudentProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable client-side storage, scoped to one browser.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    /// Overwrites any previous value.
    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Stores a profile under `id`, replacing whatever was there.
    async fn save_profile(&self, id: Uuid, draft: ProfileDraft) -> PortResult<StudentProfile>;

    async fn get_profile(&self, id: Uuid) -> PortResult<StudentProfile>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn list_campaigns(&self) -> PortResult<Vec<Campaign>>;

    async fn create_campaign(&self, campaign: NewCampaign) -> PortResult<Campaign>;

    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> PortResult<Campaign>;
}

#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    async fn list_challenges(&self) -> PortResult<Vec<Challenge>>;

    async fn create_challenge(&self, challenge: NewChallenge) -> PortResult<Challenge>;
}

/// Fire-and-forget toast surface. Never awaited, never retried.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Receives the wizard's upward events.
pub trait WizardObserver: Send + Sync {
    /// Called when the user backs out of the first step.
    fn on_cancel(&self);

    /// Called once the submitted profile has been stored.
    fn on_profile_created(&self, profile: &StudentProfile);
}

//=========================================================================================
// In-Memory Key-Value Store
//=========================================================================================

/// A process-local `KeyValueStore`, handy for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

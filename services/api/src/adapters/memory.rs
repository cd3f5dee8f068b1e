//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of the persistence ports. Used when no
//! `DATABASE_URL` is configured, and by the handler tests.

use async_trait::async_trait;
use chrono::Utc;
use eco_portal_core::domain::{
    Campaign, CampaignStatus, Challenge, NewCampaign, NewChallenge, ProfileDraft, StudentProfile,
};
use eco_portal_core::ports::{
    CampaignRepository, ChallengeRepository, KeyValueStore, MemoryKeyValueStore, PortError,
    PortResult, StudentRepository,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ClientStorage;

#[derive(Default)]
pub struct MemoryAdapter {
    students: RwLock<HashMap<Uuid, StudentProfile>>,
    campaigns: RwLock<Vec<Campaign>>,
    challenges: RwLock<Vec<Challenge>>,
    clients: Mutex<HashMap<String, Arc<MemoryKeyValueStore>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudentRepository for MemoryAdapter {
    async fn save_profile(&self, id: Uuid, draft: ProfileDraft) -> PortResult<StudentProfile> {
        let profile = StudentProfile::from_draft(id, draft);
        self.students.write().await.insert(id, profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, id: Uuid) -> PortResult<StudentProfile> {
        self.students
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", id)))
    }
}

#[async_trait]
impl CampaignRepository for MemoryAdapter {
    async fn list_campaigns(&self) -> PortResult<Vec<Campaign>> {
        let mut campaigns = self.campaigns.read().await.clone();
        campaigns.reverse();
        Ok(campaigns)
    }

    async fn create_campaign(&self, campaign: NewCampaign) -> PortResult<Campaign> {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            title: campaign.title,
            description: campaign.description,
            organizer: campaign.organizer,
            status: CampaignStatus::Draft,
            created_at: Utc::now(),
        };
        self.campaigns.write().await.push(campaign.clone());
        Ok(campaign)
    }

    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> PortResult<Campaign> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Campaign {} not found", id)))?;
        campaign.status = status;
        Ok(campaign.clone())
    }
}

#[async_trait]
impl ChallengeRepository for MemoryAdapter {
    async fn list_challenges(&self) -> PortResult<Vec<Challenge>> {
        let mut challenges = self.challenges.read().await.clone();
        challenges.reverse();
        Ok(challenges)
    }

    async fn create_challenge(&self, challenge: NewChallenge) -> PortResult<Challenge> {
        let challenge = Challenge {
            id: Uuid::new_v4(),
            title: challenge.title,
            description: challenge.description,
            points: challenge.points,
            created_by: challenge.created_by,
            created_at: Utc::now(),
        };
        self.challenges.write().await.push(challenge.clone());
        Ok(challenge)
    }
}

impl ClientStorage for MemoryAdapter {
    fn for_client(&self, client_id: &str) -> Arc<dyn KeyValueStore> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let store = clients.entry(client_id.to_string()).or_default().clone();
        store
    }
}

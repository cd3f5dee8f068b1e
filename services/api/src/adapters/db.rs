//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the persistence ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eco_portal_core::domain::{
    Achievement, Campaign, CampaignStatus, Challenge, NewCampaign, NewChallenge, ProfileDraft,
    ProfileFields, StudentProfile, WasteLogEntry,
};
use eco_portal_core::ports::{
    CampaignRepository, ChallengeRepository, KeyValueStore, PortError, PortResult,
    StudentRepository,
};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::ClientStorage;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct AchievementRecord {
    title: String,
    description: String,
    earned_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct WasteLogRecord {
    category: String,
    weight_kg: f64,
    logged_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct StudentRecord {
    id: Uuid,
    name: String,
    grade: String,
    school: String,
    avatar: String,
    bio: String,
    favorite_subject: String,
    environmental_goal: String,
    eco_points: i32,
    level: i32,
    achievements: Json<Vec<AchievementRecord>>,
    waste_logs: Json<Vec<WasteLogRecord>>,
    completed_challenges: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl StudentRecord {
    fn to_domain(self) -> StudentProfile {
        StudentProfile {
            id: self.id,
            fields: ProfileFields {
                name: self.name,
                grade: self.grade,
                school: self.school,
                avatar: self.avatar,
                bio: self.bio,
                favorite_subject: self.favorite_subject,
                environmental_goal: self.environmental_goal,
            },
            eco_points: self.eco_points.max(0) as u32,
            level: self.level.max(0) as u32,
            achievements: self
                .achievements
                .0
                .into_iter()
                .map(|a| Achievement {
                    title: a.title,
                    description: a.description,
                    earned_at: a.earned_at,
                })
                .collect(),
            waste_logs: self
                .waste_logs
                .0
                .into_iter()
                .map(|w| WasteLogEntry {
                    category: w.category,
                    weight_kg: w.weight_kg,
                    logged_at: w.logged_at,
                })
                .collect(),
            completed_challenges: self.completed_challenges,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CampaignRecord {
    id: Uuid,
    title: String,
    description: String,
    organizer: String,
    status: String,
    created_at: DateTime<Utc>,
}
impl CampaignRecord {
    fn to_domain(self) -> PortResult<Campaign> {
        let status = self
            .status
            .parse::<CampaignStatus>()
            .map_err(PortError::Unexpected)?;
        Ok(Campaign {
            id: self.id,
            title: self.title,
            description: self.description,
            organizer: self.organizer,
            status,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ChallengeRecord {
    id: Uuid,
    title: String,
    description: String,
    points: i32,
    created_by: String,
    created_at: DateTime<Utc>,
}
impl ChallengeRecord {
    fn to_domain(self) -> Challenge {
        Challenge {
            id: self.id,
            title: self.title,
            description: self.description,
            points: self.points.max(0) as u32,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

const STUDENT_COLUMNS: &str = "id, name, grade, school, avatar, bio, favorite_subject, \
    environmental_goal, eco_points, level, achievements, waste_logs, completed_challenges, created_at";

//=========================================================================================
// `StudentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudentRepository for DbAdapter {
    async fn save_profile(&self, id: Uuid, draft: ProfileDraft) -> PortResult<StudentProfile> {
        // The columns are INTEGER; refuse rather than wrap.
        let eco_points = i32::try_from(draft.eco_points).map_err(|_| {
            PortError::Conflict(format!("{} eco points is too many", draft.eco_points))
        })?;
        let level = i32::try_from(draft.level)
            .map_err(|_| PortError::Conflict(format!("level {} is too high", draft.level)))?;

        let achievements: Vec<AchievementRecord> = draft
            .achievements
            .into_iter()
            .map(|a| AchievementRecord {
                title: a.title,
                description: a.description,
                earned_at: a.earned_at,
            })
            .collect();
        let waste_logs: Vec<WasteLogRecord> = draft
            .waste_logs
            .into_iter()
            .map(|w| WasteLogRecord {
                category: w.category,
                weight_kg: w.weight_kg,
                logged_at: w.logged_at,
            })
            .collect();

        let query = format!(
            "INSERT INTO student_profiles ({STUDENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, grade = EXCLUDED.grade, school = EXCLUDED.school, \
                avatar = EXCLUDED.avatar, bio = EXCLUDED.bio, \
                favorite_subject = EXCLUDED.favorite_subject, \
                environmental_goal = EXCLUDED.environmental_goal, \
                eco_points = EXCLUDED.eco_points, level = EXCLUDED.level, \
                achievements = EXCLUDED.achievements, waste_logs = EXCLUDED.waste_logs, \
                completed_challenges = EXCLUDED.completed_challenges, \
                created_at = EXCLUDED.created_at \
             RETURNING {STUDENT_COLUMNS}"
        );

        let record = sqlx::query_as::<_, StudentRecord>(&query)
            .bind(id)
            .bind(draft.fields.name)
            .bind(draft.fields.grade)
            .bind(draft.fields.school)
            .bind(draft.fields.avatar)
            .bind(draft.fields.bio)
            .bind(draft.fields.favorite_subject)
            .bind(draft.fields.environmental_goal)
            .bind(eco_points)
            .bind(level)
            .bind(Json(achievements))
            .bind(Json(waste_logs))
            .bind(draft.completed_challenges)
            .bind(draft.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn get_profile(&self, id: Uuid) -> PortResult<StudentProfile> {
        let query = format!("SELECT {STUDENT_COLUMNS} FROM student_profiles WHERE id = $1");
        let record = sqlx::query_as::<_, StudentRecord>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Student {} not found", id))
                }
                _ => unexpected(e),
            })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `CampaignRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl CampaignRepository for DbAdapter {
    async fn list_campaigns(&self) -> PortResult<Vec<Campaign>> {
        let records = sqlx::query_as::<_, CampaignRecord>(
            "SELECT id, title, description, organizer, status, created_at FROM campaigns ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_campaign(&self, campaign: NewCampaign) -> PortResult<Campaign> {
        let record = sqlx::query_as::<_, CampaignRecord>(
            "INSERT INTO campaigns (id, title, description, organizer, status) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, title, description, organizer, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(campaign.title)
        .bind(campaign.description)
        .bind(campaign.organizer)
        .bind(CampaignStatus::Draft.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> PortResult<Campaign> {
        let record = sqlx::query_as::<_, CampaignRecord>(
            "UPDATE campaigns SET status = $1 WHERE id = $2 \
             RETURNING id, title, description, organizer, status, created_at",
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Campaign {} not found", id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }
}

//=========================================================================================
// `ChallengeRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChallengeRepository for DbAdapter {
    async fn list_challenges(&self) -> PortResult<Vec<Challenge>> {
        let records = sqlx::query_as::<_, ChallengeRecord>(
            "SELECT id, title, description, points, created_by, created_at FROM challenges ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_challenge(&self, challenge: NewChallenge) -> PortResult<Challenge> {
        let points = i32::try_from(challenge.points)
            .map_err(|_| PortError::Conflict(format!("{} points is too many", challenge.points)))?;
        let record = sqlx::query_as::<_, ChallengeRecord>(
            "INSERT INTO challenges (id, title, description, points, created_by) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, title, description, points, created_by, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(challenge.title)
        .bind(challenge.description)
        .bind(points)
        .bind(challenge.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// Per-Client Key-Value Storage
//=========================================================================================

/// The `client_storage` rows belonging to one browser.
pub struct PgClientStore {
    pool: PgPool,
    client_id: String,
}

#[async_trait]
impl KeyValueStore for PgClientStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT value FROM client_storage WHERE client_id = $1 AND key = $2",
        )
        .bind(&self.client_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO client_storage (client_id, key, value) VALUES ($1, $2, $3) \
             ON CONFLICT (client_id, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(&self.client_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM client_storage WHERE client_id = $1 AND key = $2")
            .bind(&self.client_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

impl ClientStorage for DbAdapter {
    fn for_client(&self, client_id: &str) -> Arc<dyn KeyValueStore> {
        Arc::new(PgClientStore {
            pool: self.pool.clone(),
            client_id: client_id.to_string(),
        })
    }
}

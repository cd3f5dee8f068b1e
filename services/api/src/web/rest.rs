//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the student, campaign and challenge
//! endpoints, the shared payload structs, and the master definition for the
//! OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use eco_portal_core::domain::{
    Campaign, CampaignStatus, Challenge, NewCampaign, NewChallenge, ProfileFields, StudentProfile,
};
use eco_portal_core::ports::PortError;
use eco_portal_core::wizard::build_draft;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{session, wizard};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        session::resolve_handler,
        session::navigate_handler,
        session::select_role_handler,
        session::clear_role_handler,
        wizard::create_wizard_handler,
        wizard::get_wizard_handler,
        wizard::update_fields_handler,
        wizard::advance_handler,
        wizard::retreat_handler,
        wizard::submit_handler,
        put_student_handler,
        get_student_handler,
        list_campaigns_handler,
        create_campaign_handler,
        update_campaign_status_handler,
        list_challenges_handler,
        create_challenge_handler,
    ),
    components(
        schemas(
            session::IdentityPayload,
            session::ResolveRequest,
            session::ResolveResponse,
            session::NavigateRequest,
            session::NavigateResponse,
            session::SelectRoleRequest,
            wizard::CreateWizardRequest,
            wizard::FieldsPatch,
            wizard::WizardView,
            wizard::TransitionResponse,
            StudentItem,
            StudentDraftRequest,
            CampaignItem,
            CampaignList,
            CreateCampaignRequest,
            UpdateCampaignStatusRequest,
            ChallengeItem,
            ChallengeList,
            CreateChallengeRequest,
        )
    ),
    tags(
        (name = "Eco Portal API", description = "Session roles, profile wizard and content endpoints.")
    )
)]
pub struct ApiDoc;

/// Maps a port failure to an HTTP error, logging the detail.
pub(crate) fn port_error(e: PortError, action: &str) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unexpected(msg) => {
            error!("Failed to {}: {}", action, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", action),
            )
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Clone, Debug, Default, PartialEq)]
pub struct ProfileFieldsDto {
    pub name: String,
    pub grade: String,
    pub school: String,
    pub avatar: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub favorite_subject: String,
    #[serde(default)]
    pub environmental_goal: String,
}

impl From<&ProfileFields> for ProfileFieldsDto {
    fn from(f: &ProfileFields) -> Self {
        Self {
            name: f.name.clone(),
            grade: f.grade.clone(),
            school: f.school.clone(),
            avatar: f.avatar.clone(),
            bio: f.bio.clone(),
            favorite_subject: f.favorite_subject.clone(),
            environmental_goal: f.environmental_goal.clone(),
        }
    }
}

impl From<ProfileFieldsDto> for ProfileFields {
    fn from(f: ProfileFieldsDto) -> Self {
        Self {
            name: f.name,
            grade: f.grade,
            school: f.school,
            avatar: f.avatar,
            bio: f.bio,
            favorite_subject: f.favorite_subject,
            environmental_goal: f.environmental_goal,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct AchievementDto {
    pub title: String,
    pub description: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct WasteLogDto {
    pub category: String,
    pub weight_kg: f64,
    pub logged_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct StudentDto {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: ProfileFieldsDto,
    pub eco_points: u32,
    pub level: u32,
    pub achievements: Vec<AchievementDto>,
    pub waste_logs: Vec<WasteLogDto>,
    pub completed_challenges: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<StudentProfile> for StudentDto {
    fn from(p: StudentProfile) -> Self {
        Self {
            id: p.id,
            fields: ProfileFieldsDto::from(&p.fields),
            eco_points: p.eco_points,
            level: p.level,
            achievements: p
                .achievements
                .into_iter()
                .map(|a| AchievementDto {
                    title: a.title,
                    description: a.description,
                    earned_at: a.earned_at,
                })
                .collect(),
            waste_logs: p
                .waste_logs
                .into_iter()
                .map(|w| WasteLogDto {
                    category: w.category,
                    weight_kg: w.weight_kg,
                    logged_at: w.logged_at,
                })
                .collect(),
            completed_challenges: p.completed_challenges,
            created_at: p.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct StudentItem {
    pub item: StudentDto,
}

/// A profile written directly, bypassing the wizard.
#[derive(Deserialize, ToSchema)]
pub struct StudentDraftRequest {
    #[serde(flatten)]
    pub fields: ProfileFieldsDto,
    pub eco_points: Option<u32>,
    pub level: Option<u32>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CampaignDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub organizer: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignDto {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            organizer: c.organizer,
            status: c.status.as_str().to_string(),
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CampaignItem {
    pub item: CampaignDto,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CampaignList {
    pub items: Vec<CampaignDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCampaignRequest {
    pub title: String,
    pub description: String,
    pub organizer: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateCampaignStatusRequest {
    pub status: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ChallengeDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<Challenge> for ChallengeDto {
    fn from(c: Challenge) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            points: c.points,
            created_by: c.created_by,
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ChallengeItem {
    pub item: ChallengeDto,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ChallengeList {
    pub items: Vec<ChallengeDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateChallengeRequest {
    pub title: String,
    pub description: String,
    pub points: u32,
    pub created_by: String,
}

fn require_text(value: &str, field: &str) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, format!("{} is required", field)));
    }
    Ok(())
}

/// Counts are stored in signed 32-bit columns.
pub const MAX_STORED_COUNT: u32 = i32::MAX as u32;

fn require_storable(value: u32, field: &str) -> Result<u32, (StatusCode, String)> {
    if value > MAX_STORED_COUNT {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} must be at most {}", field, MAX_STORED_COUNT),
        ));
    }
    Ok(value)
}

//=========================================================================================
// Student Handlers
//=========================================================================================

/// PUT /api/students/{id} - Store a student profile
#[utoipa::path(
    put,
    path = "/api/students/{id}",
    request_body = StudentDraftRequest,
    responses(
        (status = 200, description = "Profile stored", body = StudentItem),
        (status = 400, description = "Points or level out of range"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = Uuid, Path, description = "The student id."))
)]
pub async fn put_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StudentDraftRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut draft = build_draft(req.fields.into(), Utc::now());
    if let Some(points) = req.eco_points {
        draft.eco_points = require_storable(points, "eco_points")?;
    }
    if let Some(level) = req.level {
        draft.level = require_storable(level, "level")?;
    }

    let profile = state
        .students
        .save_profile(id, draft)
        .await
        .map_err(|e| port_error(e, "save student profile"))?;

    Ok(Json(StudentItem {
        item: profile.into(),
    }))
}

/// GET /api/students/{id} - Fetch a student profile
#[utoipa::path(
    get,
    path = "/api/students/{id}",
    responses(
        (status = 200, description = "Profile found", body = StudentItem),
        (status = 404, description = "No such student")
    ),
    params(("id" = Uuid, Path, description = "The student id."))
)]
pub async fn get_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .students
        .get_profile(id)
        .await
        .map_err(|e| port_error(e, "load student profile"))?;

    Ok(Json(StudentItem {
        item: profile.into(),
    }))
}

//=========================================================================================
// Campaign Handlers
//=========================================================================================

/// GET /api/campaigns - List campaigns, newest first
#[utoipa::path(
    get,
    path = "/api/campaigns",
    responses((status = 200, description = "All campaigns", body = CampaignList))
)]
pub async fn list_campaigns_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let campaigns = state
        .campaigns
        .list_campaigns()
        .await
        .map_err(|e| port_error(e, "list campaigns"))?;

    Ok(Json(CampaignList {
        items: campaigns.into_iter().map(CampaignDto::from).collect(),
    }))
}

/// POST /api/campaigns - Create a draft campaign
#[utoipa::path(
    post,
    path = "/api/campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created", body = CampaignItem),
        (status = 400, description = "Missing title or organizer")
    )
)]
pub async fn create_campaign_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_text(&req.title, "title")?;
    require_text(&req.organizer, "organizer")?;

    let campaign = state
        .campaigns
        .create_campaign(NewCampaign {
            title: req.title,
            description: req.description,
            organizer: req.organizer,
        })
        .await
        .map_err(|e| port_error(e, "create campaign"))?;

    Ok((
        StatusCode::CREATED,
        Json(CampaignItem {
            item: campaign.into(),
        }),
    ))
}

/// PUT /api/campaigns/{id}/status - Move a campaign to a new status
#[utoipa::path(
    put,
    path = "/api/campaigns/{id}/status",
    request_body = UpdateCampaignStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = CampaignItem),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "No such campaign")
    ),
    params(("id" = Uuid, Path, description = "The campaign id."))
)]
pub async fn update_campaign_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaignStatusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = req
        .status
        .parse::<CampaignStatus>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let campaign = state
        .campaigns
        .update_campaign_status(id, status)
        .await
        .map_err(|e| port_error(e, "update campaign status"))?;

    Ok(Json(CampaignItem {
        item: campaign.into(),
    }))
}

//=========================================================================================
// Challenge Handlers
//=========================================================================================

/// GET /api/challenges - List challenges, newest first
#[utoipa::path(
    get,
    path = "/api/challenges",
    responses((status = 200, description = "All challenges", body = ChallengeList))
)]
pub async fn list_challenges_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let challenges = state
        .challenges
        .list_challenges()
        .await
        .map_err(|e| port_error(e, "list challenges"))?;

    Ok(Json(ChallengeList {
        items: challenges.into_iter().map(ChallengeDto::from).collect(),
    }))
}

/// POST /api/challenges - Create a challenge
#[utoipa::path(
    post,
    path = "/api/challenges",
    request_body = CreateChallengeRequest,
    responses(
        (status = 201, description = "Challenge created", body = ChallengeItem),
        (status = 400, description = "Missing title or too many points")
    )
)]
pub async fn create_challenge_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_text(&req.title, "title")?;
    let points = require_storable(req.points, "points")?;

    let challenge = state
        .challenges
        .create_challenge(NewChallenge {
            title: req.title,
            description: req.description,
            points,
            created_by: req.created_by,
        })
        .await
        .map_err(|e| port_error(e, "create challenge"))?;

    Ok((
        StatusCode::CREATED,
        Json(ChallengeItem {
            item: challenge.into(),
        }),
    ))
}

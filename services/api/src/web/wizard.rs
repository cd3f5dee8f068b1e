//! services/api/src/web/wizard.rs
//!
//! HTTP surface of the guided profile wizard. Each wizard lives in the shared
//! registry until it is cancelled or its profile has been created.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use eco_portal_core::wizard::{AVATAR_OPTIONS, LAST_STEP};
use eco_portal_core::{
    ProfileDraft, ProfileWizard, SubmissionOutcome, Transition, WizardError, WizardField,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::TracingWizardObserver;
use crate::web::rest::{ProfileFieldsDto, StudentItem};
use crate::web::state::{evict_idle, AppState, OpenWizard};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateWizardRequest {
    pub student_id: Uuid,
}

/// Only the fields present are changed.
#[derive(Deserialize, ToSchema, Default)]
pub struct FieldsPatch {
    pub name: Option<String>,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub favorite_subject: Option<String>,
    pub environmental_goal: Option<String>,
}

impl FieldsPatch {
    fn into_updates(self) -> Vec<(WizardField, String)> {
        [
            (WizardField::Name, self.name),
            (WizardField::Grade, self.grade),
            (WizardField::School, self.school),
            (WizardField::Avatar, self.avatar),
            (WizardField::Bio, self.bio),
            (WizardField::FavoriteSubject, self.favorite_subject),
            (WizardField::EnvironmentalGoal, self.environmental_goal),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }
}

/// Everything the client needs to render the current step.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct WizardView {
    pub wizard_id: Uuid,
    pub student_id: Uuid,
    pub current_step: usize,
    pub total_steps: usize,
    pub step_key: String,
    pub step_title: String,
    pub fields: ProfileFieldsDto,
    pub avatar_options: Vec<String>,
    pub submitting: bool,
    pub can_advance: bool,
    pub can_submit: bool,
}

impl WizardView {
    fn of(wizard_id: Uuid, wizard: &ProfileWizard) -> Self {
        let step = wizard.step();
        Self {
            wizard_id,
            student_id: wizard.student_id(),
            current_step: wizard.current_step(),
            total_steps: LAST_STEP,
            step_key: step.key.to_string(),
            step_title: step.title.to_string(),
            fields: ProfileFieldsDto::from(wizard.fields()),
            avatar_options: AVATAR_OPTIONS.iter().map(|a| a.to_string()).collect(),
            submitting: wizard.is_submitting(),
            can_advance: wizard.can_advance(),
            can_submit: wizard.can_submit(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TransitionResponse {
    /// One of `moved`, `blocked`, `stayed`, `cancelled`.
    pub transition: String,
    /// Absent once the wizard has been cancelled.
    pub wizard: Option<WizardView>,
}

fn transition_name(transition: Transition) -> &'static str {
    match transition {
        Transition::Moved(_) => "moved",
        Transition::Blocked => "blocked",
        Transition::Stayed => "stayed",
        Transition::Cancelled => "cancelled",
    }
}

fn wizard_error(e: WizardError) -> (StatusCode, String) {
    let status = match e {
        WizardError::UnknownAvatar(_) => StatusCode::BAD_REQUEST,
        WizardError::NotAtFinalStep(_)
        | WizardError::SubmissionInFlight
        | WizardError::Finished => StatusCode::CONFLICT,
    };
    (status, e.to_string())
}

fn not_found(wizard_id: Uuid) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("Wizard {} not found", wizard_id),
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/wizards - Start a profile wizard
#[utoipa::path(
    post,
    path = "/api/wizards",
    request_body = CreateWizardRequest,
    responses((status = 201, description = "Wizard started", body = WizardView))
)]
pub async fn create_wizard_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWizardRequest>,
) -> impl IntoResponse {
    let wizard_id = Uuid::new_v4();
    let observer = Arc::new(TracingWizardObserver { wizard_id });
    let wizard = ProfileWizard::new(req.student_id, observer);
    let view = WizardView::of(wizard_id, &wizard);

    let mut wizards = state.wizards.lock().await;
    let evicted = evict_idle(&mut wizards, state.config.wizard_idle_ttl);
    wizards.insert(wizard_id, OpenWizard::new(wizard));
    info!(%wizard_id, student_id = %req.student_id, evicted, "Profile wizard started");

    (StatusCode::CREATED, Json(view))
}

/// GET /api/wizards/{id} - Current wizard state
#[utoipa::path(
    get,
    path = "/api/wizards/{id}",
    responses(
        (status = 200, description = "Wizard state", body = WizardView),
        (status = 404, description = "No such wizard")
    ),
    params(("id" = Uuid, Path, description = "The wizard id."))
)]
pub async fn get_wizard_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards
        .get_mut(&wizard_id)
        .map(OpenWizard::touch)
        .ok_or_else(|| not_found(wizard_id))?;
    Ok(Json(WizardView::of(wizard_id, wizard)))
}

/// PATCH /api/wizards/{id}/fields - Update some of the collected fields
#[utoipa::path(
    patch,
    path = "/api/wizards/{id}/fields",
    request_body = FieldsPatch,
    responses(
        (status = 200, description = "Fields updated", body = WizardView),
        (status = 400, description = "Unknown avatar"),
        (status = 404, description = "No such wizard"),
        (status = 409, description = "Submission in flight")
    ),
    params(("id" = Uuid, Path, description = "The wizard id."))
)]
pub async fn update_fields_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<Uuid>,
    Json(patch): Json<FieldsPatch>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards
        .get_mut(&wizard_id)
        .map(OpenWizard::touch)
        .ok_or_else(|| not_found(wizard_id))?;

    for (field, value) in patch.into_updates() {
        wizard.update_field(field, value).map_err(wizard_error)?;
    }
    Ok(Json(WizardView::of(wizard_id, wizard)))
}

/// POST /api/wizards/{id}/advance - Move to the next step if this one validates
#[utoipa::path(
    post,
    path = "/api/wizards/{id}/advance",
    responses(
        (status = 200, description = "Transition applied", body = TransitionResponse),
        (status = 404, description = "No such wizard")
    ),
    params(("id" = Uuid, Path, description = "The wizard id."))
)]
pub async fn advance_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards
        .get_mut(&wizard_id)
        .map(OpenWizard::touch)
        .ok_or_else(|| not_found(wizard_id))?;

    let transition = wizard.advance();
    debug!(%wizard_id, ?transition, "advance");
    Ok(Json(TransitionResponse {
        transition: transition_name(transition).to_string(),
        wizard: Some(WizardView::of(wizard_id, wizard)),
    }))
}

/// POST /api/wizards/{id}/retreat - Go back a step, or cancel from the first one
#[utoipa::path(
    post,
    path = "/api/wizards/{id}/retreat",
    responses(
        (status = 200, description = "Transition applied", body = TransitionResponse),
        (status = 404, description = "No such wizard")
    ),
    params(("id" = Uuid, Path, description = "The wizard id."))
)]
pub async fn retreat_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards
        .get_mut(&wizard_id)
        .map(OpenWizard::touch)
        .ok_or_else(|| not_found(wizard_id))?;

    let transition = wizard.retreat();
    debug!(%wizard_id, ?transition, "retreat");
    let view = match transition {
        Transition::Cancelled => {
            wizards.remove(&wizard_id);
            None
        }
        _ => Some(WizardView::of(wizard_id, wizard)),
    };

    Ok(Json(TransitionResponse {
        transition: transition_name(transition).to_string(),
        wizard: view,
    }))
}

/// POST /api/wizards/{id}/submit - Create the student profile
///
/// The registry lock is released while the repository call is outstanding;
/// the wizard's own `submitting` flag turns away concurrent submits.
#[utoipa::path(
    post,
    path = "/api/wizards/{id}/submit",
    responses(
        (status = 201, description = "Profile created", body = StudentItem),
        (status = 404, description = "No such wizard"),
        (status = 409, description = "Not on the last step, or already submitting"),
        (status = 500, description = "Internal server error"),
        (status = 502, description = "Profile could not be stored; retry is allowed")
    ),
    params(("id" = Uuid, Path, description = "The wizard id."))
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Path(wizard_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Lock the wizard for submission and take its draft
    let (student_id, draft) = {
        let mut wizards = state.wizards.lock().await;
        let wizard = wizards
            .get_mut(&wizard_id)
            .map(OpenWizard::touch)
            .ok_or_else(|| not_found(wizard_id))?;
        let draft = wizard.begin_submission().map_err(wizard_error)?;
        (wizard.student_id(), draft)
    };

    // 2. Store and settle on a detached task; it runs to completion even if
    //    this request is dropped
    let outcome = tokio::spawn(store_and_settle(state, wizard_id, student_id, draft))
        .await
        .map_err(|e| {
            error!(%wizard_id, "Submission task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create profile".to_string(),
            )
        })?;

    match outcome.ok_or_else(|| not_found(wizard_id))? {
        SubmissionOutcome::Created(profile) => Ok((
            StatusCode::CREATED,
            Json(StudentItem {
                item: profile.into(),
            }),
        )),
        SubmissionOutcome::Failed(_) => Err((
            StatusCode::BAD_GATEWAY,
            "Failed to create profile. Please try again.".to_string(),
        )),
    }
}

/// Hands the draft to the repository and applies the result to the wizard.
/// `None` only if the wizard vanished, which eviction rules out while submitting.
async fn store_and_settle(
    state: Arc<AppState>,
    wizard_id: Uuid,
    student_id: Uuid,
    draft: ProfileDraft,
) -> Option<SubmissionOutcome> {
    let result = state.students.save_profile(student_id, draft).await;

    let mut wizards = state.wizards.lock().await;
    let outcome = wizards
        .get_mut(&wizard_id)?
        .touch()
        .complete_submission(result, state.notifier.as_ref());
    if let SubmissionOutcome::Created(_) = outcome {
        wizards.remove(&wizard_id);
    }
    Some(outcome)
}

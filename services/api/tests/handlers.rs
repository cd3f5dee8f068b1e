//! Integration tests for the HTTP handlers, backed by the in-memory adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_lib::config::Config;
use api_lib::web::middleware::ClientId;
use api_lib::web::rest::{
    self, CampaignItem, CampaignList, ChallengeItem, ChallengeList, CreateCampaignRequest,
    CreateChallengeRequest, ProfileFieldsDto, StudentDraftRequest, StudentItem,
    UpdateCampaignStatusRequest, MAX_STORED_COUNT,
};
use api_lib::web::session::{
    self, IdentityPayload, NavigateRequest, NavigateResponse, ResolveRequest, ResolveResponse,
    SelectRoleRequest,
};
use api_lib::web::state::AppState;
use api_lib::web::wizard::{
    self, CreateWizardRequest, FieldsPatch, TransitionResponse, WizardView,
};
use api_lib::web::api_router;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use eco_portal_core::{PortError, PortResult, ProfileDraft, StudentProfile, StudentRepository};
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use uuid::Uuid;

// =========================================================================
// Helpers
// =========================================================================

fn test_state() -> AppState {
    let config = Config::from_lookup(|_| None).expect("default config");
    AppState::in_memory(Arc::new(config))
}

fn state_with_idle_ttl(ttl: Duration) -> AppState {
    let mut config = Config::from_lookup(|_| None).expect("default config");
    config.wizard_idle_ttl = ttl;
    AppState::in_memory(Arc::new(config))
}

fn with_students(repo: Arc<ScriptedRepository>) -> Arc<AppState> {
    let mut state = test_state();
    state.students = repo;
    Arc::new(state)
}

fn client(id: &str) -> Extension<ClientId> {
    Extension(ClientId(id.to_string()))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn identity(email: &str) -> IdentityPayload {
    IdentityPayload {
        id: "user-1".to_string(),
        email: Some(email.to_string()),
        ..Default::default()
    }
}

/// Counts calls; the first `failures` calls fail, each call takes `delay`.
struct ScriptedRepository {
    failures: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedRepository {
    fn new(failures: usize, delay: Duration) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

#[async_trait]
impl StudentRepository for ScriptedRepository {
    async fn save_profile(&self, id: Uuid, draft: ProfileDraft) -> PortResult<StudentProfile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PortError::Unexpected("connection reset".into()));
        }
        Ok(StudentProfile::from_draft(id, draft))
    }

    async fn get_profile(&self, id: Uuid) -> PortResult<StudentProfile> {
        Err(PortError::NotFound(id.to_string()))
    }
}

async fn start_wizard(state: &Arc<AppState>) -> WizardView {
    let response = wizard::create_wizard_handler(
        State(state.clone()),
        Json(CreateWizardRequest {
            student_id: Uuid::new_v4(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

async fn fill_and_walk_to_last_step(state: &Arc<AppState>, wizard_id: Uuid) {
    let patch = FieldsPatch {
        name: Some("Ravi".into()),
        grade: Some("9".into()),
        school: Some("Hillside Academy".into()),
        environmental_goal: Some("Plant 10 trees".into()),
        ..Default::default()
    };
    let response =
        wizard::update_fields_handler(State(state.clone()), Path(wizard_id), Json(patch))
            .await
            .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    for expected in 2..=4 {
        let response = wizard::advance_handler(State(state.clone()), Path(wizard_id))
            .await
            .into_response();
        let body: TransitionResponse = read_json(response).await;
        assert_eq!(body.transition, "moved");
        assert_eq!(body.wizard.map(|w| w.current_step), Some(expected));
    }
}

async fn submit(state: &Arc<AppState>, wizard_id: Uuid) -> Response {
    wizard::submit_handler(State(state.clone()), Path(wizard_id))
        .await
        .into_response()
}

async fn get_wizard(state: &Arc<AppState>, wizard_id: Uuid) -> Response {
    wizard::get_wizard_handler(State(state.clone()), Path(wizard_id))
        .await
        .into_response()
}

fn student_request(eco_points: Option<u32>, level: Option<u32>) -> StudentDraftRequest {
    StudentDraftRequest {
        fields: ProfileFieldsDto {
            name: "Lena".into(),
            grade: "7".into(),
            school: "Northside Middle".into(),
            avatar: "🌳".into(),
            ..Default::default()
        },
        eco_points,
        level,
    }
}

async fn put_student(state: &Arc<AppState>, id: Uuid, req: StudentDraftRequest) -> Response {
    rest::put_student_handler(State(state.clone()), Path(id), Json(req))
        .await
        .into_response()
}

// =========================================================================
// Session roles
// =========================================================================

#[tokio::test]
async fn picked_role_is_remembered_for_the_browser() {
    let state = Arc::new(test_state());

    let response = session::select_role_handler(
        State(state.clone()),
        client("browser-a"),
        Json(SelectRoleRequest {
            role: "Teacher".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = session::resolve_handler(
        State(state.clone()),
        client("browser-a"),
        Json(ResolveRequest {
            identity: Some(identity("kid@gmail.com")),
        }),
    )
    .await
    .into_response();
    let body: ResolveResponse = read_json(response).await;
    assert_eq!(body.role.as_deref(), Some("teacher"));
    assert_eq!(body.landing, "/teacher");
    assert!(body.routes.contains(&"/admin".to_string()));

    // Another browser has no override.
    let response = session::resolve_handler(
        State(state.clone()),
        client("browser-b"),
        Json(ResolveRequest {
            identity: Some(identity("kid@gmail.com")),
        }),
    )
    .await
    .into_response();
    let body: ResolveResponse = read_json(response).await;
    assert_eq!(body.role.as_deref(), Some("student"));
}

#[tokio::test]
async fn cleared_role_falls_back_to_inference() {
    let state = Arc::new(test_state());
    session::select_role_handler(
        State(state.clone()),
        client("c"),
        Json(SelectRoleRequest { role: "admin".into() }),
    )
    .await
    .into_response();
    let response = session::clear_role_handler(State(state.clone()), client("c"))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = session::resolve_handler(
        State(state.clone()),
        client("c"),
        Json(ResolveRequest {
            identity: Some(identity("contact@greenfoundation.org")),
        }),
    )
    .await
    .into_response();
    let body: ResolveResponse = read_json(response).await;
    assert_eq!(body.role.as_deref(), Some("ngo"));
}

#[tokio::test]
async fn unknown_role_is_rejected() {
    let state = Arc::new(test_state());
    let response = session::select_role_handler(
        State(state),
        client("c"),
        Json(SelectRoleRequest {
            role: "pirate".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn visitors_are_sent_home_and_members_to_their_dashboard() {
    let state = Arc::new(test_state());

    let response = session::navigate_handler(
        State(state.clone()),
        client("c"),
        Json(NavigateRequest {
            identity: None,
            path: "/student".into(),
        }),
    )
    .await
    .into_response();
    let body: NavigateResponse = read_json(response).await;
    assert_eq!((body.decision.as_str(), body.path.as_str()), ("redirect", "/"));

    let response = session::navigate_handler(
        State(state.clone()),
        client("c"),
        Json(NavigateRequest {
            identity: Some(identity("help@charity.org")),
            path: "/".into(),
        }),
    )
    .await
    .into_response();
    let body: NavigateResponse = read_json(response).await;
    assert_eq!((body.decision.as_str(), body.path.as_str()), ("redirect", "/ngo"));

    let response = session::navigate_handler(
        State(state),
        client("c"),
        Json(NavigateRequest {
            identity: Some(identity("help@charity.org")),
            path: "/admin".into(),
        }),
    )
    .await
    .into_response();
    let body: NavigateResponse = read_json(response).await;
    assert_eq!((body.decision.as_str(), body.path.as_str()), ("render", "/admin"));
}

#[tokio::test]
async fn session_routes_require_a_client_id() {
    let app = api_router(Arc::new(test_state()));
    let request = Request::builder()
        .method("POST")
        .uri("/api/session/resolve")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn client_id_header_reaches_the_handler() {
    let app = api_router(Arc::new(test_state()));
    let request = Request::builder()
        .method("POST")
        .uri("/api/session/resolve")
        .header("content-type", "application/json")
        .header("x-client-id", "browser-z")
        .body(Body::from(r#"{"identity":{"id":"u","userName":"ProfX"}}"#))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: ResolveResponse = read_json(response).await;
    assert_eq!(body.role.as_deref(), Some("teacher"));
}

// =========================================================================
// Profile wizard
// =========================================================================

#[tokio::test]
async fn wizard_creates_a_profile() {
    let state = Arc::new(test_state());
    let view = start_wizard(&state).await;
    assert_eq!(view.current_step, 1);
    assert_eq!(view.fields.avatar, view.avatar_options[0]);
    assert!(!view.can_advance);

    fill_and_walk_to_last_step(&state, view.wizard_id).await;

    let last: WizardView = read_json(get_wizard(&state, view.wizard_id).await).await;
    assert!(!last.can_advance);
    assert!(last.can_submit);

    let response = submit(&state, view.wizard_id).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: StudentItem = read_json(response).await;
    assert_eq!(created.item.id, view.student_id);
    assert_eq!(created.item.fields.name, "Ravi");
    assert_eq!(created.item.level, 1);
    assert_eq!(created.item.achievements.len(), 1);

    let response = rest::get_student_handler(State(state.clone()), Path(view.student_id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let response = wizard::get_wizard_handler(State(state), Path(view.wizard_id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_step_blocks_advance() {
    let state = Arc::new(test_state());
    let view = start_wizard(&state).await;
    let response = wizard::advance_handler(State(state), Path(view.wizard_id))
        .await
        .into_response();
    let body: TransitionResponse = read_json(response).await;
    assert_eq!(body.transition, "blocked");
    assert_eq!(body.wizard.map(|w| w.current_step), Some(1));
}

#[tokio::test]
async fn submit_before_last_step_conflicts() {
    let state = Arc::new(test_state());
    let view = start_wizard(&state).await;
    let response = submit(&state, view.wizard_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_avatar_is_rejected() {
    let state = Arc::new(test_state());
    let view = start_wizard(&state).await;
    let patch = FieldsPatch {
        avatar: Some("dragon".into()),
        ..Default::default()
    };
    let response = wizard::update_fields_handler(State(state), Path(view.wizard_id), Json(patch))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn retreat_from_first_step_discards_the_wizard() {
    let state = Arc::new(test_state());
    let view = start_wizard(&state).await;
    let response = wizard::retreat_handler(State(state.clone()), Path(view.wizard_id))
        .await
        .into_response();
    let body: TransitionResponse = read_json(response).await;
    assert_eq!(body.transition, "cancelled");
    assert!(body.wizard.is_none());
    assert!(state.wizards.lock().await.is_empty());
}

#[tokio::test]
async fn concurrent_submits_store_once() {
    let repo = Arc::new(ScriptedRepository::new(0, Duration::from_millis(20)));
    let state = with_students(repo.clone());

    let view = start_wizard(&state).await;
    fill_and_walk_to_last_step(&state, view.wizard_id).await;

    let (first, second) = tokio::join!(
        submit(&state, view.wizard_id),
        submit(&state, view.wizard_id)
    );
    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_submit_can_be_retried() {
    let repo = Arc::new(ScriptedRepository::new(1, Duration::ZERO));
    let state = with_students(repo.clone());

    let view = start_wizard(&state).await;
    fill_and_walk_to_last_step(&state, view.wizard_id).await;

    let response = submit(&state, view.wizard_id).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = wizard::get_wizard_handler(State(state.clone()), Path(view.wizard_id))
        .await
        .into_response();
    let after: WizardView = read_json(response).await;
    assert_eq!(after.current_step, 4);
    assert!(!after.submitting);
    assert!(after.can_submit);
    assert_eq!(after.fields.school, "Hillside Academy");

    let response = submit(&state, view.wizard_id).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropped_submit_still_settles_the_wizard() {
    let repo = Arc::new(ScriptedRepository::new(1, Duration::from_millis(100)));
    let state = with_students(repo.clone());

    let view = start_wizard(&state).await;
    fill_and_walk_to_last_step(&state, view.wizard_id).await;

    // The caller gives up long before the repository answers.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), submit(&state, view.wizard_id)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let after: WizardView = read_json(get_wizard(&state, view.wizard_id).await).await;
    assert!(!after.submitting);
    assert_eq!(after.current_step, 4);

    let response = submit(&state, view.wizard_id).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropped_submit_still_creates_the_profile() {
    let repo = Arc::new(ScriptedRepository::new(0, Duration::from_millis(100)));
    let state = with_students(repo.clone());

    let view = start_wizard(&state).await;
    fill_and_walk_to_last_step(&state, view.wizard_id).await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), submit(&state, view.wizard_id)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(get_wizard(&state, view.wizard_id).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(submit(&state, view.wizard_id).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Wizard registry
// =========================================================================

#[tokio::test]
async fn idle_wizards_are_dropped_when_another_starts() {
    let state = Arc::new(state_with_idle_ttl(Duration::from_millis(50)));
    let stale = start_wizard(&state).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let fresh = start_wizard(&state).await;

    assert_eq!(get_wizard(&state, stale.wizard_id).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get_wizard(&state, fresh.wizard_id).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn any_request_keeps_a_wizard_alive() {
    let state = Arc::new(state_with_idle_ttl(Duration::from_millis(300)));
    let view = start_wizard(&state).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(get_wizard(&state, view.wizard_id).await.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(200)).await;
    start_wizard(&state).await;
    assert_eq!(get_wizard(&state, view.wizard_id).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn sweep_spares_a_wizard_mid_submission() {
    let repo = Arc::new(ScriptedRepository::new(0, Duration::from_millis(100)));
    let mut state = state_with_idle_ttl(Duration::ZERO);
    state.students = repo.clone();
    let state = Arc::new(state);

    let view = start_wizard(&state).await;
    fill_and_walk_to_last_step(&state, view.wizard_id).await;

    let pending = tokio::spawn({
        let state = state.clone();
        async move { submit(&state, view.wizard_id).await.status() }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(state.evict_idle_wizards().await, 0);
    assert_eq!(pending.await.expect("submit task"), StatusCode::CREATED);

    start_wizard(&state).await;
    assert_eq!(state.evict_idle_wizards().await, 1);
    assert!(state.wizards.lock().await.is_empty());
}

// =========================================================================
// Students
// =========================================================================

#[tokio::test]
async fn stored_profile_starts_from_the_starter_state() {
    let state = Arc::new(test_state());
    let id = Uuid::new_v4();

    let response = put_student(&state, id, student_request(None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored: StudentItem = read_json(response).await;
    assert_eq!(stored.item.eco_points, 0);
    assert_eq!(stored.item.level, 1);
    assert_eq!(stored.item.achievements.len(), 1);
    assert_eq!(stored.item.achievements[0].title, "Eco Explorer");
    assert!(stored.item.waste_logs.is_empty());

    let response = put_student(&state, id, student_request(Some(120), Some(3))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = rest::get_student_handler(State(state), Path(id))
        .await
        .into_response();
    let fetched: StudentItem = read_json(response).await;
    assert_eq!(fetched.item.eco_points, 120);
    assert_eq!(fetched.item.level, 3);
    assert_eq!(fetched.item.fields.school, "Northside Middle");
}

#[tokio::test]
async fn counts_beyond_the_column_range_are_rejected() {
    let state = Arc::new(test_state());
    let id = Uuid::new_v4();

    let response = put_student(&state, id, student_request(Some(3_000_000_000), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = put_student(&state, id, student_request(None, Some(u32::MAX))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = rest::get_student_handler(State(state.clone()), Path(id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = put_student(&state, id, student_request(Some(MAX_STORED_COUNT), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = rest::create_challenge_handler(
        State(state),
        Json(CreateChallengeRequest {
            title: "Carry everything home".into(),
            description: String::new(),
            points: MAX_STORED_COUNT + 1,
            created_by: "Ms. Rao".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =========================================================================
// Campaigns
// =========================================================================

#[tokio::test]
async fn campaign_lifecycle() {
    let state = Arc::new(test_state());

    let response = rest::create_campaign_handler(
        State(state.clone()),
        Json(CreateCampaignRequest {
            title: "Clean the river".into(),
            description: "Saturday pickup".into(),
            organizer: "Blue Water NGO".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: CampaignItem = read_json(response).await;
    assert_eq!(created.item.status, "draft");

    let response = rest::update_campaign_status_handler(
        State(state.clone()),
        Path(created.item.id),
        Json(UpdateCampaignStatusRequest {
            status: "active".into(),
        }),
    )
    .await
    .into_response();
    let updated: CampaignItem = read_json(response).await;
    assert_eq!(updated.item.status, "active");

    let response = rest::list_campaigns_handler(State(state.clone()))
        .await
        .into_response();
    let list: CampaignList = read_json(response).await;
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].status, "active");

    let response = rest::update_campaign_status_handler(
        State(state.clone()),
        Path(Uuid::new_v4()),
        Json(UpdateCampaignStatusRequest {
            status: "paused".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = rest::update_campaign_status_handler(
        State(state),
        Path(created.item.id),
        Json(UpdateCampaignStatusRequest {
            status: "archived".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =========================================================================
// Challenges
// =========================================================================

#[tokio::test]
async fn challenges_are_listed_newest_first() {
    let state = Arc::new(test_state());
    for (title, points) in [("Plant a tree", 50), ("Sort your recycling", 20)] {
        let response = rest::create_challenge_handler(
            State(state.clone()),
            Json(CreateChallengeRequest {
                title: title.into(),
                description: String::new(),
                points,
                created_by: "Ms. Rao".into(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: ChallengeItem = read_json(response).await;
        assert_eq!(created.item.points, points);
    }

    let response = rest::list_challenges_handler(State(state.clone()))
        .await
        .into_response();
    let list: ChallengeList = read_json(response).await;
    let titles: Vec<_> = list.items.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Sort your recycling", "Plant a tree"]);

    let response = rest::create_challenge_handler(
        State(state),
        Json(CreateChallengeRequest {
            title: "  ".into(),
            description: String::new(),
            points: 5,
            created_by: "Ms. Rao".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

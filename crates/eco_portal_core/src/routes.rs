//! crates/eco_portal_core/src/routes.rs
//!
//! The UI route table and the redirect rules applied to it.
//!
//! Access is advisory: once signed in, every authenticated route renders for
//! every role. The role only decides where `/` sends the visitor.

use crate::domain::Role;

/// Every page the client knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    About,
    TeacherLogin,
    NgoLogin,
    StudentLogin,
    StudentDashboard,
    TeacherDashboard,
    NgoDashboard,
    AdminDashboard,
    CreateProfile,
    Profile,
    Feed,
    WasteLog,
    CollectionCenters,
    EcoPoints,
    Education,
    Sanitization,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::About => "/page",
            Route::TeacherLogin => "/teacher-login",
            Route::NgoLogin => "/ngo-login",
            Route::StudentLogin => "/student-login",
            Route::StudentDashboard => "/student",
            Route::TeacherDashboard => "/teacher",
            Route::NgoDashboard => "/ngo",
            Route::AdminDashboard => "/admin",
            Route::CreateProfile => "/create-profile",
            Route::Profile => "/profile",
            Route::Feed => "/feed",
            Route::WasteLog => "/waste-log",
            Route::CollectionCenters => "/collection-centers",
            Route::EcoPoints => "/eco-points",
            Route::Education => "/education",
            Route::Sanitization => "/sanitization",
        }
    }

    /// The dashboard a role lands on.
    pub fn dashboard_for(role: Role) -> Route {
        match role {
            Role::Student => Route::StudentDashboard,
            Role::Teacher => Route::TeacherDashboard,
            Role::Ngo => Route::NgoDashboard,
            Role::Admin => Route::AdminDashboard,
        }
    }
}

pub const UNAUTHENTICATED_ROUTES: &[Route] = &[
    Route::Landing,
    Route::About,
    Route::TeacherLogin,
    Route::NgoLogin,
    Route::StudentLogin,
];

pub const AUTHENTICATED_ROUTES: &[Route] = &[
    Route::StudentDashboard,
    Route::TeacherDashboard,
    Route::NgoDashboard,
    Route::CreateProfile,
    Route::Profile,
    Route::AdminDashboard,
    Route::Feed,
    Route::WasteLog,
    Route::CollectionCenters,
    Route::EcoPoints,
    Route::Education,
    Route::Sanitization,
    Route::Landing,
];

/// What the client should do with a requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(&'static str),
}

/// The routes a session may render, plus the role that steers `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSet {
    routes: &'static [Route],
    role: Option<Role>,
}

impl RouteSet {
    pub fn unauthenticated() -> Self {
        Self {
            routes: UNAUTHENTICATED_ROUTES,
            role: None,
        }
    }

    pub fn authenticated(role: Role) -> Self {
        Self {
            routes: AUTHENTICATED_ROUTES,
            role: Some(role),
        }
    }

    pub fn routes(&self) -> &'static [Route] {
        self.routes
    }

    pub fn is_authenticated(&self) -> bool {
        self.role.is_some()
    }

    pub fn contains(&self, route: Route) -> bool {
        self.routes.contains(&route)
    }

    /// Where `/` takes the visitor.
    pub fn landing(&self) -> Route {
        match self.role {
            Some(role) => Route::dashboard_for(role),
            None => Route::Landing,
        }
    }

    /// Decides whether `path` renders or redirects.
    pub fn decide(&self, path: &str) -> RouteDecision {
        let path = normalize(path);
        let matched = self.routes.iter().copied().find(|r| r.path() == path);

        match (matched, self.role) {
            (Some(Route::Landing), Some(role)) => {
                RouteDecision::Redirect(Route::dashboard_for(role).path())
            }
            (Some(route), _) => RouteDecision::Render(route),
            (None, _) => RouteDecision::Redirect(Route::Landing.path()),
        }
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

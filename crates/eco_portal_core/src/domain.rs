//! crates/eco_portal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the platform.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Roles and Identities
//=========================================================================================

/// The acting role of a visitor once they are signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Teacher,
    Ngo,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Teacher, Role::Ngo, Role::Admin];

    /// The lowercase name, also used as the landing path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Ngo => "ngo",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name one of the four roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Parses case-insensitively, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "ngo" => Ok(Role::Ngo),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Nested metadata some auth providers attach to a user record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMetadata {
    pub role: Option<String>,
}

/// The authenticated user record handed to us by the external auth provider.
/// Every field except `id` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub user_name: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<IdentityMetadata>,
    pub user_type: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_metadata_role(mut self, role: impl Into<String>) -> Self {
        self.metadata = Some(IdentityMetadata {
            role: Some(role.into()),
        });
        self
    }

    pub fn with_user_type(mut self, user_type: impl Into<String>) -> Self {
        self.user_type = Some(user_type.into());
        self
    }
}

//=========================================================================================
// Student Profiles
//=========================================================================================

/// The values collected by the profile wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub name: String,
    pub grade: String,
    pub school: String,
    pub avatar: String,
    pub bio: String,
    pub favorite_subject: String,
    pub environmental_goal: String,
}

/// A badge earned by a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub title: String,
    pub description: String,
    pub earned_at: DateTime<Utc>,
}

/// A single entry in a student's waste log history.
#[derive(Debug, Clone, PartialEq)]
pub struct WasteLogEntry {
    pub category: String,
    pub weight_kg: f64,
    pub logged_at: DateTime<Utc>,
}

/// The payload handed to the student repository when a new profile is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDraft {
    pub fields: ProfileFields,
    pub eco_points: u32,
    pub level: u32,
    pub achievements: Vec<Achievement>,
    pub waste_logs: Vec<WasteLogEntry>,
    pub completed_challenges: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A persisted student profile.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentProfile {
    pub id: Uuid,
    pub fields: ProfileFields,
    pub eco_points: u32,
    pub level: u32,
    pub achievements: Vec<Achievement>,
    pub waste_logs: Vec<WasteLogEntry>,
    pub completed_challenges: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StudentProfile {
    /// Attaches an id to a submitted draft.
    pub fn from_draft(id: Uuid, draft: ProfileDraft) -> Self {
        Self {
            id,
            fields: draft.fields,
            eco_points: draft.eco_points,
            level: draft.level,
            achievements: draft.achievements,
            waste_logs: draft.waste_logs,
            completed_challenges: draft.completed_challenges,
            created_at: draft.created_at,
        }
    }
}

//=========================================================================================
// Campaigns and Challenges
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            other => Err(format!("Unknown campaign status: '{}'", other)),
        }
    }
}

/// An awareness campaign run by an NGO or teacher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub organizer: String,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCampaign {
    pub title: String,
    pub description: String,
    pub organizer: String,
}

/// A task students can complete to earn eco points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChallenge {
    pub title: String,
    pub description: String,
    pub points: u32,
    pub created_by: String,
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A user-visible toast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

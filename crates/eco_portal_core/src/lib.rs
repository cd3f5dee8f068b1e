pub mod domain;
pub mod ports;
pub mod role;
pub mod routes;
pub mod wizard;

pub use domain::{
    Achievement, Campaign, CampaignStatus, Challenge, Identity, IdentityMetadata, NewCampaign,
    NewChallenge, Notification, NotificationKind, ProfileDraft, ProfileFields, Role,
    StudentProfile, UnknownRole, WasteLogEntry,
};
pub use ports::{
    CampaignRepository, ChallengeRepository, KeyValueStore, MemoryKeyValueStore, Notifier,
    PortError, PortResult, StudentRepository, WizardObserver,
};
pub use role::{resolve, OverridePolicy, Resolution, RoleSession, SELECTED_ROLE_KEY};
pub use routes::{Route, RouteDecision, RouteSet};
pub use wizard::{ProfileWizard, SubmissionOutcome, Transition, WizardError, WizardField};

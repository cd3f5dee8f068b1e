//! crates/eco_portal_core/src/wizard.rs
//!
//! The guided profile wizard: four ordered steps, each gated by its own
//! validation rule, ending in a single submission to the student repository.
//!
//! ```text
//!  [1 basic-info] ─advance→ [2 school] ─advance→ [3 avatar] ─advance→ [4 interests]
//!        │          ←retreat─         ←retreat─           ←retreat─        │
//!        ▼                                                                 ▼
//!    on_cancel()                                              begin/complete_submission
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{Achievement, Notification, ProfileDraft, ProfileFields, StudentProfile};
use crate::ports::{Notifier, PortError, PortResult, StudentRepository, WizardObserver};

//=========================================================================================
// Step Table
//=========================================================================================

pub const FIRST_STEP: usize = 1;
pub const LAST_STEP: usize = 4;

/// One wizard step: a render key for the client and the rule that must hold
/// before moving past it.
#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub validate: fn(&ProfileFields) -> bool,
}

pub const STEPS: [StepSpec; LAST_STEP] = [
    StepSpec {
        key: "basic-info",
        title: "Tell us about yourself",
        validate: has_name,
    },
    StepSpec {
        key: "school",
        title: "Your school",
        validate: has_school,
    },
    StepSpec {
        key: "avatar",
        title: "Pick an avatar",
        validate: has_avatar,
    },
    StepSpec {
        key: "interests",
        title: "Your green goals",
        validate: always,
    },
];

fn has_name(f: &ProfileFields) -> bool {
    f.name.trim().chars().count() >= 2
}

fn has_school(f: &ProfileFields) -> bool {
    !f.grade.is_empty() && f.school.trim().chars().count() >= 2
}

fn has_avatar(f: &ProfileFields) -> bool {
    !f.avatar.is_empty()
}

// Everything on the last step is optional.
fn always(_: &ProfileFields) -> bool {
    true
}

/// The avatars a student can choose from. The first one is pre-selected.
pub const AVATAR_OPTIONS: &[&str] = &["🌱", "🌍", "🌳", "♻️", "🐢", "🦋", "💧", "☀️"];

pub const STARTING_ECO_POINTS: u32 = 0;
pub const STARTING_LEVEL: u32 = 1;
pub const STARTER_ACHIEVEMENT_TITLE: &str = "Eco Explorer";
pub const STARTER_ACHIEVEMENT_DESCRIPTION: &str = "Joined the eco community";

/// Builds the submission payload: the collected fields plus a fresh starting state.
pub fn build_draft(fields: ProfileFields, created_at: DateTime<Utc>) -> ProfileDraft {
    ProfileDraft {
        fields,
        eco_points: STARTING_ECO_POINTS,
        level: STARTING_LEVEL,
        achievements: vec![Achievement {
            title: STARTER_ACHIEVEMENT_TITLE.to_string(),
            description: STARTER_ACHIEVEMENT_DESCRIPTION.to_string(),
            earned_at: created_at,
        }],
        waste_logs: Vec::new(),
        completed_challenges: Vec::new(),
        created_at,
    }
}

//=========================================================================================
// Errors and Outcomes
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("Profile can only be submitted from the last step, currently on step {0}")]
    NotAtFinalStep(usize),
    #[error("A submission is already in flight")]
    SubmissionInFlight,
    #[error("The profile has already been created")]
    Finished,
    #[error("Unknown avatar option: '{0}'")]
    UnknownAvatar(String),
}

/// The result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved(usize),
    /// Validation failed, or a submission is outstanding.
    Blocked,
    /// Already on the last step.
    Stayed,
    /// Backed out of the first step.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Created(StudentProfile),
    Failed(PortError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardField {
    Name,
    Grade,
    School,
    Avatar,
    Bio,
    FavoriteSubject,
    EnvironmentalGoal,
}

//=========================================================================================
// The Wizard
//=========================================================================================

pub struct ProfileWizard {
    student_id: Uuid,
    current_step: usize,
    fields: ProfileFields,
    submitting: bool,
    finished: bool,
    observer: Arc<dyn WizardObserver>,
}

impl ProfileWizard {
    pub fn new(student_id: Uuid, observer: Arc<dyn WizardObserver>) -> Self {
        Self::with_fields(student_id, ProfileFields::default(), observer)
    }

    /// Starts on step 1 with pre-filled fields. An empty avatar gets the first option.
    pub fn with_fields(
        student_id: Uuid,
        mut fields: ProfileFields,
        observer: Arc<dyn WizardObserver>,
    ) -> Self {
        if fields.avatar.is_empty() {
            fields.avatar = AVATAR_OPTIONS[0].to_string();
        }
        Self {
            student_id,
            current_step: FIRST_STEP,
            fields,
            submitting: false,
            finished: false,
            observer,
        }
    }

    pub fn student_id(&self) -> Uuid {
        self.student_id
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn step(&self) -> &StepSpec {
        &STEPS[self.current_step - 1]
    }

    pub fn fields(&self) -> &ProfileFields {
        &self.fields
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the "next" control is enabled. Never on the last step.
    pub fn can_advance(&self) -> bool {
        self.current_step < LAST_STEP
            && !self.submitting
            && !self.finished
            && (self.step().validate)(&self.fields)
    }

    /// Whether the "submit" control is enabled.
    pub fn can_submit(&self) -> bool {
        self.current_step == LAST_STEP && !self.submitting && !self.finished
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        if self.finished {
            return Err(WizardError::Finished);
        }
        if self.submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        Ok(())
    }

    pub fn update_field(
        &mut self,
        field: WizardField,
        value: impl Into<String>,
    ) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let value = value.into();
        let slot = match field {
            WizardField::Name => &mut self.fields.name,
            WizardField::Grade => &mut self.fields.grade,
            WizardField::School => &mut self.fields.school,
            WizardField::Avatar => {
                if !value.is_empty() && !AVATAR_OPTIONS.contains(&value.as_str()) {
                    return Err(WizardError::UnknownAvatar(value));
                }
                &mut self.fields.avatar
            }
            WizardField::Bio => &mut self.fields.bio,
            WizardField::FavoriteSubject => &mut self.fields.favorite_subject,
            WizardField::EnvironmentalGoal => &mut self.fields.environmental_goal,
        };
        *slot = value;
        Ok(())
    }

    /// Single-select: replaces whatever avatar was chosen before.
    pub fn select_avatar(&mut self, option: &str) -> Result<(), WizardError> {
        self.update_field(WizardField::Avatar, option)
    }

    pub fn advance(&mut self) -> Transition {
        if self.submitting || self.finished {
            return Transition::Blocked;
        }
        if self.current_step == LAST_STEP {
            return Transition::Stayed;
        }
        if !(self.step().validate)(&self.fields) {
            debug!(step = self.current_step, "Wizard step did not validate");
            return Transition::Blocked;
        }
        self.current_step += 1;
        debug!(step = self.current_step, "Wizard advanced");
        Transition::Moved(self.current_step)
    }

    pub fn retreat(&mut self) -> Transition {
        if self.submitting || self.finished {
            return Transition::Blocked;
        }
        if self.current_step == FIRST_STEP {
            debug!(student_id = %self.student_id, "Wizard cancelled");
            self.observer.on_cancel();
            return Transition::Cancelled;
        }
        self.current_step -= 1;
        debug!(step = self.current_step, "Wizard went back");
        Transition::Moved(self.current_step)
    }

    /// Locks the wizard for submission and returns the payload to store.
    pub fn begin_submission(&mut self) -> Result<ProfileDraft, WizardError> {
        if self.finished {
            return Err(WizardError::Finished);
        }
        if self.submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        if self.current_step != LAST_STEP {
            return Err(WizardError::NotAtFinalStep(self.current_step));
        }
        self.submitting = true;
        Ok(build_draft(self.fields.clone(), Utc::now()))
    }

    /// Applies the repository's answer to an outstanding submission.
    pub fn complete_submission(
        &mut self,
        result: PortResult<StudentProfile>,
        notifier: &dyn Notifier,
    ) -> SubmissionOutcome {
        self.submitting = false;
        match result {
            Ok(profile) => {
                self.finished = true;
                info!(student_id = %profile.id, "Student profile created");
                notifier.notify(Notification::success("Profile created successfully!"));
                self.observer.on_profile_created(&profile);
                SubmissionOutcome::Created(profile)
            }
            Err(e) => {
                error!(student_id = %self.student_id, "Failed to create profile: {}", e);
                notifier.notify(Notification::error(
                    "Failed to create profile. Please try again.",
                ));
                SubmissionOutcome::Failed(e)
            }
        }
    }

    /// Runs a whole submission against the repository.
    pub async fn submit(
        &mut self,
        repo: &dyn StudentRepository,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, WizardError> {
        let draft = self.begin_submission()?;
        let result = repo.save_profile(self.student_id, draft).await;
        Ok(self.complete_submission(result, notifier))
    }
}

//! services/api/src/adapters/notify.rs
//!
//! Log-backed notification and wizard-event adapters. The browser renders its
//! own toasts from the HTTP responses; the server side only records them.

use eco_portal_core::domain::{Notification, NotificationKind, StudentProfile};
use eco_portal_core::ports::{Notifier, WizardObserver};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => info!(toast = %notification.message, "notify"),
            NotificationKind::Error => warn!(toast = %notification.message, "notify"),
        }
    }
}

/// Records the upward events of one wizard instance.
#[derive(Clone, Copy, Debug)]
pub struct TracingWizardObserver {
    pub wizard_id: Uuid,
}

impl WizardObserver for TracingWizardObserver {
    fn on_cancel(&self) {
        info!(wizard_id = %self.wizard_id, "Profile wizard cancelled");
    }

    fn on_profile_created(&self, profile: &StudentProfile) {
        info!(
            wizard_id = %self.wizard_id,
            student_id = %profile.id,
            "Profile wizard finished"
        );
    }
}

pub mod db;
pub mod memory;
pub mod notify;

pub use db::DbAdapter;
pub use memory::MemoryAdapter;
pub use notify::{TracingNotifier, TracingWizardObserver};

use eco_portal_core::ports::KeyValueStore;
use std::sync::Arc;

/// Hands out the durable storage belonging to one browser.
pub trait ClientStorage: Send + Sync {
    fn for_client(&self, client_id: &str) -> Arc<dyn KeyValueStore>;
}

use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::locks::KeyedLocks;

use crate::services::{
    RecurrenceExpander, SeriesMutationEngine, SupabaseDoctorDirectory, SupabaseTemplateStore,
    TemplateStore,
};

/// Router state. The HTTP client and the lock table are process-wide; stores are built per
/// request around the caller's token.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub supabase: Arc<SupabaseClient>,
    pub locks: KeyedLocks,
}

impl SchedulingState {
    pub fn new(config: Arc<AppConfig>, locks: KeyedLocks) -> Self {
        let supabase = Arc::new(SupabaseClient::new(&config));
        Self { config, supabase, locks }
    }

    pub fn template_store(&self, auth_token: &str) -> Arc<dyn TemplateStore> {
        Arc::new(SupabaseTemplateStore::new(Arc::clone(&self.supabase), auth_token))
    }

    pub fn expander(&self, auth_token: &str) -> RecurrenceExpander {
        RecurrenceExpander::new(
            self.template_store(auth_token),
            Arc::new(SupabaseDoctorDirectory::new(Arc::clone(&self.supabase), auth_token)),
        )
    }

    pub fn mutations(&self, auth_token: &str) -> SeriesMutationEngine {
        SeriesMutationEngine::new(self.template_store(auth_token), self.locks.clone())
    }
}

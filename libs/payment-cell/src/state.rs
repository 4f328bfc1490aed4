use std::sync::Arc;

use scheduling_cell::services::SupabaseTemplateStore;
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::locks::KeyedLocks;

use crate::services::{PaymentService, SupabasePaymentStore};

/// Router state; `locks` is the same table the scheduling cell uses so payment fan-outs and
/// series edits of one booking never interleave.
#[derive(Clone)]
pub struct PaymentState {
    pub config: Arc<AppConfig>,
    pub supabase: Arc<SupabaseClient>,
    pub locks: KeyedLocks,
}

impl PaymentState {
    pub fn new(config: Arc<AppConfig>, locks: KeyedLocks) -> Self {
        let supabase = Arc::new(SupabaseClient::new(&config));
        Self { config, supabase, locks }
    }

    pub fn service(&self, auth_token: &str) -> PaymentService {
        PaymentService::new(
            Arc::new(SupabaseTemplateStore::new(Arc::clone(&self.supabase), auth_token)),
            Arc::new(SupabasePaymentStore::new(Arc::clone(&self.supabase), auth_token)),
            self.locks.clone(),
        )
    }
}

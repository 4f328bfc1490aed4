pub mod payment;
pub mod period;
pub mod propagation;
pub mod store;
pub mod supabase;
pub mod validity;

pub use payment::PaymentService;
pub use period::calculate_period_end;
pub use propagation::BookingStatusPropagator;
pub use store::{PaymentResult, PaymentStore};
pub use supabase::SupabasePaymentStore;

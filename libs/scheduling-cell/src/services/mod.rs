pub mod projection;
pub mod recurrence;
pub mod series;
pub mod store;
pub mod supabase;
pub mod validation;

pub use recurrence::RecurrenceExpander;
pub use series::{booking_lock_key, SeriesMutationEngine};
pub use store::{DoctorDirectory, DoctorName, SchedulingResult, TemplateStore};
pub use supabase::{SupabaseDoctorDirectory, SupabaseTemplateStore};

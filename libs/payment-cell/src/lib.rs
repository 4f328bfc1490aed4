pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod testing;

pub use models::*;
pub use router::payment_routes;
pub use state::PaymentState;

// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::PaymentState;

pub fn payment_routes(state: Arc<PaymentState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_payment))
        .route(
            "/{payment_id}",
            put(handlers::update_payment).delete(handlers::delete_payment),
        )
        .route("/occurrences/{occurrence_id}", get(handlers::list_occurrence_payments))
        .route("/period-end", get(handlers::period_end))
        .route("/bookings/{booking_id}/reconcile", post(handlers::reconcile_booking))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use payment_cell::{payment_routes, PaymentState};
use scheduling_cell::{scheduling_routes, SchedulingState};
use shared_config::AppConfig;
use shared_utils::locks::KeyedLocks;

/// Both cells share one lock table so writes to the same booking are serialized across them.
pub fn create_router(config: Arc<AppConfig>, locks: KeyedLocks) -> Router {
    let scheduling = Arc::new(SchedulingState::new(config.clone(), locks.clone()));
    let payments = Arc::new(PaymentState::new(config, locks));

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", scheduling_routes(scheduling))
        .nest("/payments", payment_routes(payments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    fn config() -> Arc<AppConfig> {
        Arc::new(AppConfig::new("http://localhost:54321", "anon-key", "jwt-secret"))
    }

    #[tokio::test]
    async fn test_root_is_public() {
        let response = create_router(config(), KeyedLocks::new())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cells_are_nested_behind_auth() {
        for uri in ["/appointments/week?week_start=2025-01-13", "/payments/period-end?period=single&payment_date=2025-01-10"] {
            let response = create_router(config(), KeyedLocks::new())
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the caller as a `User` request extension.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Tenant of the caller; every scheduling and payment operation is tenant-scoped.
pub fn require_tenant(user: &User) -> Result<&str, AppError> {
    user.tenant_id
        .as_deref()
        .filter(|tenant| !tenant.is_empty())
        .ok_or_else(|| AppError::Forbidden("User is not assigned to a clinic".to_string()))
}

/// Rejects callers whose role is read-only for the schedule.
pub fn require_schedule_writer(user: &User) -> Result<(), AppError> {
    if user.can_write_schedule() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Doctors cannot modify appointments or payments".to_string()))
    }
}

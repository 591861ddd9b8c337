use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{debug, instrument, warn};

use crate::shared::AppError;
use crate::storage::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity middleware - reads the opaque `x-user-id` header and adds a UserId to the request.
/// Usage: .layer(middleware::from_fn(session::user_identity))
/// Handlers can then extract Extension(user_id): Extension<UserId>.
#[instrument(skip(req, next), fields(uri = %req.uri()))]
pub async fn user_identity(mut req: Request, next: Next) -> Result<Response, AppError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|header| header.to_str().ok())
        .and_then(UserId::parse)
        .ok_or_else(|| {
            warn!("Missing or invalid user id header");
            AppError::Unauthorized("Missing or invalid user identity".to_string())
        })?;

    debug!(user_id = %user_id, "Request identified");
    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}

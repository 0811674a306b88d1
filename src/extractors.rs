use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Proof that the request carried the admin key.
///
/// The key is checked here, on the server, against the bcrypt hash in
/// `[admin] key_hash`. With no hash configured every admin request is refused.
#[derive(Debug, Clone, Copy)]
pub struct AdminKey;

impl FromRequestParts<AppState> for AdminKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(hash) = state.config.admin.key_hash.as_deref() else {
            tracing::warn!("Admin request refused: no admin key configured");
            return Err(AppError::Forbidden);
        };

        let key = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        if bcrypt::verify(key, hash).unwrap_or(false) {
            Ok(AdminKey)
        } else {
            tracing::warn!("Admin request with wrong key");
            Err(AppError::Unauthorized)
        }
    }
}

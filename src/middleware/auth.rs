use axum::{
    extract::{FromRef, FromRequestParts},
    http::header,
};

use crate::{
    db::DbPool,
    error::AppError,
    models::{Product, User, UserRole},
    security,
};

/// The resolved caller. Carries the full current user row so handlers can
/// apply role and ownership checks without a second lookup. Nothing is cached
/// across requests; every request re-resolves the user from the store.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

pub fn ensure_staff(auth: &AuthUser, denied: &str) -> Result<(), AppError> {
    match auth.user.role {
        UserRole::Vendor | UserRole::Admin => Ok(()),
        UserRole::Customer => Err(AppError::Forbidden(denied.to_string())),
    }
}

/// A product is administrable by its owning vendor and by any admin.
pub fn ensure_product_manager(
    auth: &AuthUser,
    product: &Product,
    denied: &str,
) -> Result<(), AppError> {
    match auth.user.role {
        UserRole::Admin => Ok(()),
        _ if product.vendor_id == auth.user.id => Ok(()),
        _ => Err(AppError::Forbidden(denied.to_string())),
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    DbPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthenticated("Could not validate credentials".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthenticated("Could not validate credentials".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::Unauthenticated(
                "Could not validate credentials".into(),
            ));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let claims = security::decode_token(token)?
            .ok_or_else(|| AppError::Unauthenticated("Could not validate credentials".into()))?;

        // Both claims must still match a live row; a token minted for a
        // deleted or re-keyed account does not authenticate anyone.
        let pool = DbPool::from_ref(state);
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE email = $1 AND id = $2")
                .bind(&claims.sub)
                .bind(claims.user_id)
                .fetch_optional(&pool)
                .await?;

        let user = user
            .ok_or_else(|| AppError::Unauthenticated("Could not validate credentials".into()))?;

        Ok(AuthUser { user })
    }
}

use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::auth::{
        ChangePasswordRequest, LoginRequest, RefreshRequest, SignupRequest, TokenPair,
        UpdateProfileRequest, UserSummary,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{User, UserRole},
    response::{ApiResponse, Meta},
    security,
    update::{PartialUpdate, UserColumn},
};

pub async fn signup(pool: &DbPool, payload: SignupRequest) -> AppResult<ApiResponse<UserSummary>> {
    let SignupRequest {
        email,
        username,
        password,
        role,
    } = payload;

    let existing_email: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;
    if existing_email.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let existing_username: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = $1")
            .bind(username.as_str())
            .fetch_optional(pool)
            .await?;
    if existing_username.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let password_hash = security::hash_password(&password)?;
    let role = role.unwrap_or(UserRole::Customer);
    let id = Uuid::new_v4();

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(email.as_str())
    .bind(username.as_str())
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_signup",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created successfully",
        UserSummary::from(&user),
        None,
    ))
}

pub async fn login(pool: &DbPool, payload: LoginRequest) -> AppResult<ApiResponse<TokenPair>> {
    let LoginRequest { email, password } = payload;
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => {
            return Err(AppError::Unauthenticated(
                "Incorrect email or password".into(),
            ));
        }
    };

    if !security::verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthenticated(
            "Incorrect email or password".into(),
        ));
    }

    let tokens = issue_pair(&user)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Logged in", tokens, Some(Meta::empty())))
}

pub async fn refresh(pool: &DbPool, payload: RefreshRequest) -> AppResult<ApiResponse<TokenPair>> {
    let claims = security::decode_token(&payload.refresh_token)?
        .ok_or_else(|| AppError::Unauthenticated("Invalid refresh token".into()))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1 AND id = $2")
        .bind(&claims.sub)
        .bind(claims.user_id)
        .fetch_optional(pool)
        .await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthenticated("User not found".into())),
    };

    let tokens = issue_pair(&user)?;
    Ok(ApiResponse::success(
        "Token refreshed",
        tokens,
        Some(Meta::empty()),
    ))
}

pub async fn update_profile(
    pool: &DbPool,
    auth: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserSummary>> {
    // Uniqueness checks run against every row but the caller's own, so
    // resubmitting an unchanged email or username is not a conflict.
    if let Some(email) = payload.email.as_deref() {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id != $2")
                .bind(email)
                .bind(auth.user.id)
                .fetch_optional(pool)
                .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
    }
    if let Some(username) = payload.username.as_deref() {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE username = $1 AND id != $2")
                .bind(username)
                .bind(auth.user.id)
                .fetch_optional(pool)
                .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
    }

    let mut update = PartialUpdate::<UserColumn>::new();
    update.maybe_set(UserColumn::Username, payload.username);
    update.maybe_set(UserColumn::Email, payload.email);

    if update.is_empty() {
        return Ok(ApiResponse::success(
            "OK",
            UserSummary::from(&auth.user),
            None,
        ));
    }

    let mut query = update.by_id(auth.user.id);
    let user: User = query.build_query_as().fetch_one(pool).await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        "profile_update",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Profile updated",
        UserSummary::from(&user),
        None,
    ))
}

pub async fn change_password(
    pool: &DbPool,
    auth: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !security::verify_password(&payload.current_password, &auth.user.password_hash)? {
        return Err(AppError::InvalidArgument(
            "Incorrect current password".to_string(),
        ));
    }

    let new_hash = security::hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(new_hash)
        .bind(auth.user.id)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "password_change",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password updated successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn issue_pair(user: &User) -> AppResult<TokenPair> {
    Ok(TokenPair {
        access_token: security::issue_access_token(user)?,
        refresh_token: security::issue_refresh_token(user)?,
        token_type: "bearer".to_string(),
    })
}

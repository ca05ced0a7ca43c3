use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};

use crate::{
    db::DbPool,
    dto::auth::{
        ChangePasswordRequest, LoginRequest, RefreshRequest, SignupRequest, TokenPair,
        UpdateProfileRequest, UserSummary,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::auth_service,
};

pub fn router() -> Router<DbPool> {
    Router::new()
        .route("/signup", post(signup))
        .route("/token", post(token))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Create user", body = ApiResponse<UserSummary>),
        (status = 409, description = "Email or username already taken"),
    ),
    tag = "Auth"
)]
pub async fn signup(
    State(pool): State<DbPool>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<Json<ApiResponse<UserSummary>>> {
    let resp = auth_service::signup(&pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Exchange credentials for tokens", body = ApiResponse<TokenPair>),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "Auth"
)]
pub async fn token(
    State(pool): State<DbPool>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let resp = auth_service::login(&pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Exchange a refresh token for a new pair", body = ApiResponse<TokenPair>),
        (status = 401, description = "Invalid refresh token"),
    ),
    tag = "Auth"
)]
pub async fn refresh(
    State(pool): State<DbPool>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let resp = auth_service::refresh(&pool, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserSummary>),
        (status = 401, description = "Unauthenticated"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> AppResult<Json<ApiResponse<UserSummary>>> {
    Ok(Json(ApiResponse::success(
        "OK",
        UserSummary::from(&auth.user),
        None,
    )))
}

#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Partially update username/email", body = ApiResponse<UserSummary>),
        (status = 409, description = "Email or username already taken"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn update_profile(
    State(pool): State<DbPool>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserSummary>>> {
    let resp = auth_service::update_profile(&pool, &auth, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Change password", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Incorrect current password"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn change_password(
    State(pool): State<DbPool>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::change_password(&pool, &auth, payload).await?;
    Ok(Json(resp))
}

//! Authentication Handlers
//!
//! Handles registration and login

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::api::convert::repo_err;
use crate::core::ServerState;
use crate::db::models::User;
use crate::db::repository::UserRepository;
use crate::utils::validation::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::utils::{AppError, AppResult};

// Re-use shared DTOs for API consistency
use shared::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

/// POST /api/auth/register - 注册
pub async fn register(
    State(state): State<ServerState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let (Some(email), Some(password)) = (req.email.clone(), req.password.clone()) else {
        return Err(AppError::validation("Email and password are required"));
    };

    // Email format via the derive rules
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    if password.len() < MIN_PASSWORD_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters"
        )));
    }

    let repo = UserRepository::new(state.get_db());
    if repo
        .find_by_email(&email)
        .await
        .map_err(repo_err)?
        .is_some()
    {
        return Err(AppError::invalid("User already exists"));
    }

    let hash = User::hash_password(&password)
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;

    let user = repo
        .create(email, hash, req.is_admin)
        .await
        .map_err(repo_err)?;

    tracing::info!(
        user_id = %user.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

/// POST /api/auth/login - 登录
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(AppError::validation("Email and password are required"));
    };

    let repo = UserRepository::new(state.get_db());
    let user = repo.find_by_email(&email).await.map_err(repo_err)?;

    // Unified error for unknown email and wrong password to prevent
    // account enumeration
    let user = match user {
        Some(u) => {
            let password_valid = u
                .verify_password(&password)
                .map_err(|e| AppError::internal(format!("Password verification failed: {e}")))?;
            if !password_valid {
                tracing::warn!(target: "security", email = %email, "Login failed - invalid credentials");
                return Err(AppError::invalid_credentials());
            }
            u
        }
        None => {
            tracing::warn!(target: "security", email = %email, "Login failed - user not found");
            return Err(AppError::invalid_credentials());
        }
    };

    let user_id = user.id.as_ref().map(|t| t.to_string()).unwrap_or_default();

    let token = state
        .get_jwt_service()
        .generate_token(&user_id, &user.email, user.is_admin)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {e}")))?;

    tracing::info!(user_id = %user_id, "User logged in successfully");

    Ok(Json(LoginResponse {
        token,
        user: user.to_info(),
    }))
}

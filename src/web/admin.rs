//! Staff account administration. Every route requires an ADMIN token; HR
//! tokens are rejected here and manage employees through `/api/hr` instead.

use crate::db;
use crate::domain::models::StaffRole;
use crate::state::SharedState;
use crate::web::session::StaffSession;
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand_core::OsRng;
use serde::Deserialize;
use uuid::Uuid;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub email: String,
    pub name: String,
    pub role: StaffRole,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/reactivate", post(reactivate_user))
        .route("/users/:id/reset-password", post(reset_password))
        .with_state(state)
}

fn require_admin(staff: &db::StaffRow) -> Result<(), StatusCode> {
    if staff.role != StaffRole::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(())
}

async fn list_users(
    StaffSession(staff): StaffSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::StaffRow>>, StatusCode> {
    require_admin(&staff)?;
    let users = db::list_staff(&state.pool).await.map_err(|e| {
        tracing::error!("staff listing failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(users))
}

async fn create_user(
    StaffSession(staff): StaffSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateStaffRequest>,
) -> Result<Json<db::StaffRow>, StatusCode> {
    require_admin(&staff)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(StatusCode::BAD_REQUEST);
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(StatusCode::BAD_REQUEST);
    }

    if db::find_staff_by_email(&state.pool, &email)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    let password_hash = hash_password(&payload.password)?;
    let created = db::insert_staff(&state.pool, &email, name, payload.role, &password_hash)
        .await
        .map_err(|e| {
            tracing::error!("staff creation failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tracing::info!("staff account {} created by {}", created.email, staff.email);
    Ok(Json(created))
}

async fn deactivate_user(
    StaffSession(staff): StaffSession,
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<db::StaffRow>, StatusCode> {
    require_admin(&staff)?;
    // Admins cannot lock themselves out.
    if staff.id == user_id {
        return Err(StatusCode::FORBIDDEN);
    }
    set_user_active(&state, user_id, false).await
}

async fn reactivate_user(
    StaffSession(staff): StaffSession,
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<db::StaffRow>, StatusCode> {
    require_admin(&staff)?;
    set_user_active(&state, user_id, true).await
}

async fn reset_password(
    StaffSession(staff): StaffSession,
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&staff)?;
    if payload.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(StatusCode::BAD_REQUEST);
    }

    let target = db::find_staff_by_id(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let password_hash = hash_password(&payload.new_password)?;
    db::set_staff_password(&state.pool, target.id, &password_hash)
        .await
        .map_err(|e| {
            tracing::error!("password reset failed for {}: {}", target.email, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tracing::info!("password reset for {} by {}", target.email, staff.email);
    Ok(StatusCode::NO_CONTENT)
}

async fn set_user_active(
    state: &SharedState,
    user_id: Uuid,
    active: bool,
) -> Result<Json<db::StaffRow>, StatusCode> {
    let target = db::find_staff_by_id(&state.pool, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    db::set_staff_active(&state.pool, target.id, active)
        .await
        .map_err(|e| {
            tracing::error!("activation update failed for {}: {}", target.email, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let refreshed = db::find_staff_by_id(&state.pool, target.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!(
        "staff account {} {}",
        refreshed.email,
        if active { "reactivated" } else { "deactivated" }
    );
    Ok(Json(refreshed))
}

fn hash_password(password: &str) -> Result<String, StatusCode> {
    let salt = SaltString::generate(OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .to_string())
}

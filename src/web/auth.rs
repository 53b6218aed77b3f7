use crate::db;
use crate::middleware::RateLimiter;
use crate::state::SharedState;
use crate::web::session::{self, TokenRole};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use once_cell::sync::Lazy;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 5 attempts per 60 seconds per client IP, shared across both login routes.
static LOGIN_RATE_LIMITER: Lazy<RateLimiter> = Lazy::new(|| RateLimiter::new(5, 60));

/// Drops expired limiter windows. Called from the hourly scheduler job.
pub async fn sweep_login_limiter() {
    LOGIN_RATE_LIMITER.cleanup().await;
}

#[derive(Deserialize)]
pub struct EmployeeLoginRequest {
    pub employee_code: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct StaffLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub subject_id: Uuid,
    pub role: &'static str,
    pub name: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login/employee", post(login_employee))
        .route("/login/user", post(login_user))
        .route("/change-password", post(change_password))
        .with_state(state)
}

async fn login_employee(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<EmployeeLoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ip = client_ip(&headers);
    if !LOGIN_RATE_LIMITER.check(&ip).await {
        tracing::warn!("login rate limit exceeded for IP: {}", ip);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let code = payload.employee_code.trim().to_uppercase();
    let employee = db::find_employee_by_code(&state.pool, &code)
        .await
        .map_err(|e| {
            tracing::error!("employee lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    verify_password(&payload.password, &employee.password_hash)?;
    if !employee.is_active {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = session::sign_session(employee.id, TokenRole::Employee, &state.session_key)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let resp = LoginResponse {
        token: token.clone(),
        subject_id: employee.id,
        role: session::role_string(TokenRole::Employee),
        name: employee.name,
    };
    Ok((session_headers(&token)?, Json(resp)))
}

async fn login_user(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<StaffLoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let ip = client_ip(&headers);
    if !LOGIN_RATE_LIMITER.check(&ip).await {
        tracing::warn!("login rate limit exceeded for IP: {}", ip);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let email = payload.email.trim().to_lowercase();
    let staff = db::find_staff_by_email(&state.pool, &email)
        .await
        .map_err(|e| {
            tracing::error!("staff lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    verify_password(&payload.password, &staff.password_hash)?;
    if !staff.is_active {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let role = TokenRole::from(staff.role);
    let token = session::sign_session(staff.id, role, &state.session_key)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let resp = LoginResponse {
        token: token.clone(),
        subject_id: staff.id,
        role: session::role_string(role),
        name: staff.name,
    };
    Ok((session_headers(&token)?, Json(resp)))
}

/// Rotates the caller's own password, whichever table they live in.
async fn change_password(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, StatusCode> {
    let token = session::extract_token(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = session::verify_session(&token, &state.session_key).map_err(|e| {
        tracing::warn!("change-password token rejected: {e}");
        StatusCode::UNAUTHORIZED
    })?;

    if payload.new_password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    match claims.role {
        TokenRole::Employee => {
            let employee = db::find_employee_by_id(&state.pool, claims.subject_id)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                .ok_or(StatusCode::UNAUTHORIZED)?;
            if !employee.is_active {
                return Err(StatusCode::UNAUTHORIZED);
            }
            verify_password(&payload.current_password, &employee.password_hash)?;
            let hash = hash_password(&payload.new_password)?;
            db::set_employee_password(&state.pool, employee.id, &hash)
                .await
                .map_err(|e| {
                    tracing::error!("password update failed for {}: {}", employee.id, e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;
        }
        TokenRole::Admin | TokenRole::Hr => {
            let staff = db::find_staff_by_id(&state.pool, claims.subject_id)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                .ok_or(StatusCode::UNAUTHORIZED)?;
            if !staff.is_active {
                return Err(StatusCode::UNAUTHORIZED);
            }
            verify_password(&payload.current_password, &staff.password_hash)?;
            let hash = hash_password(&payload.new_password)?;
            db::set_staff_password(&state.pool, staff.id, &hash)
                .await
                .map_err(|e| {
                    tracing::error!("password update failed for {}: {}", staff.id, e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

fn verify_password(password: &str, password_hash: &str) -> Result<(), StatusCode> {
    let parsed = PasswordHash::new(password_hash).map_err(|_| StatusCode::UNAUTHORIZED)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

fn hash_password(password: &str) -> Result<String, StatusCode> {
    let salt = SaltString::generate(OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("password hashing failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .to_string())
}

fn session_headers(token: &str) -> Result<HeaderMap, StatusCode> {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        format!("session={token}; HttpOnly; SameSite=Lax; Path=/")
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    );
    Ok(headers)
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies_and_rejects() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert_eq!(
            verify_password("wrong guess", &hash),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn client_ip_takes_the_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.2".parse().unwrap(),
        );
        assert_eq!(client_ip(&headers), "203.0.113.9");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn session_cookie_is_http_only() {
        let headers = session_headers("abc.def").unwrap();
        let cookie = headers
            .get(axum::http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("session=abc.def"));
        assert!(cookie.contains("HttpOnly"));
    }
}

use crate::db;
use crate::domain::models::StaffRole;
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Principal kind carried in a session token. Employees authenticate against
/// the employees table, staff against staff_users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    Admin,
    Hr,
    Employee,
}

impl From<StaffRole> for TokenRole {
    fn from(role: StaffRole) -> Self {
        match role {
            StaffRole::Admin => TokenRole::Admin,
            StaffRole::Hr => TokenRole::Hr,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub subject_id: Uuid,
    pub role: TokenRole,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(subject_id: Uuid, role: TokenRole, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(24);
    sign_with_exp(subject_id, role, exp.timestamp(), key)
}

fn sign_with_exp(
    subject_id: Uuid,
    role: TokenRole,
    exp: i64,
    key: &[u8],
) -> Result<String, SessionError> {
    sign_payload(&format!("{}|{}|{}", subject_id, role_string(role), exp), key)
}

fn sign_payload(payload: &str, key: &[u8]) -> Result<String, SessionError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(SessionError::Invalid);
    }
    let payload_bytes = general_purpose::STANDARD
        .decode(parts[0])
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    if pieces.len() != 3 {
        return Err(SessionError::Invalid);
    }
    let subject_id = Uuid::parse_str(pieces[0]).map_err(|_| SessionError::Invalid)?;
    let role = parse_role(pieces[1])?;
    let exp: i64 = pieces[2].parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims {
        subject_id,
        role,
        exp,
    })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                let trimmed = pair.trim();
                if let Some(rest) = trimmed.strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

pub fn role_string(role: TokenRole) -> &'static str {
    match role {
        TokenRole::Admin => "ADMIN",
        TokenRole::Hr => "HR",
        TokenRole::Employee => "EMPLOYEE",
    }
}

fn parse_role(raw: &str) -> Result<TokenRole, SessionError> {
    match raw {
        "ADMIN" => Ok(TokenRole::Admin),
        "HR" => Ok(TokenRole::Hr),
        "EMPLOYEE" => Ok(TokenRole::Employee),
        _ => Err(SessionError::Role),
    }
}

fn claims_from_parts(parts: &Parts, shared: &SharedState) -> Result<SessionClaims, StatusCode> {
    let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
    verify_session(&token, &shared.session_key).map_err(|e| {
        tracing::warn!("session verification failed: {e}");
        StatusCode::UNAUTHORIZED
    })
}

/// Extractor for endpoints that serve the employee themself.
pub struct EmployeeSession(pub db::EmployeeRow);

#[async_trait]
impl<S> FromRequestParts<S> for EmployeeSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = SharedState::from_ref(state);
        let claims = claims_from_parts(parts, &shared)?;
        if claims.role != TokenRole::Employee {
            return Err(StatusCode::FORBIDDEN);
        }
        let employee = db::find_employee_by_id(&shared.pool, claims.subject_id)
            .await
            .map_err(|e| {
                tracing::warn!("employee lookup failed for session: {e}");
                StatusCode::UNAUTHORIZED
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;
        if !employee.is_active {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(EmployeeSession(employee))
    }
}

/// Extractor for HR and admin endpoints. Admin-only routes additionally
/// check the role on the extracted row.
pub struct StaffSession(pub db::StaffRow);

#[async_trait]
impl<S> FromRequestParts<S> for StaffSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = SharedState::from_ref(state);
        let claims = claims_from_parts(parts, &shared)?;
        if claims.role == TokenRole::Employee {
            return Err(StatusCode::FORBIDDEN);
        }
        let staff = db::find_staff_by_id(&shared.pool, claims.subject_id)
            .await
            .map_err(|e| {
                tracing::warn!("staff lookup failed for session: {e}");
                StatusCode::UNAUTHORIZED
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;
        if !staff.is_active {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(StaffSession(staff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn round_trip_preserves_claims() {
        let id = Uuid::new_v4();
        let token = sign_session(id, TokenRole::Hr, KEY).unwrap();
        let claims = verify_session(&token, KEY).unwrap();
        assert_eq!(claims.subject_id, id);
        assert_eq!(claims.role, TokenRole::Hr);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = sign_session(Uuid::new_v4(), TokenRole::Employee, KEY).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload = general_purpose::STANDARD.encode(format!(
            "{}|ADMIN|{}",
            Uuid::new_v4(),
            Utc::now().timestamp() + 3600
        ));
        let forged = format!("{forged_payload}.{sig}");
        assert!(matches!(
            verify_session(&forged, KEY),
            Err(SessionError::Signature)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = sign_session(Uuid::new_v4(), TokenRole::Admin, KEY).unwrap();
        assert!(matches!(
            verify_session(&token, b"another-key-entirely-32-bytes..."),
            Err(SessionError::Signature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let exp = Utc::now().timestamp() - 60;
        let token = sign_with_exp(Uuid::new_v4(), TokenRole::Employee, exp, KEY).unwrap();
        assert!(matches!(
            verify_session(&token, KEY),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let payload = format!(
            "{}|WIZARD|{}",
            Uuid::new_v4(),
            Utc::now().timestamp() + 3600
        );
        let token = sign_payload(&payload, KEY).unwrap();
        assert!(matches!(
            verify_session(&token, KEY),
            Err(SessionError::Role)
        ));
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(
            verify_session("not-a-token", KEY),
            Err(SessionError::Invalid)
        ));
    }

    #[test]
    fn token_is_read_from_bearer_header_or_cookie() {
        let token = sign_session(Uuid::new_v4(), TokenRole::Employee, KEY).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        assert_eq!(extract_token(&headers), Some(token.clone()));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            format!("theme=dark; session={token}").parse().unwrap(),
        );
        assert_eq!(extract_token(&headers), Some(token));
    }
}

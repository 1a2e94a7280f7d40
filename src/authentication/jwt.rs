use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::Error;
use crate::schema::{Id, User, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, ttl_hours: i64) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(ttl_hours)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(Error::PermissionDenied(String::from(
                "You don't have permission to perform this action.",
            )));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

impl From<&User> for SessionData {
    fn from(value: &User) -> Self {
        SessionData {
            user_id: value.id,
            username: value.username.to_owned(),
            role: value.role,
            is_admin: value.role == UserRole::Admin,
        }
    }
}

/// The identity issuing a read request.
#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Anonymous,
    User(SessionData),
}

impl Viewer {
    pub fn user_id(&self) -> Option<Id> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(session) => Some(session.user_id),
        }
    }

    pub fn session(&self) -> Option<&SessionData> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(session) => Some(session),
        }
    }
}

impl From<SessionData> for Viewer {
    fn from(value: SessionData) -> Self {
        Viewer::User(value)
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid session secret: {e}")))
}

pub fn generate_jwt_session(user: &User, secret: &str, ttl_hours: i64) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role, ttl_hours);

    claims
        .sign_with_key(&key)
        .map_err(|e| Error::Config(format!("Could not sign session: {e}")))
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token.verify_with_key(&key).map_err(|e| {
        log::trace!("Rejected session token: {e}");
        Error::Unauthorized
    })?;

    let now = Utc::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(Error::Unauthorized);
    }

    Ok(session)
}

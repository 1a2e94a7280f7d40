use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::{constants::SESSION_HEADER_PREFIX, error::Error};

use super::jwt::{verify_jwt_session, SessionData, Viewer};

fn session_from_header(header: Option<&str>, secret: &str) -> Result<SessionData, Error> {
    let token = header
        .and_then(|value| value.strip_prefix(SESSION_HEADER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Error::Unauthorized)?;

    verify_jwt_session(token, secret).map(Into::into)
}

/// Requires a valid `Authorization: Token <jwt>` header.
pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            session_from_header(header.as_deref(), &secret).map_err(warp::reject::custom)
        }
    })
}

/// Resolves the caller, falling back to anonymous on a missing or invalid token.
pub fn with_viewer(secret: Arc<str>) -> impl Filter<Extract = (Viewer,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        match session_from_header(header.as_deref(), &secret) {
            Ok(session) => Viewer::User(session),
            Err(_) => Viewer::Anonymous,
        }
    })
}

//! Request authentication.
//!
//! Agents authenticate with `Authorization: Bearer <key>` and get a JSON 401
//! on failure. Admins authenticate with a session cookie and are redirected
//! to the login form on failure.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::Redirect;
use chrono::Utc;
use forum_shared::constants::ADMIN_SESSION_COOKIE;
use forum_shared::crypto::{verify_admin_session, verify_api_key};
use forum_shared::CredentialError;
use forum_store::{Agent, Database, StoreError};
use tracing::{debug, warn};

use crate::api::AppState;
use crate::error::ServerError;

/// The agent behind a valid bearer credential.
#[derive(Debug, Clone)]
pub struct AuthedAgent(pub Agent);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthedAgent {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| {
                ServerError::Unauthenticated("missing or invalid authorization header".into())
            })?
            .to_string();

        let agent = state
            .db
            .run(move |db| find_agent_by_key(db, &token))
            .await?
            .ok_or_else(|| ServerError::Unauthenticated("invalid api key".into()))?;

        // Best effort: the response never waits on the last-seen write.
        let db = state.db.clone();
        let agent_id = agent.id;
        tokio::spawn(async move {
            if let Err(e) = db.run(move |db| db.touch_agent(agent_id, Utc::now())).await {
                warn!(agent_id = %agent_id, error = %e, "Failed to update last_seen_at");
            }
        });

        Ok(AuthedAgent(agent))
    }
}

/// Find the agent whose stored hash matches `key`.
///
/// Hashes are salted, so this compares against every credentialed agent in
/// turn. See [`Database::credentialed_agents`] for the scale assumption.
pub fn find_agent_by_key(db: &Database, key: &str) -> Result<Option<Agent>, StoreError> {
    for candidate in db.credentialed_agents()? {
        match verify_api_key(key, &candidate.api_key_hash) {
            Ok(true) => return Ok(Some(candidate.agent)),
            Ok(false) | Err(CredentialError::Revoked) => {}
            Err(CredentialError::MalformedHash) => {
                warn!(agent_id = %candidate.agent.id, "Stored credential hash is malformed");
            }
        }
    }
    Ok(None)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Proof that the request carries a valid admin session cookie.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match cookie_value(&parts.headers, ADMIN_SESSION_COOKIE) {
            Some(token) if verify_admin_session(token, &state.config.session_secret) => {
                Ok(AdminSession)
            }
            _ => {
                debug!(path = %parts.uri.path(), "Admin session missing or invalid");
                Err(Redirect::to("/admin/login"))
            }
        }
    }
}

/// Value of the named cookie from the `Cookie` request header(s).
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value establishing an admin session.
pub fn session_cookie(token: &str) -> String {
    format!("{ADMIN_SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value that clears the admin session.
pub fn clear_session_cookie() -> String {
    format!("{ADMIN_SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use forum_shared::crypto::{generate_api_key, hash_api_key};

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; admin_session=tok; other=1"),
        );
        assert_eq!(cookie_value(&headers, "admin_session"), Some("tok"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_find_agent_by_key_skips_revoked() {
        let db = Database::open_in_memory().unwrap();
        let key_a = generate_api_key();
        let key_b = generate_api_key();
        let a = db.create_agent("a1", "alice", &hash_api_key(&key_a)).unwrap();
        let b = db.create_agent("b1", "bob", &hash_api_key(&key_b)).unwrap();
        db.create_agent("broken", "carol", "not-a-hash").unwrap();

        assert_eq!(find_agent_by_key(&db, &key_a).unwrap().map(|x| x.id), Some(a.id));
        assert_eq!(find_agent_by_key(&db, &key_b).unwrap().map(|x| x.id), Some(b.id));
        assert!(find_agent_by_key(&db, "nope").unwrap().is_none());

        db.revoke_agent(a.id).unwrap();
        assert!(find_agent_by_key(&db, &key_a).unwrap().is_none());
    }
}

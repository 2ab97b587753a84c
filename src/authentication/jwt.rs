use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::error::{Error, HtmlError};
use crate::schema::UserRole;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub user_uid: UserRole,
    /// Token id, the handle logout revokes.
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, uid: UserRole, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            user_uid: uid,
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp,
        }
    }
}

/// The authenticated caller, passed explicitly into every operation that
/// depends on who is asking.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub user_uid: UserRole,
    pub is_admin: bool,
    pub token_id: String,
    /// Unix timestamp after which the token is refused anyway.
    pub expires_at: i64,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(
                HtmlError::Forbidden.new("You don't have permission to perform this action")
            );
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.user_uid == UserRole::Admin,
            user_uid: value.user_uid,
            token_id: value.jti,
            expires_at: value.exp,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|_| HtmlError::InternalServerError.new("Invalid signing key"))
}

pub fn generate_jwt_session(user: &User, secret: &str, lifetime: Duration) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role, lifetime);

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session token: {e}");
        HtmlError::InternalServerError.new("Failed to sign session token")
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid session; Invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 42,
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Cook".to_string(),
            password: String::new(),
            role,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn token_round_trips_into_session() {
        let token = generate_jwt_session(&user(UserRole::Admin), "secret", Duration::hours(1)).unwrap();
        let session: SessionData = verify_jwt_session(&token, "secret").unwrap().into();

        assert_eq!(session.user_id, 42);
        assert_eq!(session.username, "cook");
        assert!(session.is_admin);
    }

    #[test]
    fn every_token_gets_its_own_id() {
        let cook = user(UserRole::User);
        let first: SessionData = verify_jwt_session(
            &generate_jwt_session(&cook, "secret", Duration::hours(1)).unwrap(),
            "secret",
        )
        .unwrap()
        .into();
        let second: SessionData = verify_jwt_session(
            &generate_jwt_session(&cook, "secret", Duration::hours(1)).unwrap(),
            "secret",
        )
        .unwrap()
        .into();

        assert_ne!(first.token_id, second.token_id);
        assert!(first.expires_at > Local::now().timestamp());
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let token = generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(1)).unwrap();
        let error = verify_jwt_session(&token, "other").unwrap_err();

        assert_eq!(error.code, 401);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(-1)).unwrap();
        let error = verify_jwt_session(&token, "secret").unwrap_err();

        assert_eq!(error.info.as_deref(), Some("Invalid session; Token expired"));
    }
}

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Local;
use redis::aio::MultiplexedConnection;

use crate::{
    cache::cache::{get_cache_value, set_expiring_cache_value},
    error::{Error, HtmlError},
};

use super::jwt::{verify_jwt_session, SessionData};

fn revoked_key(token_id: &str) -> String {
    format!("revoked-token-{token_id}")
}

/// Checks session tokens against the signing key and the logout denylist.
///
/// Revoked token ids are kept until the token would have expired anyway: in
/// redis when a cache is connected, in process memory otherwise.
#[derive(Clone)]
pub struct Sessions {
    secret: Arc<str>,
    cache: Option<MultiplexedConnection>,
    revoked: Arc<Mutex<HashMap<String, i64>>>,
}

impl Sessions {
    pub fn new(secret: Arc<str>, cache: Option<MultiplexedConnection>) -> Self {
        Self {
            secret,
            cache,
            revoked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<SessionData, Error> {
        let session: SessionData = verify_jwt_session(token, &self.secret)?.into();

        if self.is_revoked(&session.token_id).await? {
            return Err(HtmlError::InvalidSession.new("Invalid session; Token revoked"));
        }
        Ok(session)
    }

    /// Refuses the session's token from now on.
    pub async fn revoke(&self, session: &SessionData) -> Result<(), Error> {
        let now = Local::now().timestamp();
        let remaining = session.expires_at - now;
        if remaining <= 0 {
            return Ok(());
        }

        match self.cache.clone() {
            Some(mut cache) => {
                set_expiring_cache_value(
                    revoked_key(&session.token_id),
                    session.user_id,
                    remaining as u64,
                    &mut cache,
                )
                .await?
            }
            None => {
                let mut revoked = self.local()?;
                revoked.retain(|_, expires_at| *expires_at > now);
                revoked.insert(session.token_id.clone(), session.expires_at);
            }
        }

        log::info!("User {} logged out", session.user_id);
        Ok(())
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool, Error> {
        match self.cache.clone() {
            Some(mut cache) => Ok(get_cache_value::<String, i32>(revoked_key(token_id), &mut cache)
                .await?
                .is_some()),
            None => Ok(self.local()?.contains_key(token_id)),
        }
    }

    fn local(&self) -> Result<MutexGuard<'_, HashMap<String, i64>>, Error> {
        self.revoked.lock().map_err(|_| {
            log::error!("Revoked token list is poisoned");
            HtmlError::InternalServerError.default()
        })
    }
}

use warp::{reject::Rejection, Filter};

use crate::error::{Error, HtmlError};

use super::{jwt::SessionData, sessions::Sessions};

/// Extracts the token from `Authorization: Token <t>` or `Authorization: Bearer <t>`.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }
    match scheme {
        s if s.eq_ignore_ascii_case("token") || s.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

async fn session_from_header(
    header: Option<String>,
    sessions: &Sessions,
) -> Result<Option<SessionData>, Error> {
    let header = match header {
        Some(header) => header,
        None => return Ok(None),
    };
    let token = parse_authorization(&header)
        .ok_or_else(|| HtmlError::InvalidSession.new("Invalid session; Malformed authorization header"))?;

    sessions.verify(token).await.map(Some)
}

/// Requires an authenticated caller; rejects with 401 otherwise.
pub fn with_session(
    sessions: Sessions,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let sessions = sessions.clone();
        async move {
            match session_from_header(header, &sessions).await {
                Ok(Some(session)) => Ok(session),
                Ok(None) => Err(warp::reject::custom(HtmlError::Unauthorized.default())),
                Err(e) => Err(warp::reject::custom(e)),
            }
        }
    })
}

/// Resolves the caller when valid credentials are present, anonymous otherwise.
pub fn with_possible_session(
    sessions: Sessions,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let sessions = sessions.clone();
        async move {
            match session_from_header(header, &sessions).await {
                Ok(session) => Ok::<_, Rejection>(session),
                Err(e) => {
                    log::trace!("> Ignoring credentials: {e}");
                    Ok(None)
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn token_and_bearer_schemes_are_accepted() {
        assert_eq!(parse_authorization("Token abc.def"), Some("abc.def"));
        assert_eq!(parse_authorization("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_authorization("bearer  abc"), Some("abc"));
    }

    #[test]
    fn other_schemes_are_refused() {
        assert_eq!(parse_authorization("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_authorization("Token"), None);
        assert_eq!(parse_authorization("Token "), None);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let filter = with_session(Sessions::new(Arc::from("secret"), None));
        let rejection = warp::test::request().filter(&filter).await.unwrap_err();

        assert_eq!(rejection.find::<Error>().map(|e| e.code), Some(401));
    }

    #[tokio::test]
    async fn garbage_credentials_read_as_anonymous() {
        let filter = with_possible_session(Sessions::new(Arc::from("secret"), None));
        let session = warp::test::request()
            .header("authorization", "Token not-a-jwt")
            .filter(&filter)
            .await
            .unwrap();

        assert!(session.is_none());
    }
}

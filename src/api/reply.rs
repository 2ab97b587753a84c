use std::convert::Infallible;

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, Rejection,
        UnsupportedMediaType,
    },
    reply::{self, Reply, Response},
    Filter,
};

use crate::{
    constants::MAX_BODY_BYTES,
    error::{Error, HtmlError},
};

/// JSON request body, capped at `MAX_BODY_BYTES`.
pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn json<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    reply::with_status(reply::reply(), StatusCode::NO_CONTENT).into_response()
}

fn rejection_error(err: &Rejection) -> Error {
    if let Some(e) = err.find::<Error>() {
        return e.clone();
    }
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if let Some(e) = err.find::<InvalidQuery>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return HtmlError::PayloadTooLarge.default();
    }
    if err.find::<LengthRequired>().is_some() || err.find::<UnsupportedMediaType>().is_some() {
        return HtmlError::InvalidRequest.new("Expected a JSON request body");
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return HtmlError::MethodNotAllowed.default();
    }
    if err.is_not_found() {
        return HtmlError::NotFound.default();
    }

    log::error!("Unhandled rejection: {err:?}");
    HtmlError::InternalServerError.default()
}

/// Renders every rejection as a JSON error body with its status.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let error = rejection_error(&err);
    if error.code >= 500 {
        log::error!("> {error}");
    } else {
        log::trace!("> {error}");
    }

    Ok(error.into_reply())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn custom_errors_keep_their_status_and_body() {
        let rejection: Rejection = HtmlError::InvalidRequest.field("cooking_time", "bad").into();
        let response = handle_rejection(rejection).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let response = handle_rejection(warp::reject::not_found()).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rejection_errors_render_as_detail() {
        let error = rejection_error(&warp::reject::not_found());

        assert_eq!(error.body(), json!({ "detail": "Not found" }));
    }
}

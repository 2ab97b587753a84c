use serde_json::{json, Map, Value};
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::{self, Reply},
};

/// Error surfaced to the caller of an API operation.
///
/// `code` is the HTTP status the error renders with, `info` the human readable
/// message and `field` the request field the message is scoped to, if any.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {}", .info.as_deref().unwrap_or("-"))]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
    pub field: Option<String>,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> Value {
        let info = self
            .info
            .clone()
            .unwrap_or_else(|| self.status().canonical_reason().unwrap_or("Error").to_string());

        match &self.field {
            Some(field) => {
                let mut body = Map::new();
                body.insert(field.to_owned(), json!([info]));
                Value::Object(body)
            }
            None => json!({ "detail": info }),
        }
    }

    pub fn into_reply(self) -> reply::Response {
        reply::with_status(reply::json(&self.body()), self.status()).into_response()
    }
}

impl Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::InvalidSession => 401,
            HtmlError::Unauthorized => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::MethodNotAllowed => 405,
            HtmlError::PayloadTooLarge => 413,
            HtmlError::InternalServerError => 500,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::InvalidSession => "Invalid session",
            HtmlError::Unauthorized => "Authentication credentials were not provided",
            HtmlError::Forbidden => "You do not have permission to perform this action",
            HtmlError::NotFound => "Not found",
            HtmlError::MethodNotAllowed => "Method not allowed",
            HtmlError::PayloadTooLarge => "Payload too large",
            HtmlError::InternalServerError => "Internal server error",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            field: None,
        }
    }

    pub fn default(self) -> Error {
        self.new(self.message())
    }

    /// Error scoped to a single request field, rendered as `{"<field>": ["<info>"]}`.
    pub fn field(self, field: &str, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            field: Some(field.to_string()),
        }
    }
}

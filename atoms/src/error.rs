use lambda_http::{http::StatusCode, Body, Response};
use thiserror::Error;

/// Domain error taxonomy. Every error is scoped to the operation that
/// raised it; nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("upload error: {0}")]
    Upload(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Illegal status transition (skipped stage, backward move, or an
    /// action on a DONE incident).
    #[error("invalid status transition: {0}")]
    Transition(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Store(_) | Error::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::AccessDenied(_) => StatusCode::FORBIDDEN,
            Error::Transition(_) => StatusCode::CONFLICT,
        }
    }
}

/// Render a domain error as a JSON response in the shape the front end
/// expects for its per-view "could not load/update" messages.
pub fn error_response(err: &Error) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(err.status_code())
        .header("Content-Type", "application/json")
        .body(
            serde_json::json!({ "error": err.to_string() })
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_error_to_its_status() {
        assert_eq!(
            Error::Validation("title".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Store("dynamo".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Upload("s3".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::AccessDenied("role".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Transition("done".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn renders_the_error_body_shape() {
        let resp = error_response(&Error::Transition("already DONE".into())).unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = match resp.body() {
            Body::Text(text) => text.clone(),
            _ => panic!("expected a text body"),
        };
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(value["error"].as_str().unwrap().contains("already DONE"));
    }
}

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sportsbuddy_api_types::{FailureEnvelope, RateLimitedBody, SuccessEnvelope};

use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::RepoError;
use crate::cache::CacheEligibility;
use crate::domain::error::DomainError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const REPO: &str = "repo_error";
    pub const INTERNAL: &str = "internal_error";
}

/// Successful handler result. Always declares itself cacheable; the cache
/// layer still only stores `200` responses to `GET` requests.
#[derive(Debug)]
pub struct ApiOk<T> {
    status: StatusCode,
    data: T,
}

impl<T> ApiOk<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(SuccessEnvelope::new(self.data))).into_response();
        response
            .extensions_mut()
            .insert(CacheEligibility::Cacheable);
        response
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    fn with_source(mut self, error: &AppError) -> Self {
        self.report = Some(ErrorReport::from_error(
            "infra::http::api",
            self.status,
            error,
        ));
        self
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn internal(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Unexpected error occurred",
            Some(hint.into()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// `429` with the limiter's numbers in both headers and body.
    pub fn rate_limited(limit: u32, reset_ms: u64, retry_after: u64) -> Response {
        let body = RateLimitedBody {
            success: false,
            message: "Too many requests, please try again later.".to_string(),
            retry_after,
            limit,
            remaining: 0,
            reset: reset_ms,
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        response.extensions_mut().insert(CacheEligibility::Skip);
        ErrorReport::from_message(
            "infra::http::api::rate_limit",
            StatusCode::TOO_MANY_REQUESTS,
            format!("{}: retry_after={retry_after}", codes::RATE_LIMITED),
        )
        .attach(&mut response);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        let body = FailureEnvelope {
            success: false,
            message: self.message.to_string(),
            code: self.code.to_string(),
            hint: self.hint,
        };
        let mut response = (self.status, Json(body)).into_response();
        response.extensions_mut().insert(CacheEligibility::Skip);
        self.report
            .unwrap_or_else(|| ErrorReport::from_message("infra::http::api", self.status, detail))
            .attach(&mut response);
        response
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        let api_error = match &error {
            AppError::Domain(DomainError::Validation { field, message }) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Request could not be processed",
                Some(format!("`{field}` {message}")),
            ),
            AppError::NotFound { entity, id } => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} `{id}` does not exist")),
            ),
            AppError::Repo(RepoError::NotFound) => Self::not_found("Resource not found"),
            AppError::Repo(RepoError::Duplicate { constraint }) => Self::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint.clone()),
            ),
            AppError::Repo(RepoError::Persistence(message)) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                Some(message.clone()),
            ),
            AppError::Infra(err) => Self::internal(err.to_string()),
            AppError::Unexpected(message) => Self::internal(message.clone()),
        };
        if api_error.status.is_server_error() {
            api_error.with_source(&error)
        } else {
            api_error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::error::InfraError;

    #[test]
    fn errors_are_never_cacheable() {
        let response = ApiError::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.extensions().get::<CacheEligibility>(),
            Some(&CacheEligibility::Skip)
        );
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }

    #[test]
    fn success_declares_cacheable() {
        let response = ApiOk::new(vec![1, 2]).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.extensions().get::<CacheEligibility>(),
            Some(&CacheEligibility::Cacheable)
        );
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let error = ApiError::from(AppError::from(DomainError::validation("title", "too long")));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code, codes::INVALID_INPUT);
    }

    #[test]
    fn server_errors_report_the_source_chain() {
        let error = AppError::from(InfraError::telemetry("socket closed"));
        let response = ApiError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(
            report.messages[0],
            "could not install the log subscriber: socket closed"
        );
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(5, 1_700_000_000_000, 42);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}

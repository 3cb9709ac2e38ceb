// Warp error handling and propagation
// Courtesy of https://github.com/seanmonstar/warp/pull/909#issuecomment-1184854848
//
// Usage:
//
//   1) A handler function, instead of returning a Warp reply/rejection, returns a
//   `Result<Reply, ApiError>.`
//
//   Rejections mean "this filter can't handle this request, but maybe another can", so
//   warp falls through to the other routes. Errors raised inside a handler are final,
//   and a Result lets the handler bail out with `?`.
//
//   2) ApiError knows how to convert itself into a JSON envelope + status code, so it
//   implements Reply.
//
//   3) We can't implement Reply for Result<Reply, Reply> (we don't control Result), so
//   `into_response` does the final conversion:
//
//   ```
//   .then(my_handler_func)
//   .map(into_response)
//   ```
//

use std::convert::Infallible;

use serde::Serialize;
use tracing::error;
use warp::hyper::{Body, Response, StatusCode};
use warp::{Rejection, Reply};

use crate::repository::interface::Error as RepositoryError;
use crate::translate::Error as TranslateError;

/// `{error, details}` body shared by every failure response
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    // Missing or malformed client input
    BadRequest {
        error: String,
        details: Option<String>,
    },
    // Zero rows matched an update or delete
    RecordNotFound,
    // Everything else: engine errors, connection problems, upstream API failures
    Failed {
        error: &'static str,
        details: Option<String>,
    },
}

impl ApiError {
    pub fn bad_request(error: &str) -> Self {
        ApiError::BadRequest {
            error: error.to_string(),
            details: None,
        }
    }

    pub fn invalid_body(err: serde_json::Error) -> Self {
        error!("Rejecting request body: {err}");
        ApiError::BadRequest {
            error: "Invalid request body".to_string(),
            details: Some(err.to_string()),
        }
    }

    /// Attach the operation that failed and log the failure
    pub fn from_repository(operation: &'static str, err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ApiError::RecordNotFound,
            RepositoryError::Validation(_) | RepositoryError::UnknownColumn { .. } => {
                error!("{operation}: {err}");
                ApiError::BadRequest {
                    error: operation.to_string(),
                    details: Some(err.to_string()),
                }
            }
            other => {
                error!("{operation}: {other:?}");
                ApiError::Failed {
                    error: operation,
                    details: Some(other.to_string()),
                }
            }
        }
    }

    pub fn from_translation(err: TranslateError) -> Self {
        error!("Natural language translation failed: {err:?}");
        ApiError::Failed {
            error: "Failed to generate SQL query",
            details: Some(err.to_string()),
        }
    }

    fn status_code_body(self) -> (StatusCode, ErrorBody) {
        match self {
            ApiError::BadRequest { error, details } => {
                (StatusCode::BAD_REQUEST, ErrorBody { error, details })
            }
            ApiError::RecordNotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "Record not found".to_string(),
                    details: None,
                },
            ),
            ApiError::Failed { error, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: error.to_string(),
                    details,
                },
            ),
        }
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response<Body> {
        let (status, body) = self.status_code_body();
        warp::reply::with_status(warp::reply::json(&body), status).into_response()
    }
}

pub fn into_response<S: Reply, E: Reply>(reply_res: Result<S, E>) -> Response<Body> {
    match reply_res {
        Ok(resp) => resp.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Turn warp's own rejections (unknown route, wrong method, oversized body...) into
/// the same JSON envelope the handlers use
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    // Routes that didn't match add their own rejections, so look for the specific
    // ones before the generic 404/405
    let (status, error) = if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string")
    } else if err.find::<warp::cors::CorsForbidden>().is_some() {
        (StatusCode::FORBIDDEN, "CORS request forbidden")
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!("Unhandled rejection: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            error: error.to_string(),
            details: None,
        }),
        status,
    ))
}

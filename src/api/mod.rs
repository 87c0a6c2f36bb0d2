//! Thin warp surface over the store, health tracker and notification
//! engine. Handlers translate paths and bodies and nothing more.

mod node;
mod query;
mod registration;

pub use node::*;
pub use query::*;
pub use registration::*;


use std::convert::Infallible;

use serde::Serialize;
use tracing::debug;
use tracing::error;
use warp::http::StatusCode;
use warp::path::Tail;
use warp::reply::Response;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::Error;

/// JSON error body
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    error: String,
    debug: Option<String>,
}

fn error_response(
    status: StatusCode,
    message: String,
    debug: Option<String>,
) -> Response {
    let body = ErrorBody {
        code: status.as_u16(),
        error: message,
        debug,
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

pub(crate) fn error_reply(e: &Error) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %e, "Request failed");
        error_response(status, e.to_string(), Some(format!("{e:?}")))
    } else {
        debug!(%status, error = %e, "Request rejected");
        error_response(status, e.to_string(), None)
    }
}

pub(crate) fn json_reply<T: Serialize>(
    value: &T,
    status: StatusCode,
) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub(crate) fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found".into(), None)
}

pub(crate) fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Path segments after a prefix, ignoring empty ones so that trailing
/// slashes are optional.
pub(crate) fn segments(tail: &Tail) -> Vec<&str> {
    tail.as_str().split('/').filter(|s| !s.is_empty()).collect()
}

/// Mounts `filter` under a slash separated prefix such as `x-nmos/node/v1.0`.
pub(crate) fn under(base: &'static str) -> warp::filters::BoxedFilter<()> {
    base.split('/')
        .fold(warp::any().boxed(), |filter, segment| filter.and(warp::path(segment)).boxed())
}

pub(crate) fn with_state<T: Clone + Send + Sync + 'static>(state: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Turns unmatched routes and bad bodies into JSON errors.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let response = if err.is_not_found() {
        not_found()
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        error_response(StatusCode::BAD_REQUEST, e.to_string(), None)
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        error_response(StatusCode::BAD_REQUEST, e.to_string(), None)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".into(), None)
    } else {
        error!(rejection = ?err, "Unhandled rejection");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into(), Some(format!("{err:?}")))
    };
    Ok(response)
}

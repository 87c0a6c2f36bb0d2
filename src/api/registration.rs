//! Registration API, served by a registry under `/x-nmos/registration/v1.0`.
//!
//! | Method | Path                      | Result                         |
//! |--------|---------------------------|--------------------------------|
//! | POST   | `resource`                | 201 created, 200 updated       |
//! | GET    | `resource/{type}s/{id}`   | 200 or 404                     |
//! | DELETE | `resource/{type}s/{id}`   | 204 or 404                     |
//! | POST   | `health/nodes/{id}`       | 200 `{"health": secs}` or 404  |

use std::convert::Infallible;

use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use tracing::info;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::path::Tail;
use warp::reply::Response;
use warp::Filter;
use warp::Reply;

use super::error_reply;
use super::json_reply;
use super::no_content;
use super::not_found;
use super::segments;
use super::under;
use super::with_state;
use crate::constants::REGISTRATION_API_BASE;
use crate::Error;
use crate::HealthTracker;
use crate::Identified;
use crate::Resource;
use crate::ResourceKind;
use crate::StoreHandle;
use crate::Versioned;

/// Body of `POST resource`
#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

#[derive(Clone)]
struct RegistrationApi {
    store: StoreHandle,
    tracker: HealthTracker,
}

pub fn registration_routes(
    store: StoreHandle,
    tracker: HealthTracker,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let state = RegistrationApi { store, tracker };

    let post = warp::post()
        .and(warp::path::tail())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(post_handler);
    let get = warp::get()
        .and(warp::path::tail())
        .and(with_state(state.clone()))
        .and_then(get_handler);
    let delete = warp::delete()
        .and(warp::path::tail())
        .and(with_state(state))
        .and_then(delete_handler);

    under(REGISTRATION_API_BASE).and(post.or(get).unify().or(delete).unify())
}

async fn post_handler(
    tail: Tail,
    body: Bytes,
    state: RegistrationApi,
) -> Result<Response, Infallible> {
    let response = match segments(&tail).as_slice() {
        ["resource"] => register(body, &state).await,
        ["health", "nodes", id] => match state.tracker.heartbeat(&state.store.snapshot(), id) {
            Ok(health) => json_reply(&json!({ "health": health }), StatusCode::OK),
            Err(e) => error_reply(&e),
        },
        _ => not_found(),
    };
    Ok(response)
}

async fn register(
    body: Bytes,
    state: &RegistrationApi,
) -> Response {
    let request: RegistrationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_reply(&Error::from(e)),
    };
    let resource = match request.kind.parse::<ResourceKind>().and_then(|kind| Resource::from_value(kind, request.data)) {
        Ok(resource) => resource,
        Err(e) => return error_reply(&e),
    };
    let kind = resource.kind();

    // A node re-registering the version we already hold is not a conflict
    if let Ok(stored) = state.store.get(resource.id(), Some(kind)) {
        if stored.version() == resource.version() {
            if kind == ResourceKind::Node {
                state.tracker.touch(stored.id());
            }
            return json_reply(&stored, StatusCode::OK);
        }
    }

    match state.store.put(resource).await {
        Ok(outcome) => {
            let stored = outcome.resource;
            if kind == ResourceKind::Node {
                state.tracker.touch(stored.id());
            }
            if outcome.previous.is_none() {
                info!(%kind, id = %stored.id(), "Resource registered");
                let location = format!("/{REGISTRATION_API_BASE}/resource/{}/{}", kind.plural(), stored.id());
                warp::reply::with_header(json_reply(&stored, StatusCode::CREATED), "Location", location).into_response()
            } else {
                json_reply(&stored, StatusCode::OK)
            }
        }
        Err(e) => error_reply(&e),
    }
}

async fn get_handler(
    tail: Tail,
    state: RegistrationApi,
) -> Result<Response, Infallible> {
    let response = match segments(&tail).as_slice() {
        ["resource", plural, id] => match ResourceKind::from_plural(plural) {
            Some(kind) => match state.store.get(id, Some(kind)) {
                Ok(resource) => json_reply(&resource, StatusCode::OK),
                Err(e) => error_reply(&e),
            },
            None => not_found(),
        },
        _ => not_found(),
    };
    Ok(response)
}

async fn delete_handler(
    tail: Tail,
    state: RegistrationApi,
) -> Result<Response, Infallible> {
    let response = match segments(&tail).as_slice() {
        ["resource", plural, id] => match ResourceKind::from_plural(plural) {
            Some(kind) => match state.store.delete(kind, id).await {
                Ok(_) => {
                    if kind == ResourceKind::Node {
                        state.tracker.forget(id);
                    }
                    info!(%kind, %id, "Resource deregistered");
                    no_content()
                }
                Err(e) => error_reply(&e),
            },
            None => not_found(),
        },
        _ => not_found(),
    };
    Ok(response)
}

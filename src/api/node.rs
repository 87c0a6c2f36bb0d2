//! Node API: a read-only view of a node's own store.

use std::convert::Infallible;

use warp::http::StatusCode;
use warp::path::Tail;
use warp::reply::Response;
use warp::Filter;

use super::error_reply;
use super::json_reply;
use super::not_found;
use super::segments;
use super::under;
use super::with_state;
use crate::constants::NODE_API_BASE;
use crate::ListQuery;
use crate::ResourceKind;
use crate::StoreHandle;

pub fn node_routes(store: StoreHandle) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    under(NODE_API_BASE)
        .and(warp::get())
        .and(warp::path::tail())
        .and(with_state(store))
        .and_then(get_handler)
}

async fn get_handler(
    tail: Tail,
    store: StoreHandle,
) -> Result<Response, Infallible> {
    let response = match segments(&tail).as_slice() {
        [] => {
            let index: Vec<String> = std::iter::once("self/".to_string())
                .chain(ResourceKind::ALL[1..].iter().map(|k| format!("{}/", k.plural())))
                .collect();
            json_reply(&index, StatusCode::OK)
        }
        ["self"] => match store.snapshot().self_node() {
            Some(node) => json_reply(node, StatusCode::OK),
            None => not_found(),
        },
        [plural] => match ResourceKind::from_plural(plural).filter(|k| *k != ResourceKind::Node) {
            Some(kind) => match store.list(kind, &ListQuery::new()) {
                Ok(page) => json_reply(&page.items, StatusCode::OK),
                Err(e) => error_reply(&e),
            },
            None => not_found(),
        },
        [plural, id] => match ResourceKind::from_plural(plural).filter(|k| *k != ResourceKind::Node) {
            Some(kind) => match store.get(id, Some(kind)) {
                Ok(resource) => json_reply(&resource, StatusCode::OK),
                Err(e) => error_reply(&e),
            },
            None => not_found(),
        },
        _ => not_found(),
    };
    Ok(response)
}

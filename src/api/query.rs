//! Query API under `/x-nmos/query/v1.0` and the websocket endpoint that
//! delivers subscription grains.

use std::collections::HashMap;
use std::convert::Infallible;

use futures::SinkExt;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;
use tracing::warn;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::path::Tail;
use warp::reply::Response;
use warp::ws::Message;
use warp::ws::WebSocket;
use warp::ws::Ws;
use warp::Filter;
use warp::Reply;

use super::error_reply;
use super::json_reply;
use super::no_content;
use super::not_found;
use super::segments;
use super::under;
use super::with_state;
use crate::constants::QUERY_API_BASE;
use crate::Connection;
use crate::ListQuery;
use crate::NotificationEngine;
use crate::Page;
use crate::ResourceKind;
use crate::StoreHandle;

#[derive(Clone)]
struct QueryState {
    store: StoreHandle,
    engine: NotificationEngine,
}

pub fn query_routes(
    store: StoreHandle,
    engine: NotificationEngine,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let state = QueryState { store, engine };

    let get = warp::get()
        .and(warp::path::tail())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_state(state.clone()))
        .and_then(get_handler);
    let post = warp::post()
        .and(warp::path::tail())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(post_handler);
    let delete = warp::delete()
        .and(warp::path::tail())
        .and(with_state(state))
        .and_then(delete_handler);

    under(QUERY_API_BASE).and(get.or(post).unify().or(delete).unify())
}

/// `GET /ws/?uid={subscription}` upgrades to a grain stream.
pub fn websocket_route(engine: NotificationEngine) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::tail())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::ws())
        .and(with_state(engine))
        .and_then(upgrade)
}

fn collections() -> Vec<String> {
    ResourceKind::ALL
        .iter()
        .map(|k| format!("{}/", k.plural()))
        .chain(std::iter::once("subscriptions/".to_string()))
        .collect()
}

async fn get_handler(
    tail: Tail,
    params: Vec<(String, String)>,
    state: QueryState,
) -> Result<Response, Infallible> {
    let response = match segments(&tail).as_slice() {
        [] => json_reply(&collections(), StatusCode::OK),
        ["subscriptions"] => json_reply(&state.engine.subscriptions(), StatusCode::OK),
        ["subscriptions", id] => match state.engine.subscription(id) {
            Ok(subscription) => json_reply(&subscription, StatusCode::OK),
            Err(e) => error_reply(&e),
        },
        [plural] => match ResourceKind::from_plural(plural) {
            Some(kind) => list(&state.store, kind, &params),
            None => not_found(),
        },
        [plural, id] => match ResourceKind::from_plural(plural) {
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

fn list(
    store: &StoreHandle,
    kind: ResourceKind,
    params: &[(String, String)],
) -> Response {
    let page = ListQuery::from_params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .and_then(|query| store.list(kind, &query));
    match page {
        Ok(page) => paged_reply(page),
        Err(e) => error_reply(&e),
    }
}

fn paged_reply(page: Page) -> Response {
    let reply = warp::reply::json(&page.items);
    let reply = warp::reply::with_header(reply, "X-Total-Count", page.total.to_string());
    let reply = warp::reply::with_header(reply, "X-Page", page.page.to_string());
    let reply = warp::reply::with_header(reply, "X-Pages", page.pages.to_string());
    reply.into_response()
}

async fn post_handler(
    tail: Tail,
    body: Bytes,
    state: QueryState,
) -> Result<Response, Infallible> {
    let response = match segments(&tail).as_slice() {
        ["subscriptions"] => match parse(&body).and_then(|request| state.engine.create_subscription(&request)) {
            Ok((subscription, true)) => json_reply(&subscription, StatusCode::CREATED),
            Ok((subscription, false)) => json_reply(&subscription, StatusCode::OK),
            Err(e) => error_reply(&e),
        },
        _ => not_found(),
    };
    Ok(response)
}

fn parse(body: &[u8]) -> crate::Result<Value> {
    Ok(serde_json::from_slice(body)?)
}

async fn delete_handler(
    tail: Tail,
    state: QueryState,
) -> Result<Response, Infallible> {
    let response = match segments(&tail).as_slice() {
        ["subscriptions", id] => match state.engine.delete_subscription(id) {
            Ok(()) => no_content(),
            Err(e) => error_reply(&e),
        },
        _ => not_found(),
    };
    Ok(response)
}

async fn upgrade(
    _tail: Tail,
    params: HashMap<String, String>,
    ws: Ws,
    engine: NotificationEngine,
) -> Result<Response, Infallible> {
    let Some(uid) = params.get("uid") else {
        return Ok(not_found());
    };
    // Connect before upgrading so an unknown id is a plain 404
    let response = match engine.connect(uid) {
        Ok(connection) => ws.on_upgrade(move |socket| serve(socket, connection)).into_response(),
        Err(e) => error_reply(&e),
    };
    Ok(response)
}

async fn serve(
    socket: WebSocket,
    mut connection: Connection,
) {
    let subscription = connection.subscription.id.clone();
    let (mut tx, mut rx) = socket.split();
    debug!(%subscription, "Websocket open");

    loop {
        tokio::select! {
            grain = connection.grains.recv() => {
                let Some(grain) = grain else { break };
                let text = match serde_json::to_string(&grain) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%subscription, error = %e, "Failed to encode grain");
                        continue;
                    }
                };
                if tx.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            incoming = rx.next() => match incoming {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%subscription, error = %e, "Websocket error");
                    break;
                }
                None => break,
            },
        }
    }

    let _ = tx.close().await;
    debug!(%subscription, "Websocket closed");
}

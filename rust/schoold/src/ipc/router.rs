use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::public::try_handle,
    handlers::dashboard::try_handle,
    handlers::students::try_handle,
    handlers::teachers::try_handle,
    handlers::classes::try_handle,
    handlers::payments::try_handle,
    handlers::attendance::try_handle,
    handlers::notices::try_handle,
    handlers::exams::try_handle,
    handlers::results::try_handle,
    handlers::gallery::try_handle,
    handlers::teacher_portal::try_handle,
    handlers::student_portal::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(method = %req.method, id = %req.id, "dispatch");
    for try_handle in FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

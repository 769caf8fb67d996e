use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_events_poll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let drained = state.events.drain_json();
    ok(&req.id, json!({ "events": drained }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "events.poll" => Some(handle_events_poll(state, req)),
        _ => None,
    }
}

//! Admin HTTP surface (§4.8), grounded on the teacher's
//! `presentation/api.rs` (Axum `Router` + `State` + `Json`/`IntoResponse`
//! handlers), retargeted from execution/approval endpoints to the
//! `/proc`-like introspection tree.
//!
//! `StackInstance` is deliberately `!Sync` (§5/§9: "a StackInstance is not
//! thread-safe internally and must be used from one thread at a time"), so
//! unlike the teacher's `AppState` — which holds long-lived `Arc<dyn
//! ExecutionService>` shared across every request — this surface's state
//! holds only the process-wide `PluginManager` and builds a fresh,
//! short-lived stack per request, never held across an `.await`.

use crate::application::plugin_manager::PluginManager;
use crate::application::proc_catalog::ProcCatalog;
use crate::application::security_service::create_security_context;
use crate::application::stack::StackInstance;
use crate::domain::security::SecurityCredentials;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    plugin_manager: Arc<PluginManager>,
}

pub fn app(plugin_manager: Arc<PluginManager>) -> Router {
    Router::new()
        .route("/proc/stack", get(proc_stack))
        .route("/proc/whoami", get(proc_whoami))
        .with_state(AppState { plugin_manager })
}

/// The identity this surface presents to the stack it introspects: not a
/// real client, so `client_name` is a fixed sentinel rather than anything
/// pulled off the wire.
fn admin_credentials() -> SecurityCredentials {
    SecurityCredentials {
        mechanism: "admin-http".into(),
        client_name: "proc-http".into(),
        remote_address: "local".into(),
        fqans: Vec::new(),
        session_id: None,
    }
}

/// Builds a request-scoped stack, installs an admin `SecurityContext`, and
/// materialises its catalog — the same sequence §2's control-flow
/// walkthrough describes for a real client, run fresh per request since the
/// `Rc`-backed arena cannot be shared across requests.
async fn admin_proc_catalog(plugin_manager: Arc<PluginManager>) -> Result<ProcCatalog, StatusCode> {
    let stack = StackInstance::new(plugin_manager);
    let authn = stack.authn().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let ctx = create_security_context(authn.as_ref(), admin_credentials())
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    stack.set_security_context(ctx);
    stack.catalog().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(ProcCatalog::new(stack.handle()))
}

async fn render_proc(plugin_manager: Arc<PluginManager>, path: &str) -> Response {
    let proc = match admin_proc_catalog(plugin_manager).await {
        Ok(proc) => proc,
        Err(status) => return status.into_response(),
    };
    match proc.render(path) {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

async fn proc_stack(State(state): State<AppState>) -> Response {
    render_proc(state.plugin_manager, "/proc/stack").await
}

async fn proc_whoami(State(state): State<AppState>) -> Response {
    render_proc(state.plugin_manager, "/proc/whoami").await
}

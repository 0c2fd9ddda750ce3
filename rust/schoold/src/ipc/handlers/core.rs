use crate::auth::Role;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{authorize, optional_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "activeSessions": state.sessions.len(),
        }),
    )
}

/// Open (or create) a workspace and make it current. Sessions from a
/// previous workspace are dropped.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let conn = db::open_db(&path)?;
    tracing::info!(path = %path.display(), "workspace opened");
    state.db = Some(conn);
    state.workspace = Some(path);
    state.sessions.clear();
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

fn seed(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let admins = db::admin_count(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    // Bootstrap is open until the first admin exists.
    if admins > 0 {
        authorize(state, req, Some(Role::Admin))?;
    }
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };

    let email = optional_str(&req.params, "adminEmail")?
        .unwrap_or_else(|| db::DEFAULT_ADMIN_EMAIL.to_string());
    let password = optional_str(&req.params, "adminPassword")?
        .unwrap_or_else(|| db::DEFAULT_ADMIN_PASSWORD.to_string());

    let summary = db::seed_defaults(conn, &email, &password)
        .map_err(|e| HandlerErr::new("db_insert_failed", format!("{e:#}")))?;
    tracing::info!(
        admin_created = summary.admin_created,
        classes_created = summary.classes_created,
        subjects_created = summary.subjects_created,
        "default data seeded"
    );
    Ok(json!({
        "adminCreated": summary.admin_created,
        "classesCreated": summary.classes_created,
        "subjectsCreated": summary.subjects_created,
    }))
}

fn handle_seed_defaults(state: &mut AppState, req: &Request) -> serde_json::Value {
    match seed(state, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "setup.seedDefaults" => Some(handle_seed_defaults(state, req)),
        _ => None,
    }
}

use crate::auth::Role;
use crate::backup;
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{authorize, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn workspace_of(state: &AppState) -> Result<PathBuf, HandlerErr> {
    match (&state.workspace, &state.db) {
        (Some(p), Some(_)) => Ok(p.clone()),
        _ => Err(HandlerErr::new("no_workspace", "select a workspace first")),
    }
}

fn export(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let workspace = workspace_of(state)?;
    authorize(state, req, Some(Role::Admin))?;
    let out_path = PathBuf::from(required_str(&req.params, "outPath")?);

    let summary = backup::export_workspace_bundle(&workspace, &out_path).map_err(|e| {
        tracing::error!(error = %e, "bundle export failed");
        HandlerErr::new("backup_failed", format!("{e:#}"))
    })?;
    tracing::info!(out = %out_path.display(), "workspace bundle exported");
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "dbSha256": summary.db_sha256,
    }))
}

fn import(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let workspace = workspace_of(state)?;
    authorize(state, req, Some(Role::Admin))?;
    let in_path = PathBuf::from(required_str(&req.params, "inPath")?);
    if !in_path.is_file() {
        return Err(HandlerErr::not_found("bundle file"));
    }

    // The database file is replaced underneath; drop our handle first.
    state.db = None;
    let restored = backup::import_workspace_bundle(&in_path, &workspace);
    match db::open_db(&workspace) {
        Ok(conn) => state.db = Some(conn),
        Err(e) => {
            state.workspace = None;
            state.sessions.clear();
            tracing::error!(error = %e, "workspace reopen after import failed");
            return Err(HandlerErr::new("db_open_failed", format!("{e:#}")));
        }
    }
    let summary = restored.map_err(|e| {
        tracing::error!(error = %e, "bundle import failed");
        HandlerErr::new("backup_failed", format!("{e:#}"))
    })?;
    // Accounts may differ in the restored data.
    state.sessions.clear();
    tracing::info!(
        input = %in_path.display(),
        format = %summary.bundle_format_detected,
        "workspace bundle imported"
    );

    Ok(json!({
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormatDetected": summary.bundle_format_detected,
        "exportedAt": summary.exported_at,
        "sourceAppVersion": summary.app_version,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export(state, req),
        "backup.importWorkspaceBundle" => import(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}

use crate::auth::{self, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{authorize, db_err, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

fn login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let role_raw = required_str(&req.params, "role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", role_raw)))?;
    let email = required_str(&req.params, "email")?;
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?;

    let active_clause = match role {
        Role::Admin => "",
        Role::Teacher | Role::Student => " AND is_active = 1",
    };
    let sql = format!(
        "SELECT id, name, password_hash FROM {} WHERE email = ?{} ORDER BY created_at LIMIT 1",
        role.table(),
        active_clause
    );
    let account: Option<(String, String, String)> = conn
        .query_row(&sql, [&email], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .optional()
        .map_err(db_err("db_query_failed"))?;

    let Some((user_id, user_name, hash)) = account else {
        tracing::warn!(event = "auth_failure", role = role.as_str(), reason = "unknown_user", "login rejected");
        return Err(HandlerErr::not_found(role.label()));
    };
    if !auth::verify_password(password, &hash) {
        tracing::warn!(event = "auth_failure", role = role.as_str(), reason = "bad_password", "login rejected");
        return Err(HandlerErr::new("invalid_password", "Invalid password"));
    }

    let token = state
        .sessions
        .issue(role, &user_id, &user_name, chrono::Utc::now());
    tracing::info!(role = role.as_str(), user_id = %user_id, "login");
    Ok(json!({
        "token": token,
        "role": role.as_str(),
        "userId": user_id,
        "userName": user_name,
    }))
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    match login(state, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let revoked = req
        .session
        .as_deref()
        .map(|t| state.sessions.revoke(t))
        .unwrap_or(false);
    if revoked {
        tracing::info!("logout");
    }
    ok(&req.id, json!({ "loggedOut": true }))
}

fn handle_whoami(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    match authorize(state, req, None) {
        Ok(s) => ok(
            &req.id,
            json!({
                "role": s.role.as_str(),
                "userId": s.user_id,
                "userName": s.user_name,
            }),
        ),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.whoami" => Some(handle_whoami(state, req)),
        _ => None,
    }
}

//! Notice board and school events.

use crate::auth::{Role, Session};
use crate::db;
use crate::ipc::helpers::{
    choice, db_table_err, guarded, optional_bool, optional_date, optional_str, optional_time,
    required_date, required_str, require_exists, HandlerResult, Op,
};
use crate::ipc::rows::{event_json, notice_json, query_all, EVENT_COLS, NOTICE_COLS};
use crate::ipc::types::{AppState, Request};
use crate::model::{Audience, NoticeCategory, NoticePriority};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn notices_list(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    let notices = query_all(
        conn,
        &format!(
            "SELECT {} FROM notices ORDER BY notice_date DESC, created_at DESC",
            NOTICE_COLS
        ),
        [],
        notice_json,
    )?;
    Ok(json!({
        "notices": notices,
        "categories": NoticeCategory::labels(),
        "priorities": NoticePriority::labels(),
        "audiences": Audience::labels(),
    }))
}

fn notices_create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let title = required_str(params, "title")?;
    let description = required_str(params, "description")?;
    let issued_by = required_str(params, "issuedBy")?;
    let category = choice(params, "category", NoticeCategory::parse, NoticeCategory::default())?;
    let priority = choice(params, "priority", NoticePriority::parse, NoticePriority::default())?;
    let audience = choice(params, "audience", Audience::parse, Audience::default())?;
    let valid_until = optional_date(params, "validUntil")?;
    let file_path = optional_str(params, "filePath")?;
    let is_active = optional_bool(params, "isActive", true)?;

    let notice_id = Uuid::new_v4().to_string();
    let notice_date = db::today();
    conn.execute(
        "INSERT INTO notices(id, title, description, category, issued_by, priority,
            notice_date, valid_until, audience, file_path, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            notice_id,
            title,
            description,
            category.as_str(),
            issued_by,
            priority.as_str(),
            notice_date,
            valid_until,
            audience.as_str(),
            file_path,
            is_active as i64,
            db::now_ts(),
        ],
    )
    .map_err(db_table_err("db_insert_failed", "notices"))?;

    Ok(json!({ "noticeId": notice_id, "noticeDate": notice_date }))
}

fn notices_delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let notice_id = required_str(params, "noticeId")?;
    require_exists(conn, "notices", &notice_id, "notice")?;
    conn.execute("DELETE FROM notices WHERE id = ?", [&notice_id])
        .map_err(db_table_err("db_delete_failed", "notices"))?;
    Ok(json!({ "deleted": true }))
}

fn events_list(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    let events = query_all(
        conn,
        &format!(
            "SELECT {} FROM events ORDER BY event_date DESC, event_time DESC",
            EVENT_COLS
        ),
        [],
        event_json,
    )?;
    Ok(json!({ "events": events }))
}

fn events_create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let title = required_str(params, "title")?;
    let description = required_str(params, "description")?;
    let event_date = required_date(params, "eventDate")?;
    let event_time = optional_time(params, "eventTime")?;
    let image_path = optional_str(params, "imagePath")?;
    let is_active = optional_bool(params, "isActive", true)?;

    let event_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO events(id, title, description, event_date, event_time, image_path,
            is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            event_id,
            title,
            description,
            event_date,
            event_time,
            image_path,
            is_active as i64,
            db::now_ts(),
        ],
    )
    .map_err(db_table_err("db_insert_failed", "events"))?;

    Ok(json!({ "eventId": event_id }))
}

fn events_delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let event_id = required_str(params, "eventId")?;
    require_exists(conn, "events", &event_id, "event")?;
    conn.execute("DELETE FROM events WHERE id = ?", [&event_id])
        .map_err(db_table_err("db_delete_failed", "events"))?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "notices.list" => notices_list,
        "notices.create" => notices_create,
        "notices.delete" => notices_delete,
        "events.list" => events_list,
        "events.create" => events_create,
        "events.delete" => events_delete,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Admin), op))
}

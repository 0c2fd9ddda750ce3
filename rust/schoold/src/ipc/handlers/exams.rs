use crate::auth::{Role, Session};
use crate::ipc::helpers::{
    db_table_err, guarded, optional_ref, optional_str, parse_time, required_date, required_ref,
    required_str, require_exists, text_or_empty, HandlerErr, HandlerResult, Op,
};
use crate::ipc::rows::{self, exam_json, query_all, EXAM_SELECT};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

/// Exam schedule, optionally for one class, in date then time order.
pub fn schedule(conn: &Connection, class_id: Option<&str>) -> Result<Vec<Value>, HandlerErr> {
    match class_id {
        Some(c) => query_all(
            conn,
            &format!("{} WHERE e.class_id = ? ORDER BY e.exam_date, e.exam_time", EXAM_SELECT),
            [c],
            exam_json,
        ),
        None => query_all(
            conn,
            &format!("{} ORDER BY e.exam_date, e.exam_time", EXAM_SELECT),
            [],
            exam_json,
        ),
    }
}

fn list(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let class_id = optional_str(params, "classId")?;
    Ok(json!({
        "exams": schedule(conn, class_id.as_deref())?,
        "classes": rows::all_classes(conn)?,
        "subjects": rows::all_subjects(conn)?,
        "selectedClassId": class_id,
    }))
}

fn create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let exam_name = required_str(params, "examName")?;
    let class_id = required_ref(conn, params, "classId", "classes", "class")?;
    let exam_date = required_date(params, "examDate")?;
    let exam_time = parse_time(&required_str(params, "examTime")?, "examTime")?;
    let room_no = text_or_empty(params, "roomNo")?;
    let subject_id = optional_ref(conn, params, "subjectId", "subjects", "subject")?;

    let exam_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO exams(id, exam_name, class_id, exam_date, exam_time, room_no, subject_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![exam_id, exam_name, class_id, exam_date, exam_time, room_no, subject_id],
    )
    .map_err(db_table_err("db_insert_failed", "exams"))?;

    Ok(json!({ "examId": exam_id }))
}

fn delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let exam_id = required_str(params, "examId")?;
    require_exists(conn, "exams", &exam_id, "exam")?;
    conn.execute("DELETE FROM exams WHERE id = ?", [&exam_id])
        .map_err(db_table_err("db_delete_failed", "exams"))?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "exams.list" => list,
        "exams.create" => create,
        "exams.delete" => delete,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Admin), op))
}

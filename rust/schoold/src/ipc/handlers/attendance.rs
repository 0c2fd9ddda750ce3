use crate::auth::{Role, Session};
use crate::ipc::handlers::teacher_portal::assigned_class;
use crate::ipc::helpers::{
    date_or_today, db_err, db_table_err, guarded, HandlerErr, HandlerResult, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Who is being marked and where their attendance lives.
#[derive(Clone, Copy)]
struct Register {
    owners: &'static str,
    table: &'static str,
    owner_col: &'static str,
    list_key: &'static str,
    total_key: &'static str,
}

const TEACHERS: Register = Register {
    owners: "teachers",
    table: "teacher_attendance",
    owner_col: "teacher_id",
    list_key: "teachers",
    total_key: "totalTeachers",
};

const STUDENTS: Register = Register {
    owners: "students",
    table: "student_attendance",
    owner_col: "student_id",
    list_key: "students",
    total_key: "totalStudents",
};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    name: String,
    status: Option<String>,
}

/// Active owners (optionally of one class) with their status on `date`.
fn roster(conn: &Connection, reg: Register, date: &str, class_id: Option<&str>) -> Result<Vec<Entry>, HandlerErr> {
    let mut sql = format!(
        "SELECT o.id, o.name, a.status
         FROM {owners} o
         LEFT JOIN {table} a ON a.{col} = o.id AND a.date = ?
         WHERE o.is_active = 1",
        owners = reg.owners,
        table = reg.table,
        col = reg.owner_col,
    );
    let mut binds = vec![SqlValue::Text(date.to_string())];
    if let Some(c) = class_id {
        sql.push_str(" AND o.class_id = ?");
        binds.push(SqlValue::Text(c.to_string()));
    }
    sql.push_str(" ORDER BY o.name");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(db_err("db_query_failed"))?;
    stmt.query_map(params_from_iter(binds.iter()), |r| {
        Ok(Entry {
            id: r.get(0)?,
            name: r.get(1)?,
            status: r.get(2)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err("db_query_failed"))
}

/// Records per status on `date`, counting owners no longer active too.
fn status_counts(
    conn: &Connection,
    reg: Register,
    date: &str,
    class_id: Option<&str>,
) -> Result<HashMap<String, i64>, HandlerErr> {
    let mut sql = format!(
        "SELECT a.status, COUNT(*)
         FROM {table} a JOIN {owners} o ON o.id = a.{col}
         WHERE a.date = ?",
        owners = reg.owners,
        table = reg.table,
        col = reg.owner_col,
    );
    let mut binds = vec![SqlValue::Text(date.to_string())];
    if let Some(c) = class_id {
        sql.push_str(" AND o.class_id = ?");
        binds.push(SqlValue::Text(c.to_string()));
    }
    sql.push_str(" GROUP BY a.status");

    let mut stmt = conn.prepare(&sql).map_err(db_err("db_query_failed"))?;
    stmt.query_map(params_from_iter(binds.iter()), |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<HashMap<_, _>, _>>())
        .map_err(db_err("db_query_failed"))
}

fn day_view(conn: &Connection, reg: Register, params: &Value, class_id: Option<&str>) -> HandlerResult {
    let date = date_or_today(params, "date");
    let entries = roster(conn, reg, &date, class_id)?;
    let counts = status_counts(conn, reg, &date, class_id)?;
    let count = |s: AttendanceStatus| counts.get(s.as_str()).copied().unwrap_or(0);
    let mut out = json!({
        "date": date,
        "present": count(AttendanceStatus::Present),
        "absent": count(AttendanceStatus::Absent),
        "leave": count(AttendanceStatus::Leave),
        "halfDay": count(AttendanceStatus::HalfDay),
        "statusChoices": AttendanceStatus::labels(),
    });
    out[reg.total_key] = json!(entries.len());
    out[reg.list_key] = Value::Array(
        entries
            .iter()
            .map(|e| json!({ "id": e.id, "name": e.name, "status": e.status }))
            .collect(),
    );
    if let Some(c) = class_id {
        out["classId"] = json!(c);
    }
    Ok(out)
}

/// Upsert one row per roster member with a valid status; anything else is skipped.
fn mark(conn: &Connection, reg: Register, params: &Value, class_id: Option<&str>) -> HandlerResult {
    let date = date_or_today(params, "date");
    let statuses = params
        .get("statuses")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing/invalid statuses"))?;
    let entries = roster(conn, reg, &date, class_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let sql = format!(
        "INSERT INTO {table}({col}, date, status) VALUES(?, ?, ?)
         ON CONFLICT({col}, date) DO UPDATE SET status = excluded.status",
        table = reg.table,
        col = reg.owner_col,
    );
    let mut marked = 0usize;
    for e in &entries {
        let Some(status) = statuses
            .get(&e.id)
            .and_then(|v| v.as_str())
            .and_then(AttendanceStatus::parse)
        else {
            continue;
        };
        tx.execute(&sql, (&e.id, &date, status.as_str()))
            .map_err(db_table_err("db_insert_failed", reg.table))?;
        marked += 1;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    tracing::info!(table = reg.table, date = %date, marked, "attendance marked");
    Ok(json!({ "date": date, "marked": marked }))
}

fn teacher_day(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    day_view(conn, TEACHERS, params, None)
}

fn teacher_mark(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    mark(conn, TEACHERS, params, None)
}

fn class_of(conn: &Connection, session: &Session) -> Result<String, HandlerErr> {
    assigned_class(conn, &session.user_id)?
        .ok_or_else(|| HandlerErr::new("not_assigned", "No class assigned to this teacher"))
}

fn student_day(conn: &Connection, session: &Session, params: &Value) -> HandlerResult {
    let class_id = class_of(conn, session)?;
    day_view(conn, STUDENTS, params, Some(&class_id))
}

fn student_mark(conn: &Connection, session: &Session, params: &Value) -> HandlerResult {
    let class_id = class_of(conn, session)?;
    mark(conn, STUDENTS, params, Some(&class_id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (role, op): (Role, Op) = match req.method.as_str() {
        "teacherAttendance.day" => (Role::Admin, teacher_day),
        "teacherAttendance.mark" => (Role::Admin, teacher_mark),
        "studentAttendance.day" => (Role::Teacher, student_day),
        "studentAttendance.mark" => (Role::Teacher, student_mark),
        _ => return None,
    };
    Some(guarded(state, req, Some(role), op))
}

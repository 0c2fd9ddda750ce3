use crate::auth::{Role, Session};
use crate::ipc::helpers::{
    db_table_err, guarded, hash_secret, optional_amount, optional_bool, optional_ref,
    optional_str, required_date, required_str, require_exists, text_or_empty, HandlerErr,
    HandlerResult, Op, Patch,
};
use crate::ipc::rows::{self, query_all, query_one, student_json, STUDENT_COLS, STUDENT_FROM};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn load(conn: &Connection, student_id: &str) -> Result<Value, HandlerErr> {
    query_one(
        conn,
        &format!("SELECT {} FROM {} WHERE s.id = ?", STUDENT_COLS, STUDENT_FROM),
        [student_id],
        student_json,
    )?
    .ok_or_else(|| HandlerErr::not_found("student"))
}

fn list(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let class_id = optional_str(params, "classId")?;
    let students = match &class_id {
        Some(c) => query_all(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE s.class_id = ? ORDER BY s.name",
                STUDENT_COLS, STUDENT_FROM
            ),
            [c],
            student_json,
        )?,
        None => query_all(
            conn,
            &format!("SELECT {} FROM {} ORDER BY s.name", STUDENT_COLS, STUDENT_FROM),
            [],
            student_json,
        )?,
    };
    Ok(json!({
        "students": students,
        "classes": rows::all_classes(conn)?,
        "selectedClassId": class_id,
    }))
}

fn create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let name = required_str(params, "name")?;
    let father_name = required_str(params, "fatherName")?;
    let mobile = required_str(params, "mobile")?;
    let admission_date = required_date(params, "admissionDate")?;
    let class_id = optional_ref(conn, params, "classId", "classes", "class")?;
    let address = text_or_empty(params, "address")?;
    let email = text_or_empty(params, "email")?;
    let monthly_fee = optional_amount(params, "monthlyFee", 0)?;
    let photo_path = optional_str(params, "photoPath")?;
    let is_active = optional_bool(params, "isActive", true)?;
    let password_hash = match params.get("password").and_then(|v| v.as_str()) {
        Some(p) if !p.is_empty() => hash_secret(p)?,
        _ => String::new(),
    };

    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, father_name, class_id, role, address, email, mobile,
            admission_date, monthly_fee_cents, photo_path, password_hash, is_active, created_at)
         VALUES(?, ?, ?, ?, 'Student', ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            student_id,
            name,
            father_name,
            class_id,
            address,
            email,
            mobile,
            admission_date,
            monthly_fee,
            photo_path,
            password_hash,
            is_active as i64,
            crate::db::now_ts(),
        ],
    )
    .map_err(db_table_err("db_insert_failed", "students"))?;

    Ok(json!({ "studentId": student_id, "student": load(conn, &student_id)? }))
}

fn update(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let student_id = required_str(params, "studentId")?;
    require_exists(conn, "students", &student_id, "student")?;

    let mut patch = Patch::from_params(params)?;
    patch.text("name", "name")?;
    patch.text("fatherName", "father_name")?;
    patch.reference(conn, "classId", "class_id", "classes", "class")?;
    patch.text_blank("address", "address")?;
    patch.text_blank("email", "email")?;
    patch.text("mobile", "mobile")?;
    patch.date("admissionDate", "admission_date")?;
    patch.amount("monthlyFee", "monthly_fee_cents")?;
    patch.nullable_text("photoPath", "photo_path")?;
    patch.flag("isActive", "is_active")?;
    // A blank password leaves the stored hash alone.
    if let Some(p) = patch.get("password").and_then(|v| v.as_str()) {
        if !p.is_empty() {
            patch.raw("password_hash", SqlValue::Text(hash_secret(p)?));
        }
    }
    patch.apply(conn, "students", &student_id)?;

    Ok(json!({ "student": load(conn, &student_id)? }))
}

fn delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let student_id = required_str(params, "studentId")?;
    require_exists(conn, "students", &student_id, "student")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    // Dependents first; there is no ON DELETE CASCADE.
    for table in ["student_payments", "student_attendance", "results", "students"] {
        let col = if table == "students" { "id" } else { "student_id" };
        tx.execute(&format!("DELETE FROM {} WHERE {} = ?", table, col), [&student_id])
            .map_err(db_table_err("db_delete_failed", table))?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "deleted": true }))
}

fn id_card(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let student_id = required_str(params, "studentId")?;
    Ok(json!({
        "student": load(conn, &student_id)?,
        "schoolInfo": rows::school_info(conn)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "students.list" => list,
        "students.create" => create,
        "students.update" => update,
        "students.delete" => delete,
        "students.idCard" => id_card,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Admin), op))
}

use crate::auth::{Role, Session};
use crate::ipc::helpers::{
    db_table_err, guarded, hash_secret, optional_amount, optional_bool, optional_ref,
    optional_str, required_date, required_str, require_exists, text_or_empty, HandlerErr,
    HandlerResult, Op, Patch,
};
use crate::ipc::rows::{
    query_all, query_one, subject_json, teacher_json, TEACHER_COLS, TEACHER_FROM,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn subjects_of(conn: &Connection, teacher_id: &str) -> Result<Vec<Value>, HandlerErr> {
    query_all(
        conn,
        "SELECT sub.id, sub.subject_name, sub.subject_code
         FROM teacher_subjects ts JOIN subjects sub ON sub.id = ts.subject_id
         WHERE ts.teacher_id = ?
         ORDER BY sub.subject_name",
        [teacher_id],
        subject_json,
    )
}

/// Teacher row plus its subjects.
pub fn load(conn: &Connection, teacher_id: &str) -> Result<Value, HandlerErr> {
    let mut teacher = query_one(
        conn,
        &format!("SELECT {} FROM {} WHERE t.id = ?", TEACHER_COLS, TEACHER_FROM),
        [teacher_id],
        teacher_json,
    )?
    .ok_or_else(|| HandlerErr::not_found("teacher"))?;
    teacher["subjects"] = Value::Array(subjects_of(conn, teacher_id)?);
    Ok(teacher)
}

fn parse_subject_ids(conn: &Connection, v: &Value) -> Result<Vec<String>, HandlerErr> {
    let arr = match v {
        Value::Null => return Ok(Vec::new()),
        Value::Array(a) => a,
        _ => return Err(HandlerErr::bad_params("subjectIds must be an array")),
    };
    let mut ids: Vec<String> = Vec::with_capacity(arr.len());
    for item in arr {
        let id = item
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| HandlerErr::bad_params("subjectIds must contain strings"))?;
        require_exists(conn, "subjects", &id, "subject")?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn replace_subjects(conn: &Connection, teacher_id: &str, subject_ids: &[String]) -> Result<(), HandlerErr> {
    conn.execute("DELETE FROM teacher_subjects WHERE teacher_id = ?", [teacher_id])
        .map_err(db_table_err("db_delete_failed", "teacher_subjects"))?;
    for sid in subject_ids {
        conn.execute(
            "INSERT INTO teacher_subjects(teacher_id, subject_id) VALUES(?, ?)",
            (teacher_id, sid),
        )
        .map_err(db_table_err("db_insert_failed", "teacher_subjects"))?;
    }
    Ok(())
}

fn list(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    let mut teachers = query_all(
        conn,
        &format!("SELECT {} FROM {} ORDER BY t.name", TEACHER_COLS, TEACHER_FROM),
        [],
        teacher_json,
    )?;
    for t in teachers.iter_mut() {
        let id = t["id"].as_str().unwrap_or_default().to_string();
        t["subjects"] = Value::Array(subjects_of(conn, &id)?);
    }
    Ok(json!({ "teachers": teachers }))
}

fn create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let password = match params.get("password").and_then(|v| v.as_str()) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return Err(HandlerErr::bad_params("password is required for new teacher")),
    };
    let name = required_str(params, "name")?;
    let email = required_str(params, "email")?;
    let mobile = required_str(params, "mobile")?;
    let joining_date = required_date(params, "joiningDate")?;
    let father_name = text_or_empty(params, "fatherName")?;
    let address = text_or_empty(params, "address")?;
    let aadhar_no = text_or_empty(params, "aadharNo")?;
    let qualification = text_or_empty(params, "qualification")?;
    let role = optional_str(params, "role")?.unwrap_or_else(|| "Teacher".to_string());
    let class_id = optional_ref(conn, params, "classId", "classes", "class")?;
    let monthly_salary = optional_amount(params, "monthlySalary", 0)?;
    let photo_path = optional_str(params, "photoPath")?;
    let is_active = optional_bool(params, "isActive", true)?;
    let subject_ids = parse_subject_ids(conn, params.get("subjectIds").unwrap_or(&Value::Null))?;

    let password_hash = hash_secret(&password)?;
    let teacher_id = Uuid::new_v4().to_string();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "INSERT INTO teachers(id, name, father_name, address, email, mobile, aadhar_no,
            qualification, role, joining_date, class_id, password_hash, monthly_salary_cents,
            photo_path, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            teacher_id,
            name,
            father_name,
            address,
            email,
            mobile,
            aadhar_no,
            qualification,
            role,
            joining_date,
            class_id,
            password_hash,
            monthly_salary,
            photo_path,
            is_active as i64,
            crate::db::now_ts(),
        ],
    )
    .map_err(db_table_err("db_insert_failed", "teachers"))?;
    replace_subjects(&tx, &teacher_id, &subject_ids)?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "teacherId": teacher_id, "teacher": load(conn, &teacher_id)? }))
}

fn update(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let teacher_id = required_str(params, "teacherId")?;
    require_exists(conn, "teachers", &teacher_id, "teacher")?;

    let mut patch = Patch::from_params(params)?;
    patch.text("name", "name")?;
    patch.text_blank("fatherName", "father_name")?;
    patch.text_blank("address", "address")?;
    patch.text("email", "email")?;
    patch.text("mobile", "mobile")?;
    patch.text_blank("aadharNo", "aadhar_no")?;
    patch.text_blank("qualification", "qualification")?;
    patch.text("role", "role")?;
    patch.date("joiningDate", "joining_date")?;
    patch.reference(conn, "classId", "class_id", "classes", "class")?;
    patch.amount("monthlySalary", "monthly_salary_cents")?;
    patch.nullable_text("photoPath", "photo_path")?;
    patch.flag("isActive", "is_active")?;
    if let Some(p) = patch.get("password").and_then(|v| v.as_str()) {
        if !p.is_empty() {
            patch.raw("password_hash", SqlValue::Text(hash_secret(p)?));
        }
    }
    let subject_ids = patch
        .get("subjectIds")
        .map(|v| parse_subject_ids(conn, v))
        .transpose()?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    patch.apply(&tx, "teachers", &teacher_id)?;
    if let Some(ids) = subject_ids {
        replace_subjects(&tx, &teacher_id, &ids)?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "teacher": load(conn, &teacher_id)? }))
}

fn delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let teacher_id = required_str(params, "teacherId")?;
    require_exists(conn, "teachers", &teacher_id, "teacher")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    // Submitted results outlive their author.
    tx.execute(
        "UPDATE results SET submitted_by = NULL WHERE submitted_by = ?",
        [&teacher_id],
    )
    .map_err(db_table_err("db_update_failed", "results"))?;
    for table in ["teacher_payments", "teacher_attendance", "teacher_subjects"] {
        tx.execute(&format!("DELETE FROM {} WHERE teacher_id = ?", table), [&teacher_id])
            .map_err(db_table_err("db_delete_failed", table))?;
    }
    tx.execute("DELETE FROM teachers WHERE id = ?", [&teacher_id])
        .map_err(db_table_err("db_delete_failed", "teachers"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "teachers.list" => list,
        "teachers.create" => create,
        "teachers.update" => update,
        "teachers.delete" => delete,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Admin), op))
}

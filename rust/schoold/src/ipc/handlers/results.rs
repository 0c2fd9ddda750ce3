//! Result submission (teacher) and verification (admin).
//!
//! A result starts `Pending` when a teacher submits it. An admin moves it to
//! `Verified` or `Rejected`, and may re-decide later. Teachers can edit their
//! own results only while they are still `Pending`. Percentage and grade are
//! always derived from the stored marks, never taken from the caller.

use crate::auth::{Role, Session};
use crate::db;
use crate::grading::{self, Graded};
use crate::ipc::handlers::teacher_portal::{assigned_class, eligible_students};
use crate::ipc::helpers::{
    db_err, db_table_err, guarded, optional_ref, parse_amount, required_amount, required_date,
    required_ref, required_str, require_exists, text_or_empty, HandlerErr, HandlerResult, Op,
    Patch,
};
use crate::ipc::rows::{self, query_all, query_one, result_json, RESULT_SELECT};
use crate::ipc::types::{AppState, Request};
use crate::model::VerificationStatus;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};
use uuid::Uuid;

const RECENT_LIMIT: i64 = 20;

fn graded(obtained: i64, total: i64) -> Result<Graded, HandlerErr> {
    grading::compute(obtained, total).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

pub fn load(conn: &Connection, result_id: &str) -> Result<Value, HandlerErr> {
    query_one(
        conn,
        &format!("{} WHERE r.id = ?", RESULT_SELECT),
        [result_id],
        result_json,
    )?
    .ok_or_else(|| HandlerErr::not_found("result"))
}

fn submit(conn: &Connection, session: &Session, params: &Value) -> HandlerResult {
    let student_id = required_ref(conn, params, "studentId", "students", "student")?;
    let exam_name = required_str(params, "examName")?;
    let subject_id = optional_ref(conn, params, "subjectId", "subjects", "subject")?;
    let obtained = required_amount(params, "marksObtained")?;
    let total = required_amount(params, "totalMarks")?;
    let exam_date = required_date(params, "examDate")?;
    let remarks = text_or_empty(params, "remarks")?;
    let g = graded(obtained, total)?;

    let result_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO results(id, student_id, exam_name, subject_id, marks_obtained_cents,
            total_marks_cents, percentage_cents, grade, submitted_by, submission_date,
            verification_status, verification_remarks, exam_date, remarks)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '', ?, ?)",
        rusqlite::params![
            result_id,
            student_id,
            exam_name,
            subject_id,
            obtained,
            total,
            g.percentage_hundredths,
            g.grade.as_str(),
            session.user_id,
            db::now_ts(),
            VerificationStatus::Pending.as_str(),
            exam_date,
            remarks,
        ],
    )
    .map_err(db_table_err("db_insert_failed", "results"))?;
    tracing::info!(result_id = %result_id, to = "Pending", "result submitted");

    Ok(json!({ "resultId": result_id, "result": load(conn, &result_id)? }))
}

fn mine(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    let results = query_all(
        conn,
        &format!(
            "{} WHERE r.submitted_by = ? ORDER BY r.submission_date DESC LIMIT {}",
            RESULT_SELECT, RECENT_LIMIT
        ),
        [&session.user_id],
        result_json,
    )?;
    let class_id = assigned_class(conn, &session.user_id)?;
    Ok(json!({
        "results": results,
        "students": eligible_students(conn, class_id.as_deref())?,
        "subjects": rows::all_subjects(conn)?,
    }))
}

fn edit(conn: &Connection, session: &Session, params: &Value) -> HandlerResult {
    let result_id = required_str(params, "resultId")?;
    let current: Option<(String, i64, i64)> = conn
        .query_row(
            "SELECT verification_status, marks_obtained_cents, total_marks_cents
             FROM results WHERE id = ? AND submitted_by = ?",
            (&result_id, &session.user_id),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(db_err("db_query_failed"))?;
    let Some((status, obtained, total)) = current else {
        return Err(HandlerErr::not_found("result"));
    };
    if VerificationStatus::parse(&status) != Some(VerificationStatus::Pending) {
        return Err(HandlerErr::new(
            "invalid_state",
            "Cannot edit verified or rejected results",
        ));
    }

    let mut patch = Patch::from_params(params)?;
    patch.text("examName", "exam_name")?;
    patch.reference(conn, "subjectId", "subject_id", "subjects", "subject")?;
    patch.date("examDate", "exam_date")?;
    patch.text_blank("remarks", "remarks")?;

    let new_obtained = match patch.get("marksObtained") {
        Some(v) => parse_amount(v, "marksObtained")?,
        None => obtained,
    };
    let new_total = match patch.get("totalMarks") {
        Some(v) => parse_amount(v, "totalMarks")?,
        None => total,
    };
    // Grading is rewritten on every edit so stored values never drift.
    let g = graded(new_obtained, new_total)?;
    patch.raw("marks_obtained_cents", SqlValue::Integer(new_obtained));
    patch.raw("total_marks_cents", SqlValue::Integer(new_total));
    patch.raw("percentage_cents", SqlValue::Integer(g.percentage_hundredths));
    patch.raw("grade", SqlValue::Text(g.grade.as_str().to_string()));
    patch.apply(conn, "results", &result_id)?;

    Ok(json!({ "result": load(conn, &result_id)? }))
}

fn download_options(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    let class_id = assigned_class(conn, &session.user_id)?;
    let exam_names = query_all(
        conn,
        "SELECT DISTINCT exam_name FROM results
         WHERE verification_status = 'Verified' ORDER BY exam_name",
        [],
        |r| Ok(Value::String(r.get(0)?)),
    )?;
    Ok(json!({
        "students": eligible_students(conn, class_id.as_deref())?,
        "examNames": exam_names,
        "classes": rows::all_classes(conn)?,
    }))
}

fn verify_queue(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    let pending = query_all(
        conn,
        &format!(
            "{} WHERE r.verification_status = 'Pending' ORDER BY r.submission_date DESC",
            RESULT_SELECT
        ),
        [],
        result_json,
    )?;
    let recent = query_all(
        conn,
        &format!(
            "{} WHERE r.verification_status IN ('Verified', 'Rejected')
             ORDER BY r.verification_date DESC LIMIT {}",
            RESULT_SELECT, RECENT_LIMIT
        ),
        [],
        result_json,
    )?;
    Ok(json!({
        "pending": pending,
        "recentlyDecided": recent,
        "statusChoices": VerificationStatus::labels(),
    }))
}

fn decide(
    conn: &Connection,
    session: &Session,
    params: &Value,
    to: VerificationStatus,
    default_remarks: &str,
) -> HandlerResult {
    let result_id = required_str(params, "resultId")?;
    let from: String = conn
        .query_row(
            "SELECT verification_status FROM results WHERE id = ?",
            [&result_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("result"))?;
    let remarks = match text_or_empty(params, "remarks")? {
        r if r.is_empty() => default_remarks.to_string(),
        r => r,
    };

    conn.execute(
        "UPDATE results
         SET verification_status = ?, verified_by = ?, verification_date = ?,
             verification_remarks = ?
         WHERE id = ?",
        (to.as_str(), &session.user_id, db::now_ts(), &remarks, &result_id),
    )
    .map_err(db_table_err("db_update_failed", "results"))?;
    tracing::info!(
        result_id = %result_id,
        from = %from,
        to = to.as_str(),
        admin_id = %session.user_id,
        "result verification changed"
    );

    Ok(json!({ "result": load(conn, &result_id)? }))
}

fn approve(conn: &Connection, session: &Session, params: &Value) -> HandlerResult {
    decide(conn, session, params, VerificationStatus::Verified, "")
}

fn reject(conn: &Connection, session: &Session, params: &Value) -> HandlerResult {
    decide(conn, session, params, VerificationStatus::Rejected, "Rejected by admin")
}

fn delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let result_id = required_str(params, "resultId")?;
    require_exists(conn, "results", &result_id, "result")?;
    conn.execute("DELETE FROM results WHERE id = ?", [&result_id])
        .map_err(db_table_err("db_delete_failed", "results"))?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (role, op): (Role, Op) = match req.method.as_str() {
        "results.submit" => (Role::Teacher, submit),
        "results.mine" => (Role::Teacher, mine),
        "results.edit" => (Role::Teacher, edit),
        "results.downloadOptions" => (Role::Teacher, download_options),
        "results.verifyQueue" => (Role::Admin, verify_queue),
        "results.approve" => (Role::Admin, approve),
        "results.reject" => (Role::Admin, reject),
        "results.delete" => (Role::Admin, delete),
        _ => return None,
    };
    Some(guarded(state, req, Some(role), op))
}

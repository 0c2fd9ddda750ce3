use crate::auth::{Role, Session};
use crate::decimal::format_hundredths;
use crate::ipc::handlers::{payments, teachers};
use crate::ipc::helpers::{db_err, guarded, HandlerErr, HandlerResult, Op};
use crate::ipc::rows::{self, query_all, scalar_i64, student_json, STUDENT_COLS, STUDENT_FROM, SALARIES};
use crate::ipc::types::{AppState, Request};
use crate::model::Audience;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};

/// The class a teacher is in charge of, if any.
pub fn assigned_class(conn: &Connection, teacher_id: &str) -> Result<Option<String>, HandlerErr> {
    conn.query_row("SELECT class_id FROM teachers WHERE id = ?", [teacher_id], |r| {
        r.get::<_, Option<String>>(0)
    })
    .optional()
    .map(Option::flatten)
    .map_err(db_err("db_query_failed"))
}

/// Active students of `class_id`, or every active student when there is none.
pub fn eligible_students(conn: &Connection, class_id: Option<&str>) -> Result<Vec<Value>, HandlerErr> {
    match class_id {
        Some(c) => class_students(conn, c),
        None => query_all(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE s.is_active = 1 ORDER BY s.name",
                STUDENT_COLS, STUDENT_FROM
            ),
            [],
            student_json,
        ),
    }
}

fn class_students(conn: &Connection, class_id: &str) -> Result<Vec<Value>, HandlerErr> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE s.is_active = 1 AND s.class_id = ? ORDER BY s.name",
            STUDENT_COLS, STUDENT_FROM
        ),
        [class_id],
        student_json,
    )
}

fn dashboard(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    let teacher_id = session.user_id.as_str();
    let profile = teachers::load(conn, teacher_id)?;
    let total_received = scalar_i64(
        conn,
        "SELECT COALESCE(SUM(paid_amount_cents), 0) FROM teacher_payments
         WHERE teacher_id = ? AND status = 'Paid'",
        [teacher_id],
    )?;
    let pending_salary = scalar_i64(
        conn,
        "SELECT COALESCE(SUM(due_amount_cents), 0) FROM teacher_payments
         WHERE teacher_id = ? AND status = 'Pending'",
        [teacher_id],
    )?;
    let students = match assigned_class(conn, teacher_id)? {
        Some(c) => class_students(conn, &c)?,
        None => Vec::new(),
    };
    let notices = rows::notices_for(
        conn,
        &[Audience::All.as_str(), Audience::Teachers.as_str()],
        5,
    )?;

    Ok(json!({
        "teacher": profile,
        "totalReceived": format_hundredths(total_received),
        "pendingSalary": format_hundredths(pending_salary),
        "recentPayments": payments::history(conn, SALARIES, teacher_id, Some(5))?,
        "students": students,
        "notices": notices,
    }))
}

fn salary_history(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    Ok(json!({
        "payments": payments::history(conn, SALARIES, &session.user_id, None)?,
    }))
}

fn students(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    let class_id = assigned_class(conn, &session.user_id)?;
    let students = match &class_id {
        Some(c) => class_students(conn, c)?,
        None => Vec::new(),
    };
    Ok(json!({ "classId": class_id, "students": students }))
}

fn profile(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    Ok(json!({ "teacher": teachers::load(conn, &session.user_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "teacher.dashboard" => dashboard,
        "teacher.salaryHistory" => salary_history,
        "teacher.students" => students,
        "teacher.profile" => profile,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Teacher), op))
}

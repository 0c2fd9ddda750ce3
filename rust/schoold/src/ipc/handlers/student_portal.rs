use crate::auth::{Role, Session};
use crate::decimal::format_hundredths;
use crate::ipc::handlers::{exams, payments, students};
use crate::ipc::helpers::{guarded, HandlerResult, Op};
use crate::ipc::rows::{self, query_all, result_json, scalar_i64, FEES, RESULT_SELECT};
use crate::ipc::types::{AppState, Request};
use crate::model::Audience;
use rusqlite::Connection;
use serde_json::{json, Value};

fn dashboard(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    let student_id = session.user_id.as_str();
    let profile = students::load(conn, student_id)?;
    let total_paid = scalar_i64(
        conn,
        "SELECT COALESCE(SUM(paid_amount_cents), 0) FROM student_payments
         WHERE student_id = ? AND status = 'Paid'",
        [student_id],
    )?;
    let total_due = scalar_i64(
        conn,
        "SELECT COALESCE(SUM(due_amount_cents), 0) FROM student_payments
         WHERE student_id = ? AND status = 'Pending'",
        [student_id],
    )?;
    let results = query_all(
        conn,
        &format!(
            "{} WHERE r.student_id = ? AND r.verification_status = 'Verified'
             ORDER BY r.exam_date DESC",
            RESULT_SELECT
        ),
        [student_id],
        result_json,
    )?;
    let notices = rows::notices_for(
        conn,
        &[Audience::All.as_str(), Audience::Students.as_str()],
        5,
    )?;

    Ok(json!({
        "student": profile,
        "totalPaid": format_hundredths(total_paid),
        "totalDue": format_hundredths(total_due),
        "recentPayments": payments::history(conn, FEES, student_id, Some(5))?,
        "results": results,
        "notices": notices,
        "schoolInfo": rows::school_info(conn)?,
    }))
}

fn payments_view(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    Ok(json!({
        "payments": payments::history(conn, FEES, &session.user_id, None)?,
    }))
}

fn profile(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    Ok(json!({
        "student": students::load(conn, &session.user_id)?,
        "schoolInfo": rows::school_info(conn)?,
    }))
}

fn exam_schedule(conn: &Connection, session: &Session, _params: &Value) -> HandlerResult {
    let student = students::load(conn, &session.user_id)?;
    let exams = match student["classId"].as_str() {
        Some(c) => exams::schedule(conn, Some(c))?,
        None => Vec::new(),
    };
    Ok(json!({ "student": student, "exams": exams }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "student.dashboard" => dashboard,
        "student.payments" => payments_view,
        "student.profile" => profile,
        "student.exams" => exam_schedule,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Student), op))
}

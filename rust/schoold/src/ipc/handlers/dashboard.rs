use crate::auth::{Role, Session};
use crate::decimal::format_hundredths;
use crate::ipc::helpers::{db_err, guarded, HandlerErr, HandlerResult};
use crate::ipc::rows::{self, query_all, scalar_i64, Ledger, FEES, SALARIES};
use crate::ipc::types::{AppState, Request};
use crate::model::Audience;
use rusqlite::Connection;
use serde_json::{json, Value};

fn paid_total(conn: &Connection, ledger: Ledger) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(paid_amount_cents), 0) FROM {} WHERE status = 'Paid'",
            ledger.table
        ),
        [],
        |r| r.get(0),
    )
}

fn recent(conn: &Connection, ledger: Ledger) -> Result<Vec<Value>, HandlerErr> {
    query_all(
        conn,
        &format!(
            "{} ORDER BY p.payment_date DESC, p.created_at DESC LIMIT 5",
            ledger.select()
        ),
        [],
        |r| ledger.row_json(r),
    )
}

fn admin_dashboard(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    let revenue = paid_total(conn, FEES).map_err(db_err("db_query_failed"))?;
    let spend = paid_total(conn, SALARIES).map_err(db_err("db_query_failed"))?;
    let active_students = scalar_i64(conn, "SELECT COUNT(*) FROM students WHERE is_active = 1", [])?;
    let active_teachers = scalar_i64(conn, "SELECT COUNT(*) FROM teachers WHERE is_active = 1", [])?;
    let classes = scalar_i64(conn, "SELECT COUNT(*) FROM classes", [])?;
    let pending_fees = scalar_i64(
        conn,
        "SELECT COUNT(*) FROM student_payments WHERE status = 'Pending'",
        [],
    )?;
    let pending_salaries = scalar_i64(
        conn,
        "SELECT COUNT(*) FROM teacher_payments WHERE status = 'Pending'",
        [],
    )?;
    let audiences = Audience::labels();

    Ok(json!({
        "totalRevenue": format_hundredths(revenue),
        "totalSpend": format_hundredths(spend),
        "netIncome": format_hundredths(revenue - spend),
        "totalStudents": active_students,
        "totalTeachers": active_teachers,
        "totalClasses": classes,
        "recentFeePayments": recent(conn, FEES)?,
        "recentSalaryPayments": recent(conn, SALARIES)?,
        "pendingFees": pending_fees,
        "pendingSalaries": pending_salaries,
        "recentNotices": rows::notices_for(conn, &audiences, 5)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.dashboard" => Some(guarded(state, req, Some(Role::Admin), admin_dashboard)),
        _ => None,
    }
}

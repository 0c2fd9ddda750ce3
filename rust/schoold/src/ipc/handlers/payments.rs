//! Fee (student) and salary (teacher) ledgers. Both share one shape.

use crate::auth::{Role, Session};
use crate::db;
use crate::ipc::helpers::{
    choice, db_table_err, guarded, optional_amount, optional_str, required_amount, required_date,
    required_i64, required_ref, required_str, require_exists, text_or_empty, HandlerErr,
    HandlerResult, Op, Patch,
};
use crate::ipc::rows::{query_all, query_one, Ledger, FEES, SALARIES};
use crate::ipc::types::{AppState, Request};
use crate::model::{PaymentMode, PaymentStatus};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn load(conn: &Connection, ledger: Ledger, payment_id: &str) -> Result<Value, HandlerErr> {
    query_one(
        conn,
        &format!("{} WHERE p.id = ?", ledger.select()),
        [payment_id],
        |r| ledger.row_json(r),
    )?
    .ok_or_else(|| HandlerErr::not_found("payment"))
}

/// Payments of one owner, most recent first; `limit` of `None` returns all.
pub fn history(conn: &Connection, ledger: Ledger, owner_id: &str, limit: Option<i64>) -> Result<Vec<Value>, HandlerErr> {
    let mut sql = format!(
        "{} WHERE p.{} = ? ORDER BY p.payment_date DESC, p.created_at DESC",
        ledger.select(),
        ledger.owner_col
    );
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }
    query_all(conn, &sql, [owner_id], |r| ledger.row_json(r))
}

fn list(conn: &Connection, ledger: Ledger, params: &Value) -> HandlerResult {
    let status = optional_str(params, "status")?;
    let payments = match status {
        Some(s) => {
            let st = PaymentStatus::parse(&s)
                .ok_or_else(|| HandlerErr::bad_params(format!("invalid status: {}", s)))?;
            query_all(
                conn,
                &format!(
                    "{} WHERE p.status = ? ORDER BY p.payment_date DESC, p.created_at DESC",
                    ledger.select()
                ),
                [st.as_str()],
                |r| ledger.row_json(r),
            )?
        }
        None => query_all(
            conn,
            &format!("{} ORDER BY p.payment_date DESC, p.created_at DESC", ledger.select()),
            [],
            |r| ledger.row_json(r),
        )?,
    };
    Ok(json!({
        "payments": payments,
        "paymentModes": PaymentMode::labels(),
        "statusChoices": PaymentStatus::labels(),
    }))
}

fn create(conn: &Connection, ledger: Ledger, params: &Value) -> HandlerResult {
    let owner_id = required_ref(
        conn,
        params,
        ledger.owner_key,
        ledger.owner_table,
        ledger.owner_what,
    )?;
    let paid = required_amount(params, "paidAmount")?;
    let due = optional_amount(params, "dueAmount", 0)?;
    let payment_date = required_date(params, "paymentDate")?;
    let status = choice(params, "status", PaymentStatus::parse, PaymentStatus::default())?;
    let mode = choice(params, "paymentMode", PaymentMode::parse, PaymentMode::default())?;
    let month = required_str(params, "month")?;
    let year = required_i64(params, "year")?;
    let remarks = text_or_empty(params, "remarks")?;

    let payment_id = Uuid::new_v4().to_string();
    conn.execute(
        &format!(
            "INSERT INTO {}(id, {}, payment_mode, paid_amount_cents, due_amount_cents,
                payment_date, status, month, year, remarks, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ledger.table, ledger.owner_col
        ),
        rusqlite::params![
            payment_id,
            owner_id,
            mode.as_str(),
            paid,
            due,
            payment_date,
            status.as_str(),
            month,
            year,
            remarks,
            db::now_ts(),
        ],
    )
    .map_err(db_table_err("db_insert_failed", ledger.table))?;

    Ok(json!({ "paymentId": payment_id, "payment": load(conn, ledger, &payment_id)? }))
}

fn update(conn: &Connection, ledger: Ledger, params: &Value) -> HandlerResult {
    let payment_id = required_str(params, "paymentId")?;
    require_exists(conn, ledger.table, &payment_id, "payment")?;

    let mut patch = Patch::from_params(params)?;
    patch.choice("paymentMode", "payment_mode", |s| {
        PaymentMode::parse(s).map(PaymentMode::as_str)
    })?;
    patch.amount("paidAmount", "paid_amount_cents")?;
    patch.amount("dueAmount", "due_amount_cents")?;
    patch.date("paymentDate", "payment_date")?;
    patch.choice("status", "status", |s| {
        PaymentStatus::parse(s).map(PaymentStatus::as_str)
    })?;
    patch.text("month", "month")?;
    patch.int("year", "year")?;
    patch.text_blank("remarks", "remarks")?;
    patch.apply(conn, ledger.table, &payment_id)?;

    Ok(json!({ "payment": load(conn, ledger, &payment_id)? }))
}

fn fees_list(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    list(conn, FEES, params)
}

fn fees_create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    create(conn, FEES, params)
}

fn fees_update(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    update(conn, FEES, params)
}

fn salaries_list(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    list(conn, SALARIES, params)
}

fn salaries_create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    create(conn, SALARIES, params)
}

fn salaries_update(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    update(conn, SALARIES, params)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "fees.list" => fees_list,
        "fees.create" => fees_create,
        "fees.update" => fees_update,
        "salaries.list" => salaries_list,
        "salaries.create" => salaries_create,
        "salaries.update" => salaries_update,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Admin), op))
}

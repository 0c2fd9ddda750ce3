use crate::auth::{AuthError, Role, Session};
use crate::decimal;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{json, Map, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new("not_found", format!("{} not found", what))
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

pub type HandlerResult = Result<Value, HandlerErr>;

/// A portal operation: runs against the workspace DB with the caller's session.
pub type Op = fn(&Connection, &Session, &Value) -> HandlerResult;

/// An operation open to anonymous callers.
pub type PublicOp = fn(&Connection, &Value) -> HandlerResult;

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Map a storage error to `code`; unique-key violations become `duplicate`.
pub fn db_err(code: &'static str) -> impl Fn(rusqlite::Error) -> HandlerErr {
    move |e| {
        if is_unique_violation(&e) {
            return HandlerErr::new("duplicate", e.to_string());
        }
        tracing::error!(code, error = %e, "storage error");
        HandlerErr::new(code, e.to_string())
    }
}

pub fn hash_secret(password: &str) -> Result<String, HandlerErr> {
    crate::auth::hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        HandlerErr::new("hash_failed", e.to_string())
    })
}

/// Like [`db_err`], tagging the table in `details`.
pub fn db_table_err(code: &'static str, table: &'static str) -> impl Fn(rusqlite::Error) -> HandlerErr {
    move |e| db_err(code)(e).with_details(json!({ "table": table }))
}

pub fn authorize(
    state: &mut AppState,
    req: &Request,
    role: Option<Role>,
) -> Result<Session, HandlerErr> {
    state
        .sessions
        .authorize(req.session.as_deref(), role, chrono::Utc::now())
        .map_err(|e| match e {
            AuthError::MissingSession | AuthError::InvalidSession => {
                HandlerErr::new("login_required", e.to_string())
            }
            AuthError::WrongRole(_) => HandlerErr::new("forbidden", e.to_string()),
        })
}

/// Run `op` after checking the workspace and that the session has `role`
/// (any role when `None`).
pub fn guarded(state: &mut AppState, req: &Request, role: Option<Role>, op: Op) -> Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let session = match authorize(state, req, role) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match op(conn, &session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn public(state: &mut AppState, req: &Request, op: PublicOp) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match op(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool, HandlerErr> {
    conn.query_row(&format!("SELECT 1 FROM {} WHERE id = ?", table), [id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(db_err("db_query_failed"))
}

pub fn require_exists(conn: &Connection, table: &str, id: &str, what: &str) -> Result<(), HandlerErr> {
    if exists(conn, table, id)? {
        Ok(())
    } else {
        Err(HandlerErr::not_found(what))
    }
}

// ---- parameter parsing ----

fn as_opt_str<'a>(v: Option<&'a Value>, key: &str) -> Result<Option<&'a str>, HandlerErr> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match as_opt_str(params.get(key), key)? {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

/// Trimmed string; absent or null gives an empty string.
pub fn text_or_empty(params: &Value, key: &str) -> Result<String, HandlerErr> {
    Ok(as_opt_str(params.get(key), key)?
        .map(|s| s.trim().to_string())
        .unwrap_or_default())
}

/// Trimmed non-empty string or `None`.
pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    Ok(as_opt_str(params.get(key), key)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

pub fn optional_bool(params: &Value, key: &str, default: bool) -> Result<bool, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

pub fn optional_i64(params: &Value, key: &str, default: i64) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => parse_int(v, key),
    }
}

pub fn required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => parse_int(v, key),
    }
}

fn parse_int(v: &Value, key: &str) -> Result<i64, HandlerErr> {
    if let Some(i) = v.as_i64() {
        return Ok(i);
    }
    v.as_str()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key)))
}

pub fn parse_date(raw: &str, key: &str) -> Result<String, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn parse_time(raw: &str, key: &str) -> Result<String, HandlerErr> {
    let t = raw.trim();
    NaiveTime::parse_from_str(t, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .map(|v| v.format("%H:%M:%S").to_string())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be HH:MM or HH:MM:SS", key)))
}

pub fn required_date(params: &Value, key: &str) -> Result<String, HandlerErr> {
    parse_date(&required_str(params, key)?, key)
}

pub fn optional_date(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    optional_str(params, key)?
        .map(|s| parse_date(&s, key))
        .transpose()
}

pub fn optional_time(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    optional_str(params, key)?
        .map(|s| parse_time(&s, key))
        .transpose()
}

/// Attendance views fall back to today on a missing or unparseable date.
pub fn date_or_today(params: &Value, key: &str) -> String {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(crate::db::today)
}

pub fn parse_amount(v: &Value, key: &str) -> Result<i64, HandlerErr> {
    decimal::parse_hundredths(v).map_err(|e| HandlerErr::bad_params(format!("{}: {}", key, e)))
}

pub fn required_amount(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => parse_amount(v, key),
    }
}

pub fn optional_amount(params: &Value, key: &str, default: i64) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => parse_amount(v, key),
    }
}

/// Parse a choice label; absent or null gives `default`.
pub fn choice<T: Copy>(
    params: &Value,
    key: &str,
    parse: fn(&str) -> Option<T>,
    default: T,
) -> Result<T, HandlerErr> {
    match optional_str(params, key)? {
        None => Ok(default),
        Some(s) => parse(&s)
            .ok_or_else(|| HandlerErr::bad_params(format!("invalid {}: {}", key, s))),
    }
}

/// Optional reference id, checked to exist in `table`.
pub fn optional_ref(
    conn: &Connection,
    params: &Value,
    key: &str,
    table: &str,
    what: &str,
) -> Result<Option<String>, HandlerErr> {
    let Some(id) = optional_str(params, key)? else {
        return Ok(None);
    };
    require_exists(conn, table, &id, what)?;
    Ok(Some(id))
}

pub fn required_ref(
    conn: &Connection,
    params: &Value,
    key: &str,
    table: &str,
    what: &str,
) -> Result<String, HandlerErr> {
    let id = required_str(params, key)?;
    require_exists(conn, table, &id, what)?;
    Ok(id)
}

// ---- partial updates ----

/// Collects `SET col = ?` clauses from a `params.patch` object.
pub struct Patch<'a> {
    obj: &'a Map<String, Value>,
    sets: Vec<String>,
    binds: Vec<SqlValue>,
}

impl<'a> Patch<'a> {
    pub fn from_params(params: &'a Value) -> Result<Self, HandlerErr> {
        let obj = params
            .get("patch")
            .and_then(|v| v.as_object())
            .ok_or_else(|| HandlerErr::bad_params("missing/invalid patch"))?;
        Ok(Self {
            obj,
            sets: Vec::new(),
            binds: Vec::new(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.obj.get(key)
    }

    pub fn raw(&mut self, col: &str, value: SqlValue) {
        self.sets.push(format!("{} = ?", col));
        self.binds.push(value);
    }

    /// Non-empty text.
    pub fn text(&mut self, key: &str, col: &str) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let s = v
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| HandlerErr::bad_params(format!("patch.{} must be a string", key)))?;
        if s.is_empty() {
            return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
        }
        self.raw(col, SqlValue::Text(s));
        Ok(())
    }

    /// Text that may be blank; null clears it to "".
    pub fn text_blank(&mut self, key: &str, col: &str) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let s = match v {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            _ => {
                return Err(HandlerErr::bad_params(format!(
                    "patch.{} must be a string or null",
                    key
                )))
            }
        };
        self.raw(col, SqlValue::Text(s));
        Ok(())
    }

    /// Text where null or blank stores NULL.
    pub fn nullable_text(&mut self, key: &str, col: &str) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let value = match v {
            Value::Null => SqlValue::Null,
            Value::String(s) if s.trim().is_empty() => SqlValue::Null,
            Value::String(s) => SqlValue::Text(s.trim().to_string()),
            _ => {
                return Err(HandlerErr::bad_params(format!(
                    "patch.{} must be a string or null",
                    key
                )))
            }
        };
        self.raw(col, value);
        Ok(())
    }

    pub fn date(&mut self, key: &str, col: &str) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let s = v
            .as_str()
            .ok_or_else(|| HandlerErr::bad_params(format!("patch.{} must be a string", key)))?;
        let d = parse_date(s, key)?;
        self.raw(col, SqlValue::Text(d));
        Ok(())
    }

    pub fn amount(&mut self, key: &str, col: &str) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let cents = parse_amount(v, key)?;
        self.raw(col, SqlValue::Integer(cents));
        Ok(())
    }

    pub fn int(&mut self, key: &str, col: &str) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let i = parse_int(v, key)?;
        self.raw(col, SqlValue::Integer(i));
        Ok(())
    }

    pub fn flag(&mut self, key: &str, col: &str) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let b = v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params(format!("patch.{} must be a boolean", key)))?;
        self.raw(col, SqlValue::Integer(i64::from(b)));
        Ok(())
    }

    /// A choice label, validated by `parse`.
    pub fn choice(
        &mut self,
        key: &str,
        col: &str,
        parse: fn(&str) -> Option<&'static str>,
    ) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let s = v
            .as_str()
            .ok_or_else(|| HandlerErr::bad_params(format!("patch.{} must be a string", key)))?;
        let label = parse(s.trim())
            .ok_or_else(|| HandlerErr::bad_params(format!("invalid {}: {}", key, s)))?;
        self.raw(col, SqlValue::Text(label.to_string()));
        Ok(())
    }

    /// Nullable foreign key, checked to exist in `table` when set.
    pub fn reference(
        &mut self,
        conn: &Connection,
        key: &str,
        col: &str,
        table: &str,
        what: &str,
    ) -> Result<(), HandlerErr> {
        let Some(v) = self.obj.get(key) else {
            return Ok(());
        };
        let value = match v {
            Value::Null => SqlValue::Null,
            Value::String(s) if s.trim().is_empty() => SqlValue::Null,
            Value::String(s) => {
                let id = s.trim().to_string();
                require_exists(conn, table, &id, what)?;
                SqlValue::Text(id)
            }
            _ => {
                return Err(HandlerErr::bad_params(format!(
                    "patch.{} must be a string or null",
                    key
                )))
            }
        };
        self.raw(col, value);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Run the UPDATE; returns the number of rows changed.
    pub fn apply(
        self,
        conn: &Connection,
        table: &'static str,
        id: &str,
    ) -> Result<usize, HandlerErr> {
        if self.sets.is_empty() {
            return Ok(0);
        }
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, self.sets.join(", "));
        let mut binds = self.binds;
        binds.push(SqlValue::Text(id.to_string()));
        conn.execute(&sql, params_from_iter(binds.iter()))
            .map_err(db_table_err("db_update_failed", table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_str_trims_and_rejects_blank() {
        let p = json!({ "a": "  x ", "b": "   ", "c": 5 });
        assert_eq!(required_str(&p, "a").ok(), Some("x".to_string()));
        assert_eq!(required_str(&p, "b").err().map(|e| e.code), Some("bad_params"));
        assert_eq!(required_str(&p, "c").err().map(|e| e.code), Some("bad_params"));
        assert_eq!(required_str(&p, "z").err().map(|e| e.code), Some("bad_params"));
    }

    #[test]
    fn dates_and_times_normalize() {
        assert_eq!(parse_date("2024-03-05", "d").ok(), Some("2024-03-05".to_string()));
        assert!(parse_date("2024-13-05", "d").is_err());
        assert!(parse_date("05/03/2024", "d").is_err());
        assert_eq!(parse_time("09:30", "t").ok(), Some("09:30:00".to_string()));
        assert_eq!(parse_time("14:05:10", "t").ok(), Some("14:05:10".to_string()));
        assert!(parse_time("25:00", "t").is_err());
    }

    #[test]
    fn date_or_today_falls_back() {
        let p = json!({ "date": "not-a-date" });
        assert_eq!(date_or_today(&p, "date"), crate::db::today());
        let p = json!({ "date": "2023-01-02" });
        assert_eq!(date_or_today(&p, "date"), "2023-01-02");
    }

    #[test]
    fn patch_collects_only_present_keys() {
        let params = json!({ "patch": { "name": " New ", "email": null, "isActive": false } });
        let mut patch = Patch::from_params(&params).ok().expect("patch object");
        assert!(patch.text("name", "name").is_ok());
        assert!(patch.text_blank("email", "email").is_ok());
        assert!(patch.flag("isActive", "is_active").is_ok());
        assert!(patch.text("mobile", "mobile").is_ok());
        assert_eq!(patch.sets, vec!["name = ?", "email = ?", "is_active = ?"]);
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_rejects_blank_required_text() {
        let params = json!({ "patch": { "name": "  " } });
        let mut patch = Patch::from_params(&params).ok().expect("patch object");
        assert_eq!(patch.text("name", "name").err().map(|e| e.code), Some("bad_params"));
        assert!(Patch::from_params(&json!({})).is_err());
    }
}

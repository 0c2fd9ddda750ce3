use crate::auth::{Role, Session};
use crate::ipc::helpers::{
    db_table_err, guarded, optional_i64, required_str, require_exists, HandlerErr, HandlerResult,
    Op,
};
use crate::ipc::rows::{self, query_all};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn classes_list(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    // Correlated subqueries keep the counts from multiplying through joins.
    let classes = query_all(
        conn,
        "SELECT
           c.id, c.class_name, c.section, c.strength,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id AND s.is_active = 1)
         FROM classes c
         ORDER BY c.class_name, c.section",
        [],
        |r| {
            let mut v = rows::class_json(r)?;
            v["studentCount"] = json!(r.get::<_, i64>(4)?);
            v["activeStudentCount"] = json!(r.get::<_, i64>(5)?);
            Ok(v)
        },
    )?;
    Ok(json!({ "classes": classes }))
}

fn classes_create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let class_name = required_str(params, "className")?;
    let section = required_str(params, "section")?;
    let strength = optional_i64(params, "strength", 0)?;
    if strength < 0 {
        return Err(HandlerErr::bad_params("strength must not be negative"));
    }

    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, class_name, section, strength) VALUES(?, ?, ?, ?)",
        (&class_id, &class_name, &section, strength),
    )
    .map_err(db_table_err("db_insert_failed", "classes"))?;

    Ok(json!({
        "classId": class_id,
        "className": class_name,
        "section": section,
        "strength": strength,
    }))
}

fn classes_delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let class_id = required_str(params, "classId")?;
    require_exists(conn, "classes", &class_id, "class")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute("DELETE FROM exams WHERE class_id = ?", [&class_id])
        .map_err(db_table_err("db_delete_failed", "exams"))?;
    for table in ["students", "teachers"] {
        tx.execute(
            &format!("UPDATE {} SET class_id = NULL WHERE class_id = ?", table),
            [&class_id],
        )
        .map_err(db_table_err("db_update_failed", table))?;
    }
    tx.execute("DELETE FROM classes WHERE id = ?", [&class_id])
        .map_err(db_table_err("db_delete_failed", "classes"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "deleted": true }))
}

fn subjects_list(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    Ok(json!({ "subjects": rows::all_subjects(conn)? }))
}

fn subjects_create(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let subject_name = required_str(params, "subjectName")?;
    let subject_code = required_str(params, "subjectCode")?;

    let subject_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, subject_name, subject_code) VALUES(?, ?, ?)",
        (&subject_id, &subject_name, &subject_code),
    )
    .map_err(db_table_err("db_insert_failed", "subjects"))?;

    Ok(json!({
        "subjectId": subject_id,
        "subjectName": subject_name,
        "subjectCode": subject_code,
    }))
}

fn subjects_delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let subject_id = required_str(params, "subjectId")?;
    require_exists(conn, "subjects", &subject_id, "subject")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    for table in ["results", "exams"] {
        tx.execute(
            &format!("UPDATE {} SET subject_id = NULL WHERE subject_id = ?", table),
            [&subject_id],
        )
        .map_err(db_table_err("db_update_failed", table))?;
    }
    tx.execute("DELETE FROM teacher_subjects WHERE subject_id = ?", [&subject_id])
        .map_err(db_table_err("db_delete_failed", "teacher_subjects"))?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [&subject_id])
        .map_err(db_table_err("db_delete_failed", "subjects"))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (role, op): (Option<Role>, Op) = match req.method.as_str() {
        "classes.list" => (Some(Role::Admin), classes_list),
        "classes.create" => (Some(Role::Admin), classes_create),
        "classes.delete" => (Some(Role::Admin), classes_delete),
        "subjects.list" => (None, subjects_list),
        "subjects.create" => (Some(Role::Admin), subjects_create),
        "subjects.delete" => (Some(Role::Admin), subjects_delete),
        _ => return None,
    };
    Some(guarded(state, req, role, op))
}

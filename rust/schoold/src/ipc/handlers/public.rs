//! Views open to anonymous callers: home page and published results.

use crate::db;
use crate::decimal::format_hundredths;
use crate::grading::ReportCard;
use crate::ipc::helpers::{db_err, optional_str, public, required_str, HandlerErr, HandlerResult};
use crate::ipc::rows::{
    self, class_label, event_json, gallery_json, query_all, query_one, result_json, student_json,
    EVENT_COLS, GALLERY_COLS, RESULT_SELECT, STUDENT_COLS, STUDENT_FROM,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Value};

fn home(conn: &Connection, _params: &Value) -> HandlerResult {
    let school_info = rows::school_info(conn)?;
    let gallery = query_all(
        conn,
        &format!(
            "SELECT {} FROM gallery_images WHERE is_active = 1
             ORDER BY display_order, upload_date DESC LIMIT 8",
            GALLERY_COLS
        ),
        [],
        gallery_json,
    )?;
    let events = query_all(
        conn,
        &format!(
            "SELECT {} FROM events WHERE is_active = 1 AND event_date >= ?
             ORDER BY event_date, event_time LIMIT 5",
            EVENT_COLS
        ),
        [db::today()],
        event_json,
    )?;
    Ok(json!({
        "schoolInfo": school_info,
        "galleryImages": gallery,
        "upcomingEvents": events,
    }))
}

fn published(conn: &Connection, params: &Value) -> HandlerResult {
    let class_id = optional_str(params, "classId")?;
    let exam = optional_str(params, "exam")?;

    let mut sql = format!("{} WHERE r.verification_status = 'Verified'", RESULT_SELECT);
    let mut binds: Vec<SqlValue> = Vec::new();
    if let Some(c) = &class_id {
        sql.push_str(" AND s.class_id = ?");
        binds.push(SqlValue::Text(c.clone()));
    }
    if let Some(e) = &exam {
        sql.push_str(" AND instr(lower(r.exam_name), lower(?)) > 0");
        binds.push(SqlValue::Text(e.clone()));
    }
    sql.push_str(" ORDER BY r.exam_date DESC, c.class_name, s.name");
    let results = query_all(conn, &sql, params_from_iter(binds.iter()), result_json)?;

    let exam_names = query_all(
        conn,
        "SELECT DISTINCT exam_name FROM results
         WHERE verification_status = 'Verified' ORDER BY exam_name",
        [],
        |r| Ok(Value::String(r.get(0)?)),
    )?;
    let students = query_all(
        conn,
        "SELECT DISTINCT s.id, s.name, c.class_name, c.section
         FROM students s
         JOIN results r ON r.student_id = s.id AND r.verification_status = 'Verified'
         LEFT JOIN classes c ON c.id = s.class_id
         ORDER BY c.class_name, s.name",
        [],
        |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "classLabel": class_label(r.get(2)?, r.get(3)?),
            }))
        },
    )?;

    Ok(json!({
        "results": results,
        "classes": rows::all_classes(conn)?,
        "examNames": exam_names,
        "studentsWithResults": students,
        "selectedClassId": class_id,
        "selectedExam": exam,
    }))
}

fn report_card(conn: &Connection, params: &Value) -> HandlerResult {
    let student_id = required_str(params, "studentId")?;
    let exam = required_str(params, "exam")?;

    let student = query_one(
        conn,
        &format!("SELECT {} FROM {} WHERE s.id = ?", STUDENT_COLS, STUDENT_FROM),
        [&student_id],
        student_json,
    )?
    .ok_or_else(|| HandlerErr::not_found("student"))?;

    let results = query_all(
        conn,
        &format!(
            "{} WHERE r.student_id = ? AND r.exam_name = ? AND r.verification_status = 'Verified'
             ORDER BY sub.subject_name",
            RESULT_SELECT
        ),
        [&student_id, &exam],
        result_json,
    )?;

    let mut stmt = conn
        .prepare(
            "SELECT marks_obtained_cents, total_marks_cents FROM results
             WHERE student_id = ? AND exam_name = ? AND verification_status = 'Verified'",
        )
        .map_err(db_err("db_query_failed"))?;
    let marks = stmt
        .query_map([&student_id, &exam], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err("db_query_failed"))?;
    let card = ReportCard::summarize(marks);

    Ok(json!({
        "student": student,
        "schoolInfo": rows::school_info(conn)?,
        "examName": exam,
        "results": results,
        "totalObtained": format_hundredths(card.obtained_hundredths),
        "totalMarks": format_hundredths(card.total_hundredths),
        "overallPercentage": format_hundredths(card.percentage_hundredths),
        "overallGrade": card.grade.as_str(),
        "resultStatus": card.status.as_str(),
        "totalSubjects": card.subjects,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "home.get" => Some(public(state, req, home)),
        "results.published" => Some(public(state, req, published)),
        "results.reportCard" => Some(public(state, req, report_card)),
        _ => None,
    }
}

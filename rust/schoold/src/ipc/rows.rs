//! Shared SELECT column lists and row-to-JSON mappers.
//!
//! Column order in each `*_COLS` constant must match its mapper.

use crate::decimal::format_hundredths;
use crate::ipc::helpers::{db_err, HandlerErr};
use rusqlite::{Connection, OptionalExtension, Params, Row};
use serde_json::{json, Value};

pub fn query_all<P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<Value>, HandlerErr>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<Value>,
{
    let mut stmt = conn.prepare(sql).map_err(db_err("db_query_failed"))?;
    let rows = stmt
        .query_map(params, map)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err("db_query_failed"))?;
    Ok(rows)
}

pub fn query_one<P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Option<Value>, HandlerErr>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<Value>,
{
    conn.query_row(sql, params, map)
        .optional()
        .map_err(db_err("db_query_failed"))
}

/// First column of a single-row aggregate (COUNT, SUM with COALESCE).
pub fn scalar_i64<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<i64, HandlerErr> {
    conn.query_row(sql, params, |r| r.get::<_, i64>(0))
        .map_err(db_err("db_query_failed"))
}

pub fn class_label(name: Option<String>, section: Option<String>) -> Option<String> {
    match (name, section) {
        (Some(n), Some(s)) => Some(format!("{} - {}", n, s)),
        (Some(n), None) => Some(n),
        _ => None,
    }
}

fn flag(r: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(r.get::<_, i64>(idx)? != 0)
}

fn money(r: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(format_hundredths(r.get::<_, i64>(idx)?))
}

pub const CLASS_COLS: &str = "id, class_name, section, strength";

pub fn class_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    let name: String = r.get(1)?;
    let section: String = r.get(2)?;
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "className": name,
        "section": section,
        "label": format!("{} - {}", name, section),
        "strength": r.get::<_, i64>(3)?,
    }))
}

pub const SUBJECT_COLS: &str = "id, subject_name, subject_code";

pub fn subject_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "subjectName": r.get::<_, String>(1)?,
        "subjectCode": r.get::<_, String>(2)?,
    }))
}

pub const STUDENT_COLS: &str = "s.id, s.name, s.father_name, s.class_id, c.class_name, c.section,
    s.role, s.address, s.email, s.mobile, s.admission_date, s.monthly_fee_cents,
    s.photo_path, s.is_active, s.created_at";
pub const STUDENT_FROM: &str = "students s LEFT JOIN classes c ON c.id = s.class_id";

pub fn student_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "name": r.get::<_, String>(1)?,
        "fatherName": r.get::<_, String>(2)?,
        "classId": r.get::<_, Option<String>>(3)?,
        "classLabel": class_label(r.get(4)?, r.get(5)?),
        "role": r.get::<_, String>(6)?,
        "address": r.get::<_, String>(7)?,
        "email": r.get::<_, String>(8)?,
        "mobile": r.get::<_, String>(9)?,
        "admissionDate": r.get::<_, String>(10)?,
        "monthlyFee": money(r, 11)?,
        "photoPath": r.get::<_, Option<String>>(12)?,
        "isActive": flag(r, 13)?,
        "createdAt": r.get::<_, String>(14)?,
    }))
}

pub const TEACHER_COLS: &str = "t.id, t.name, t.father_name, t.address, t.email, t.mobile,
    t.aadhar_no, t.qualification, t.role, t.joining_date, t.class_id, c.class_name, c.section,
    t.monthly_salary_cents, t.photo_path, t.is_active, t.created_at";
pub const TEACHER_FROM: &str = "teachers t LEFT JOIN classes c ON c.id = t.class_id";

pub fn teacher_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "name": r.get::<_, String>(1)?,
        "fatherName": r.get::<_, String>(2)?,
        "address": r.get::<_, String>(3)?,
        "email": r.get::<_, String>(4)?,
        "mobile": r.get::<_, String>(5)?,
        "aadharNo": r.get::<_, String>(6)?,
        "qualification": r.get::<_, String>(7)?,
        "role": r.get::<_, String>(8)?,
        "joiningDate": r.get::<_, String>(9)?,
        "classId": r.get::<_, Option<String>>(10)?,
        "classLabel": class_label(r.get(11)?, r.get(12)?),
        "monthlySalary": money(r, 13)?,
        "photoPath": r.get::<_, Option<String>>(14)?,
        "isActive": flag(r, 15)?,
        "createdAt": r.get::<_, String>(16)?,
    }))
}

/// Which payment ledger a query targets.
#[derive(Debug, Clone, Copy)]
pub struct Ledger {
    pub table: &'static str,
    pub owner_col: &'static str,
    pub owner_table: &'static str,
    pub owner_key: &'static str,
    pub owner_what: &'static str,
}

pub const FEES: Ledger = Ledger {
    table: "student_payments",
    owner_col: "student_id",
    owner_table: "students",
    owner_key: "studentId",
    owner_what: "student",
};

pub const SALARIES: Ledger = Ledger {
    table: "teacher_payments",
    owner_col: "teacher_id",
    owner_table: "teachers",
    owner_key: "teacherId",
    owner_what: "teacher",
};

impl Ledger {
    /// `SELECT ... FROM` prefix; callers append WHERE/ORDER clauses on alias `p`.
    pub fn select(&self) -> String {
        format!(
            "SELECT p.id, p.{owner}, o.name, p.payment_mode, p.paid_amount_cents,
                    p.due_amount_cents, p.payment_date, p.status, p.month, p.year,
                    p.remarks, p.created_at
             FROM {table} p JOIN {owners} o ON o.id = p.{owner}",
            owner = self.owner_col,
            table = self.table,
            owners = self.owner_table,
        )
    }

    pub fn row_json(&self, r: &Row<'_>) -> rusqlite::Result<Value> {
        let mut v = json!({
            "id": r.get::<_, String>(0)?,
            "ownerName": r.get::<_, String>(2)?,
            "paymentMode": r.get::<_, String>(3)?,
            "paidAmount": money(r, 4)?,
            "dueAmount": money(r, 5)?,
            "paymentDate": r.get::<_, String>(6)?,
            "status": r.get::<_, String>(7)?,
            "month": r.get::<_, String>(8)?,
            "year": r.get::<_, i64>(9)?,
            "remarks": r.get::<_, String>(10)?,
            "createdAt": r.get::<_, String>(11)?,
        });
        v[self.owner_key] = Value::String(r.get::<_, String>(1)?);
        Ok(v)
    }
}

pub const RESULT_SELECT: &str = "SELECT r.id, r.student_id, s.name, c.class_name, c.section,
        r.exam_name, r.subject_id, sub.subject_name, r.marks_obtained_cents,
        r.total_marks_cents, r.percentage_cents, r.grade, r.submitted_by, t.name,
        r.submission_date, r.verification_status, r.verified_by, a.name,
        r.verification_date, r.verification_remarks, r.exam_date, r.remarks, s.class_id
    FROM results r
    JOIN students s ON s.id = r.student_id
    LEFT JOIN classes c ON c.id = s.class_id
    LEFT JOIN subjects sub ON sub.id = r.subject_id
    LEFT JOIN teachers t ON t.id = r.submitted_by
    LEFT JOIN admins a ON a.id = r.verified_by";

pub fn result_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "studentId": r.get::<_, String>(1)?,
        "studentName": r.get::<_, String>(2)?,
        "classLabel": class_label(r.get(3)?, r.get(4)?),
        "classId": r.get::<_, Option<String>>(22)?,
        "examName": r.get::<_, String>(5)?,
        "subjectId": r.get::<_, Option<String>>(6)?,
        "subjectName": r.get::<_, Option<String>>(7)?,
        "marksObtained": money(r, 8)?,
        "totalMarks": money(r, 9)?,
        "percentage": money(r, 10)?,
        "grade": r.get::<_, String>(11)?,
        "submittedBy": r.get::<_, Option<String>>(12)?,
        "submittedByName": r.get::<_, Option<String>>(13)?,
        "submissionDate": r.get::<_, String>(14)?,
        "verificationStatus": r.get::<_, String>(15)?,
        "verifiedBy": r.get::<_, Option<String>>(16)?,
        "verifiedByName": r.get::<_, Option<String>>(17)?,
        "verificationDate": r.get::<_, Option<String>>(18)?,
        "verificationRemarks": r.get::<_, String>(19)?,
        "examDate": r.get::<_, String>(20)?,
        "remarks": r.get::<_, String>(21)?,
    }))
}

pub const NOTICE_COLS: &str = "id, title, description, category, issued_by, priority,
    notice_date, valid_until, audience, file_path, is_active, created_at";

pub fn notice_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "title": r.get::<_, String>(1)?,
        "description": r.get::<_, String>(2)?,
        "category": r.get::<_, String>(3)?,
        "issuedBy": r.get::<_, String>(4)?,
        "priority": r.get::<_, String>(5)?,
        "noticeDate": r.get::<_, String>(6)?,
        "validUntil": r.get::<_, Option<String>>(7)?,
        "audience": r.get::<_, String>(8)?,
        "filePath": r.get::<_, Option<String>>(9)?,
        "isActive": flag(r, 10)?,
        "createdAt": r.get::<_, String>(11)?,
    }))
}

pub const EVENT_COLS: &str =
    "id, title, description, event_date, event_time, image_path, is_active, created_at";

pub fn event_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "title": r.get::<_, String>(1)?,
        "description": r.get::<_, String>(2)?,
        "eventDate": r.get::<_, String>(3)?,
        "eventTime": r.get::<_, Option<String>>(4)?,
        "imagePath": r.get::<_, Option<String>>(5)?,
        "isActive": flag(r, 6)?,
        "createdAt": r.get::<_, String>(7)?,
    }))
}

pub const EXAM_SELECT: &str = "SELECT e.id, e.exam_name, e.class_id, c.class_name, c.section,
        e.exam_date, e.exam_time, e.room_no, e.subject_id, sub.subject_name
    FROM exams e
    JOIN classes c ON c.id = e.class_id
    LEFT JOIN subjects sub ON sub.id = e.subject_id";

pub fn exam_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "examName": r.get::<_, String>(1)?,
        "classId": r.get::<_, String>(2)?,
        "classLabel": class_label(r.get(3)?, r.get(4)?),
        "examDate": r.get::<_, String>(5)?,
        "examTime": r.get::<_, String>(6)?,
        "roomNo": r.get::<_, String>(7)?,
        "subjectId": r.get::<_, Option<String>>(8)?,
        "subjectName": r.get::<_, Option<String>>(9)?,
    }))
}

pub const GALLERY_COLS: &str =
    "id, title, image_path, category, description, upload_date, is_active, display_order";

pub fn gallery_json(r: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "title": r.get::<_, String>(1)?,
        "imagePath": r.get::<_, String>(2)?,
        "category": r.get::<_, String>(3)?,
        "description": r.get::<_, String>(4)?,
        "uploadDate": r.get::<_, String>(5)?,
        "isActive": flag(r, 6)?,
        "displayOrder": r.get::<_, i64>(7)?,
    }))
}

pub fn school_info(conn: &Connection) -> Result<Value, HandlerErr> {
    crate::db::ensure_school_info(conn)
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    query_one(
        conn,
        "SELECT school_name, address, contact_number, email, principal_name,
                established_year, total_students, total_teachers, motto, description,
                logo_path, updated_at
         FROM school_info WHERE id = 1",
        [],
        |r| {
            Ok(json!({
                "schoolName": r.get::<_, String>(0)?,
                "address": r.get::<_, String>(1)?,
                "contactNumber": r.get::<_, String>(2)?,
                "email": r.get::<_, String>(3)?,
                "principalName": r.get::<_, String>(4)?,
                "establishedYear": r.get::<_, i64>(5)?,
                "totalStudents": r.get::<_, i64>(6)?,
                "totalTeachers": r.get::<_, i64>(7)?,
                "motto": r.get::<_, String>(8)?,
                "description": r.get::<_, String>(9)?,
                "logoPath": r.get::<_, Option<String>>(10)?,
                "updatedAt": r.get::<_, Option<String>>(11)?,
            }))
        },
    )?
    .ok_or_else(|| HandlerErr::not_found("school info"))
}

pub fn all_classes(conn: &Connection) -> Result<Vec<Value>, HandlerErr> {
    query_all(
        conn,
        &format!("SELECT {} FROM classes ORDER BY class_name, section", CLASS_COLS),
        [],
        class_json,
    )
}

pub fn all_subjects(conn: &Connection) -> Result<Vec<Value>, HandlerErr> {
    query_all(
        conn,
        &format!("SELECT {} FROM subjects ORDER BY subject_name", SUBJECT_COLS),
        [],
        subject_json,
    )
}

/// Up to `limit` active notices for `audiences`, newest first.
pub fn notices_for(conn: &Connection, audiences: &[&str], limit: i64) -> Result<Vec<Value>, HandlerErr> {
    let placeholders = vec!["?"; audiences.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM notices
         WHERE is_active = 1 AND audience IN ({})
         ORDER BY notice_date DESC, created_at DESC
         LIMIT {}",
        NOTICE_COLS, placeholders, limit
    );
    query_all(conn, &sql, rusqlite::params_from_iter(audiences.iter()), notice_json)
}

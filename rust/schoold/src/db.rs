use crate::auth;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "school.sqlite3";

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@midpoint.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const DEFAULT_CLASSES: [(&str, &str, i64); 5] = [
    ("Class 1", "A", 30),
    ("Class 2", "A", 30),
    ("Class 3", "A", 25),
    ("Class 4", "A", 25),
    ("Class 5", "A", 20),
];

const DEFAULT_SUBJECTS: [(&str, &str); 5] = [
    ("Hindi", "HIN"),
    ("English", "ENG"),
    ("Mathematics", "MATH"),
    ("Science", "SCI"),
    ("Social Studies", "SST"),
];

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_info(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            school_name TEXT NOT NULL DEFAULT 'Mid Point School',
            address TEXT NOT NULL DEFAULT 'Barahiya, Near Hanuman Temple',
            contact_number TEXT NOT NULL DEFAULT '7762044304',
            email TEXT NOT NULL DEFAULT 'bssingtechenterprieses@gmail.com',
            principal_name TEXT NOT NULL DEFAULT 'Raja Ram Kumar',
            established_year INTEGER NOT NULL DEFAULT 2000,
            total_students INTEGER NOT NULL DEFAULT 500,
            total_teachers INTEGER NOT NULL DEFAULT 25,
            motto TEXT NOT NULL DEFAULT 'Excellence in Education',
            description TEXT NOT NULL DEFAULT '',
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            class_name TEXT NOT NULL,
            section TEXT NOT NULL,
            strength INTEGER NOT NULL DEFAULT 0,
            UNIQUE(class_name, section)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            subject_name TEXT NOT NULL,
            subject_code TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'Administrator',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            father_name TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL UNIQUE,
            mobile TEXT NOT NULL,
            aadhar_no TEXT NOT NULL DEFAULT '',
            qualification TEXT NOT NULL DEFAULT '',
            role TEXT NOT NULL DEFAULT 'Teacher',
            joining_date TEXT NOT NULL,
            class_id TEXT,
            password_hash TEXT NOT NULL,
            monthly_salary_cents INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_class ON teachers(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_subjects(
            teacher_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            PRIMARY KEY(teacher_id, subject_id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            father_name TEXT NOT NULL,
            class_id TEXT,
            role TEXT NOT NULL DEFAULT 'Student',
            address TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            mobile TEXT NOT NULL,
            admission_date TEXT NOT NULL,
            monthly_fee_cents INTEGER NOT NULL DEFAULT 0,
            password_hash TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_email ON students(email)",
        [],
    )?;

    for table in ["student_payments", "teacher_payments"] {
        let (owner_col, owner_table) = if table == "student_payments" {
            ("student_id", "students")
        } else {
            ("teacher_id", "teachers")
        };
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table}(
                    id TEXT PRIMARY KEY,
                    {owner_col} TEXT NOT NULL,
                    payment_mode TEXT NOT NULL DEFAULT 'Cash',
                    paid_amount_cents INTEGER NOT NULL,
                    due_amount_cents INTEGER NOT NULL DEFAULT 0,
                    payment_date TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'Pending',
                    month TEXT NOT NULL,
                    year INTEGER NOT NULL,
                    remarks TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    FOREIGN KEY({owner_col}) REFERENCES {owner_table}(id)
                )"
            ),
            [],
        )?;
        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table}({owner_col})"),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_attendance(
            teacher_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(teacher_id, date),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_attendance(
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(student_id, date),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_attendance_date ON teacher_attendance(date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_attendance_date ON student_attendance(date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notices(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'General',
            issued_by TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'Medium',
            notice_date TEXT NOT NULL,
            valid_until TEXT,
            audience TEXT NOT NULL DEFAULT 'All',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            event_date TEXT NOT NULL,
            event_time TEXT,
            image_path TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            exam_name TEXT NOT NULL,
            class_id TEXT NOT NULL,
            exam_date TEXT NOT NULL,
            exam_time TEXT NOT NULL,
            room_no TEXT NOT NULL DEFAULT '',
            subject_id TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exams_class ON exams(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS gallery_images(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            image_path TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'Other',
            description TEXT NOT NULL DEFAULT '',
            upload_date TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            display_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            subject_id TEXT,
            marks_obtained_cents INTEGER NOT NULL,
            total_marks_cents INTEGER NOT NULL,
            percentage_cents INTEGER NOT NULL,
            grade TEXT NOT NULL,
            submitted_by TEXT,
            submission_date TEXT NOT NULL,
            verification_status TEXT NOT NULL DEFAULT 'Pending',
            verified_by TEXT,
            verification_date TEXT,
            verification_remarks TEXT NOT NULL DEFAULT '',
            exam_date TEXT NOT NULL,
            remarks TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(submitted_by) REFERENCES teachers(id),
            FOREIGN KEY(verified_by) REFERENCES admins(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_student ON results(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_status ON results(verification_status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_submitted_by ON results(submitted_by)",
        [],
    )?;

    // Media references were added after the first schema; older workspaces lack them.
    ensure_column(&conn, "school_info", "logo_path", "TEXT")?;
    ensure_column(&conn, "admins", "photo_path", "TEXT")?;
    ensure_column(&conn, "teachers", "photo_path", "TEXT")?;
    ensure_column(&conn, "students", "photo_path", "TEXT")?;
    ensure_column(&conn, "notices", "file_path", "TEXT")?;

    ensure_school_info(&conn)?;

    Ok(conn)
}

pub fn ensure_school_info(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO school_info(id, updated_at) VALUES(1, ?)",
        [now_ts()],
    )?;
    Ok(())
}

pub fn admin_count(conn: &Connection) -> anyhow::Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM admins", [], |r| r.get(0))?)
}

#[derive(Debug, Clone, Default)]
pub struct SeedSummary {
    pub admin_created: bool,
    pub classes_created: usize,
    pub subjects_created: usize,
}

/// Get-or-create the initial admin account, default classes and subjects.
pub fn seed_defaults(
    conn: &Connection,
    admin_email: &str,
    admin_password: &str,
) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    let tx = conn.unchecked_transaction()?;

    let existing: Option<String> = tx
        .query_row("SELECT id FROM admins WHERE email = ?", [admin_email], |r| {
            r.get(0)
        })
        .optional()?;
    if existing.is_none() {
        let password_hash = auth::hash_password(admin_password)?;
        tx.execute(
            "INSERT INTO admins(id, name, email, phone, address, password_hash, role, created_at)
             VALUES(?, 'Admin User', ?, '7762044304', 'Barahiya, Near Hanuman Temple', ?, 'Administrator', ?)",
            (
                Uuid::new_v4().to_string(),
                admin_email,
                password_hash,
                now_ts(),
            ),
        )
        .context("failed to create admin")?;
        summary.admin_created = true;
    }

    for (class_name, section, strength) in DEFAULT_CLASSES {
        let n = tx.execute(
            "INSERT OR IGNORE INTO classes(id, class_name, section, strength) VALUES(?, ?, ?, ?)",
            (Uuid::new_v4().to_string(), class_name, section, strength),
        )?;
        summary.classes_created += n;
    }

    for (subject_name, code) in DEFAULT_SUBJECTS {
        let n = tx.execute(
            "INSERT OR IGNORE INTO subjects(id, subject_name, subject_code) VALUES(?, ?, ?)",
            (Uuid::new_v4().to_string(), subject_name, code),
        )?;
        summary.subjects_created += n;
    }

    tx.commit()?;
    Ok(summary)
}

fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> anyhow::Result<()> {
    if table_has_column(conn, table, column)? {
        return Ok(());
    }
    conn.execute(
        &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl),
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

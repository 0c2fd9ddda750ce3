mod support;

use serde_json::json;
use support::{error_code, ok, Sidecar};

#[test]
fn teacher_attendance_upserts_one_row_per_day() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let t1 = sc.create_teacher(&admin, "Anil", "anil@school.test", None);
    let t2 = sc.create_teacher(&admin, "Bina", "bina@school.test", None);
    let t3 = sc.create_teacher(&admin, "Chandan", "chandan@school.test", None);
    ok(&sc.call_as(
        &admin,
        "teachers.update",
        json!({ "teacherId": t3, "patch": { "isActive": false } }),
    ));

    let day = ok(&sc.call_as(&admin, "teacherAttendance.day", json!({ "date": "2024-08-05" })));
    assert_eq!(day["totalTeachers"], json!(2));
    assert_eq!(day["teachers"][0]["name"], json!("Anil"));
    assert_eq!(day["teachers"][0]["status"], json!(null));

    let marked = ok(&sc.call_as(
        &admin,
        "teacherAttendance.mark",
        json!({
            "date": "2024-08-05",
            "statuses": { t1.clone(): "Present", t2.clone(): "Half Day", t3.clone(): "Present", "ghost": "Absent" },
        }),
    ));
    assert_eq!(marked["marked"], json!(2));

    // Re-marking the same day overwrites; invalid statuses are skipped.
    let marked = ok(&sc.call_as(
        &admin,
        "teacherAttendance.mark",
        json!({
            "date": "2024-08-05",
            "statuses": { t1.clone(): "Absent", t2.clone(): "Sleeping" },
        }),
    ));
    assert_eq!(marked["marked"], json!(1));

    let day = ok(&sc.call_as(&admin, "teacherAttendance.day", json!({ "date": "2024-08-05" })));
    assert_eq!(day["present"], json!(0));
    assert_eq!(day["absent"], json!(1));
    assert_eq!(day["halfDay"], json!(1));
    assert_eq!(day["leave"], json!(0));
    assert_eq!(day["teachers"][1]["status"], json!("Half Day"));

    let other_day = ok(&sc.call_as(&admin, "teacherAttendance.day", json!({ "date": "2024-08-06" })));
    assert_eq!(other_day["absent"], json!(0));
}

#[test]
fn invalid_date_falls_back_to_today() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    let day = ok(&sc.call_as(&admin, "teacherAttendance.day", json!({ "date": "31/12/2024" })));
    assert_eq!(day["date"], json!(today));
    let day = ok(&sc.call_as(&admin, "teacherAttendance.day", json!({})));
    assert_eq!(day["date"], json!(today));

    let resp = sc.call_as(&admin, "teacherAttendance.mark", json!({ "statuses": [] }));
    assert_eq!(error_code(&resp), "bad_params");
}

#[test]
fn student_attendance_is_scoped_to_the_teachers_class() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let class4 = sc.class_id(&admin, "Class 4");
    let class5 = sc.class_id(&admin, "Class 5");
    sc.create_teacher(&admin, "Class Teacher", "ct@school.test", Some(&class4));
    sc.create_teacher(&admin, "Floater", "floater@school.test", None);
    let mine = sc.create_student(&admin, "Isha", "isha@school.test", Some(&class4));
    let theirs = sc.create_student(&admin, "Jay", "jay@school.test", Some(&class5));

    let floater = sc.login("teacher", "floater@school.test", "teach123");
    assert_eq!(
        error_code(&sc.call_as(&floater, "studentAttendance.day", json!({}))),
        "not_assigned"
    );
    assert_eq!(
        error_code(&sc.call_as(&floater, "studentAttendance.mark", json!({ "statuses": {} }))),
        "not_assigned"
    );

    let teacher = sc.login("teacher", "ct@school.test", "teach123");
    let marked = ok(&sc.call_as(
        &teacher,
        "studentAttendance.mark",
        json!({
            "date": "2024-10-01",
            "statuses": { mine.clone(): "Leave", theirs.clone(): "Absent" },
        }),
    ));
    assert_eq!(marked["marked"], json!(1));

    let day = ok(&sc.call_as(&teacher, "studentAttendance.day", json!({ "date": "2024-10-01" })));
    assert_eq!(day["totalStudents"], json!(1));
    assert_eq!(day["leave"], json!(1));
    assert_eq!(day["students"][0]["id"], json!(mine));
}

#[test]
fn day_counts_include_people_deactivated_after_marking() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let t1 = sc.create_teacher(&admin, "Dev", "dev@school.test", None);
    let t2 = sc.create_teacher(&admin, "Esha", "esha@school.test", None);
    ok(&sc.call_as(
        &admin,
        "teacherAttendance.mark",
        json!({ "date": "2024-08-07", "statuses": { t1.clone(): "Present", t2.clone(): "Leave" } }),
    ));
    ok(&sc.call_as(
        &admin,
        "teachers.update",
        json!({ "teacherId": t2, "patch": { "isActive": false } }),
    ));

    let day = ok(&sc.call_as(&admin, "teacherAttendance.day", json!({ "date": "2024-08-07" })));
    assert_eq!(day["totalTeachers"], json!(1));
    assert_eq!(day["teachers"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(day["present"], json!(1));
    assert_eq!(day["leave"], json!(1));
}

mod support;

use serde_json::json;
use support::{error_code, ok, Sidecar};

#[test]
fn health_and_workspace_lifecycle() {
    let mut sc = Sidecar::spawn_bare(&[]);

    let health = ok(&sc.call("health", json!({})));
    assert_eq!(health["workspacePath"], json!(null));
    assert_eq!(health["activeSessions"], json!(0));

    let resp = sc.call("home.get", json!({}));
    assert_eq!(error_code(&resp), "no_workspace");

    let resp = sc.call("workspace.select", json!({}));
    assert_eq!(error_code(&resp), "bad_params");

    let path = sc.workspace.path().to_string_lossy().to_string();
    let selected = ok(&sc.call("workspace.select", json!({ "path": path })));
    assert_eq!(selected["workspacePath"], json!(path));
    assert!(sc.workspace.path().join("school.sqlite3").is_file());

    let home = ok(&sc.call("home.get", json!({})));
    assert_eq!(home["schoolInfo"]["schoolName"], json!("Mid Point School"));
    assert_eq!(home["galleryImages"], json!([]));
}

#[test]
fn bad_json_and_unknown_methods() {
    let mut sc = Sidecar::start();

    let resp = sc.send_line("{not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));
    assert!(resp.get("id").is_none());

    // The loop keeps going after a bad line.
    ok(&sc.call("health", json!({})));

    let resp = sc.call("nope.nothing", json!({}));
    assert_eq!(error_code(&resp), "not_implemented");
}

#[test]
fn router_dispatch_covers_handler_families() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();

    let admin_methods = [
        "admin.dashboard",
        "students.list",
        "teachers.list",
        "classes.list",
        "subjects.list",
        "fees.list",
        "salaries.list",
        "notices.list",
        "events.list",
        "exams.list",
        "gallery.list",
        "teacherAttendance.day",
        "results.verifyQueue",
    ];
    for method in admin_methods {
        let resp = sc.call_as(&admin, method, json!({}));
        ok(&resp);
    }

    for method in ["home.get", "results.published"] {
        ok(&sc.call(method, json!({})));
    }

    let class_id = sc.class_id(&admin, "Class 1");
    sc.create_teacher(&admin, "Asha Verma", "asha@school.test", Some(&class_id));
    let teacher = sc.login("teacher", "asha@school.test", "teach123");
    for method in [
        "teacher.dashboard",
        "teacher.salaryHistory",
        "teacher.students",
        "teacher.profile",
        "studentAttendance.day",
        "results.mine",
        "results.downloadOptions",
    ] {
        ok(&sc.call_as(&teacher, method, json!({})));
    }

    sc.create_student(&admin, "Ravi Kumar", "ravi@school.test", Some(&class_id));
    let student = sc.login("student", "ravi@school.test", "stud123");
    for method in [
        "student.dashboard",
        "student.payments",
        "student.profile",
        "student.exams",
    ] {
        ok(&sc.call_as(&student, method, json!({})));
    }

    let health = ok(&sc.call("health", json!({})));
    assert_eq!(health["activeSessions"], json!(3));
}

#[test]
fn seed_defaults_is_idempotent() {
    let mut sc = Sidecar::start();
    let first = ok(&sc.call("setup.seedDefaults", json!({})));
    assert_eq!(first["adminCreated"], json!(true));
    assert_eq!(first["classesCreated"], json!(5));
    assert_eq!(first["subjectsCreated"], json!(5));

    let admin = sc.login("admin", support::ADMIN_EMAIL, support::ADMIN_PASSWORD);
    let again = ok(&sc.call_as(&admin, "setup.seedDefaults", json!({})));
    assert_eq!(again["adminCreated"], json!(false));
    assert_eq!(again["classesCreated"], json!(0));
    assert_eq!(again["subjectsCreated"], json!(0));

    let classes = ok(&sc.call_as(&admin, "classes.list", json!({})));
    let strengths: Vec<i64> = classes["classes"]
        .as_array()
        .expect("classes")
        .iter()
        .map(|c| c["strength"].as_i64().expect("strength"))
        .collect();
    assert_eq!(strengths, vec![30, 30, 25, 25, 20]);

    let subjects = ok(&sc.call_as(&admin, "subjects.list", json!({})));
    assert_eq!(subjects["subjects"].as_array().map(|a| a.len()), Some(5));
}

#[test]
fn startup_flags_open_and_seed_workspace() {
    let dir = tempfile::tempdir().expect("dir");
    let path = dir.path().to_string_lossy().to_string();
    let mut sc = Sidecar::spawn_bare(&["--workspace", &path, "--seed-defaults"]);

    let health = ok(&sc.call("health", json!({})));
    assert_eq!(health["workspacePath"], json!(path));
    sc.login("admin", support::ADMIN_EMAIL, support::ADMIN_PASSWORD);
}

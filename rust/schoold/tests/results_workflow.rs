mod support;

use serde_json::{json, Value};
use support::{error_code, ok, Sidecar};

struct School {
    sc: Sidecar,
    admin: String,
    teacher: String,
    student_id: String,
    class_id: String,
}

fn school() -> School {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let class_id = sc.class_id(&admin, "Class 3");
    sc.create_teacher(&admin, "Kavita", "kavita@school.test", Some(&class_id));
    let student_id = sc.create_student(&admin, "Neha", "neha@school.test", Some(&class_id));
    let teacher = sc.login("teacher", "kavita@school.test", "teach123");
    School {
        sc,
        admin,
        teacher,
        student_id,
        class_id,
    }
}

fn submit(s: &mut School, subject: &str, obtained: Value, total: Value) -> String {
    let subject_id = s.sc.subject_id(&s.teacher, subject);
    let teacher = s.teacher.clone();
    let resp = s.sc.call_as(
        &teacher,
        "results.submit",
        json!({
            "studentId": s.student_id,
            "examName": "Half Yearly",
            "subjectId": subject_id,
            "marksObtained": obtained,
            "totalMarks": total,
            "examDate": "2024-09-20",
        }),
    );
    ok(&resp)["resultId"].as_str().expect("resultId").to_string()
}

#[test]
fn submission_computes_grade_from_exact_ratio() {
    let mut s = school();
    let id = submit(&mut s, "MATH", json!("179.99"), json!(200));
    let queue = ok(&s.sc.call_as(&s.admin.clone(), "results.verifyQueue", json!({})));
    let pending = queue["pending"].as_array().expect("pending");
    assert_eq!(pending.len(), 1);
    let r = &pending[0];
    assert_eq!(r["id"], json!(id));
    assert_eq!(r["verificationStatus"], json!("Pending"));
    // 89.995 rounds to 90.00 for display but the grade uses the exact ratio.
    assert_eq!(r["percentage"], json!("90.00"));
    assert_eq!(r["grade"], json!("A"));
    assert_eq!(r["marksObtained"], json!("179.99"));
    assert_eq!(r["submittedByName"], json!("Kavita"));
}

#[test]
fn invalid_marks_are_rejected() {
    let mut s = school();
    let teacher = s.teacher.clone();
    for (obtained, total) in [(json!(120), json!(100)), (json!(10), json!(0)), (json!("1.234"), json!(100)), (json!(-5), json!(100)), (json!(1000), json!(1000))] {
        let resp = s.sc.call_as(
            &teacher,
            "results.submit",
            json!({
                "studentId": s.student_id,
                "examName": "Unit Test",
                "marksObtained": obtained,
                "totalMarks": total,
                "examDate": "2024-07-01",
            }),
        );
        assert_eq!(error_code(&resp), "bad_params", "{}", resp);
    }
}

#[test]
fn only_verified_results_are_published() {
    let mut s = school();
    let math = submit(&mut s, "MATH", json!(45), json!(50));
    let sci = submit(&mut s, "SCI", json!(30), json!(50));
    let eng = submit(&mut s, "ENG", json!(10), json!(50));
    let admin = s.admin.clone();

    let published = ok(&s.sc.call("results.published", json!({})));
    assert_eq!(published["results"], json!([]));

    let approved = ok(&s.sc.call_as(&admin, "results.approve", json!({ "resultId": math })));
    assert_eq!(approved["result"]["verificationStatus"], json!("Verified"));
    assert_eq!(approved["result"]["verifiedByName"], json!("Admin User"));
    assert_eq!(approved["result"]["verificationRemarks"], json!(""));
    ok(&s.sc.call_as(&admin, "results.approve", json!({ "resultId": sci, "remarks": "ok" })));
    let rejected = ok(&s.sc.call_as(&admin, "results.reject", json!({ "resultId": eng })));
    assert_eq!(rejected["result"]["verificationStatus"], json!("Rejected"));
    assert_eq!(rejected["result"]["verificationRemarks"], json!("Rejected by admin"));

    let published = ok(&s.sc.call("results.published", json!({ "classId": s.class_id, "exam": "half" })));
    let ids: Vec<&str> = published["results"]
        .as_array()
        .expect("results")
        .iter()
        .map(|r| r["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&math.as_str()) && ids.contains(&sci.as_str()));
    assert_eq!(published["examNames"], json!(["Half Yearly"]));
    assert_eq!(published["studentsWithResults"].as_array().map(|a| a.len()), Some(1));

    let none = ok(&s.sc.call("results.published", json!({ "classId": "missing" })));
    assert_eq!(none["results"], json!([]));

    let queue = ok(&s.sc.call_as(&admin, "results.verifyQueue", json!({})));
    assert_eq!(queue["pending"], json!([]));
    assert_eq!(queue["recentlyDecided"].as_array().map(|a| a.len()), Some(3));
}

#[test]
fn report_card_sums_verified_subjects() {
    let mut s = school();
    let a = submit(&mut s, "MATH", json!(45), json!(50));
    let b = submit(&mut s, "SCI", json!(30), json!(50));
    let _pending = submit(&mut s, "ENG", json!(50), json!(50));
    let admin = s.admin.clone();
    for id in [&a, &b] {
        ok(&s.sc.call_as(&admin, "results.approve", json!({ "resultId": id })));
    }

    let card = ok(&s.sc.call(
        "results.reportCard",
        json!({ "studentId": s.student_id, "exam": "Half Yearly" }),
    ));
    assert_eq!(card["totalSubjects"], json!(2));
    assert_eq!(card["totalObtained"], json!("75.00"));
    assert_eq!(card["totalMarks"], json!("100.00"));
    assert_eq!(card["overallPercentage"], json!("75.00"));
    assert_eq!(card["overallGrade"], json!("B+"));
    assert_eq!(card["resultStatus"], json!("PASS"));
    // Ordered by subject name: Mathematics before Science.
    assert_eq!(card["results"][0]["subjectName"], json!("Mathematics"));

    let empty = ok(&s.sc.call(
        "results.reportCard",
        json!({ "studentId": s.student_id, "exam": "Finals" }),
    ));
    assert_eq!(empty["totalSubjects"], json!(0));
    assert_eq!(empty["overallPercentage"], json!("0.00"));
    assert_eq!(empty["resultStatus"], json!("FAIL"));

    let missing = s.sc.call(
        "results.reportCard",
        json!({ "studentId": "nobody", "exam": "Half Yearly" }),
    );
    assert_eq!(error_code(&missing), "not_found");
}

#[test]
fn teachers_edit_only_their_own_pending_results() {
    let mut s = school();
    let id = submit(&mut s, "MATH", json!(20), json!(50));
    let teacher = s.teacher.clone();
    let admin = s.admin.clone();

    let edited = ok(&s.sc.call_as(
        &teacher,
        "results.edit",
        json!({ "resultId": id, "patch": { "marksObtained": 46, "remarks": "rechecked" } }),
    ));
    assert_eq!(edited["result"]["marksObtained"], json!("46.00"));
    assert_eq!(edited["result"]["percentage"], json!("92.00"));
    assert_eq!(edited["result"]["grade"], json!("A+"));
    assert_eq!(edited["result"]["remarks"], json!("rechecked"));

    // Another teacher cannot see it.
    s.sc.create_teacher(&admin, "Other", "other@school.test", None);
    let other = s.sc.login("teacher", "other@school.test", "teach123");
    let resp = s.sc.call_as(
        &other,
        "results.edit",
        json!({ "resultId": id, "patch": { "marksObtained": 1 } }),
    );
    assert_eq!(error_code(&resp), "not_found");
    let mine = ok(&s.sc.call_as(&other, "results.mine", json!({})));
    assert_eq!(mine["results"], json!([]));

    ok(&s.sc.call_as(&admin, "results.approve", json!({ "resultId": id })));
    let resp = s.sc.call_as(
        &teacher,
        "results.edit",
        json!({ "resultId": id, "patch": { "marksObtained": 10 } }),
    );
    assert_eq!(error_code(&resp), "invalid_state");
    assert_eq!(
        resp["error"]["message"],
        json!("Cannot edit verified or rejected results")
    );

    // An admin may still re-decide.
    let again = ok(&s.sc.call_as(&admin, "results.reject", json!({ "resultId": id, "remarks": "recount" })));
    assert_eq!(again["result"]["verificationStatus"], json!("Rejected"));
    assert_eq!(again["result"]["verificationRemarks"], json!("recount"));
}

#[test]
fn results_mine_and_delete() {
    let mut s = school();
    let id = submit(&mut s, "HIN", json!(33), json!(100));
    let teacher = s.teacher.clone();
    let admin = s.admin.clone();

    let mine = ok(&s.sc.call_as(&teacher, "results.mine", json!({})));
    assert_eq!(mine["results"][0]["grade"], json!("F"));
    assert_eq!(mine["students"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(mine["subjects"].as_array().map(|a| a.len()), Some(5));

    ok(&s.sc.call_as(&admin, "results.delete", json!({ "resultId": id })));
    let mine = ok(&s.sc.call_as(&teacher, "results.mine", json!({})));
    assert_eq!(mine["results"], json!([]));
    assert_eq!(
        error_code(&s.sc.call_as(&admin, "results.delete", json!({ "resultId": id }))),
        "not_found"
    );
}

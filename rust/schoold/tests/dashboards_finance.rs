mod support;

use serde_json::json;
use support::{error_code, ok, Sidecar};

fn fee(sc: &mut Sidecar, admin: &str, student_id: &str, paid: &str, due: &str, status: &str, date: &str) -> String {
    let resp = sc.call_as(
        admin,
        "fees.create",
        json!({
            "studentId": student_id,
            "paidAmount": paid,
            "dueAmount": due,
            "paymentDate": date,
            "status": status,
            "paymentMode": "UPI",
            "month": "August",
            "year": 2024,
        }),
    );
    ok(&resp)["paymentId"].as_str().expect("paymentId").to_string()
}

fn salary(sc: &mut Sidecar, admin: &str, teacher_id: &str, paid: &str, due: &str, status: &str, date: &str) {
    ok(&sc.call_as(
        admin,
        "salaries.create",
        json!({
            "teacherId": teacher_id,
            "paidAmount": paid,
            "dueAmount": due,
            "paymentDate": date,
            "status": status,
            "month": "August",
            "year": 2024,
        }),
    ));
}

#[test]
fn admin_dashboard_totals_paid_money_only() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let s1 = sc.create_student(&admin, "Kiran", "kiran@school.test", None);
    let t1 = sc.create_teacher(&admin, "Lata", "lata@school.test", None);

    fee(&mut sc, &admin, &s1, "1500.50", "0", "Paid", "2024-08-01");
    fee(&mut sc, &admin, &s1, "1000", "500", "Partial", "2024-08-02");
    fee(&mut sc, &admin, &s1, "0", "1500", "Pending", "2024-08-03");
    salary(&mut sc, &admin, &t1, "20000", "0", "Paid", "2024-08-05");
    salary(&mut sc, &admin, &t1, "0", "20000", "Pending", "2024-09-05");

    let dash = ok(&sc.call_as(&admin, "admin.dashboard", json!({})));
    assert_eq!(dash["totalRevenue"], json!("1500.50"));
    assert_eq!(dash["totalSpend"], json!("20000.00"));
    assert_eq!(dash["netIncome"], json!("-18499.50"));
    assert_eq!(dash["totalStudents"], json!(1));
    assert_eq!(dash["totalTeachers"], json!(1));
    assert_eq!(dash["totalClasses"], json!(5));
    assert_eq!(dash["pendingFees"], json!(1));
    assert_eq!(dash["pendingSalaries"], json!(1));
    assert_eq!(dash["recentFeePayments"][0]["paymentDate"], json!("2024-08-03"));
    assert_eq!(dash["recentSalaryPayments"][0]["paymentDate"], json!("2024-09-05"));
}

#[test]
fn teacher_and_student_dashboards_sum_their_own_ledgers() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let class_id = sc.class_id(&admin, "Class 1");
    let s1 = sc.create_student(&admin, "Mohan", "mohan@school.test", Some(&class_id));
    let s2 = sc.create_student(&admin, "Nisha", "nisha@school.test", Some(&class_id));
    let t1 = sc.create_teacher(&admin, "Om", "om@school.test", Some(&class_id));

    fee(&mut sc, &admin, &s1, "1200", "0", "Paid", "2024-07-01");
    fee(&mut sc, &admin, &s1, "300", "0", "Paid", "2024-08-01");
    fee(&mut sc, &admin, &s1, "0", "1500", "Pending", "2024-09-01");
    fee(&mut sc, &admin, &s2, "9999", "0", "Paid", "2024-09-01");
    salary(&mut sc, &admin, &t1, "25000", "0", "Paid", "2024-08-31");
    salary(&mut sc, &admin, &t1, "0", "25000.75", "Pending", "2024-09-30");

    let student = sc.login("student", "mohan@school.test", "stud123");
    let dash = ok(&sc.call_as(&student, "student.dashboard", json!({})));
    assert_eq!(dash["totalPaid"], json!("1500.00"));
    assert_eq!(dash["totalDue"], json!("1500.00"));
    assert_eq!(dash["recentPayments"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(dash["student"]["classLabel"], json!("Class 1 - A"));
    let history = ok(&sc.call_as(&student, "student.payments", json!({})));
    assert_eq!(history["payments"].as_array().map(|a| a.len()), Some(3));

    let teacher = sc.login("teacher", "om@school.test", "teach123");
    let dash = ok(&sc.call_as(&teacher, "teacher.dashboard", json!({})));
    assert_eq!(dash["totalReceived"], json!("25000.00"));
    assert_eq!(dash["pendingSalary"], json!("25000.75"));
    assert_eq!(dash["students"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(dash["recentPayments"][0]["status"], json!("Pending"));
}

#[test]
fn payment_filters_and_updates() {
    let mut sc = Sidecar::start();
    let admin = sc.admin();
    let s1 = sc.create_student(&admin, "Pooja", "pooja@school.test", None);
    let pid = fee(&mut sc, &admin, &s1, "0", "800", "Pending", "2024-08-01");
    fee(&mut sc, &admin, &s1, "800", "0", "Paid", "2024-07-01");

    let pending = ok(&sc.call_as(&admin, "fees.list", json!({ "status": "Pending" })));
    assert_eq!(pending["payments"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(pending["payments"][0]["studentId"], json!(s1));
    assert_eq!(pending["payments"][0]["paymentMode"], json!("UPI"));

    let updated = ok(&sc.call_as(
        &admin,
        "fees.update",
        json!({ "paymentId": pid, "patch": { "status": "Paid", "paidAmount": "800", "dueAmount": 0 } }),
    ));
    assert_eq!(updated["payment"]["status"], json!("Paid"));
    assert_eq!(updated["payment"]["paidAmount"], json!("800.00"));

    let resp = sc.call_as(
        &admin,
        "fees.update",
        json!({ "paymentId": pid, "patch": { "status": "Refunded" } }),
    );
    assert_eq!(error_code(&resp), "bad_params");
    let resp = sc.call_as(
        &admin,
        "fees.create",
        json!({ "studentId": "ghost", "paidAmount": 1, "paymentDate": "2024-01-01", "month": "Jan", "year": 2024 }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let dash = ok(&sc.call_as(&admin, "admin.dashboard", json!({})));
    assert_eq!(dash["totalRevenue"], json!("1600.00"));
    assert_eq!(dash["pendingFees"], json!(0));
}

#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub const ADMIN_EMAIL: &str = "admin@midpoint.com";
pub const ADMIN_PASSWORD: &str = "admin123";

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    pub workspace: tempfile::TempDir,
}

impl Sidecar {
    /// Spawn with no workspace selected.
    pub fn spawn_bare(args: &[&str]) -> Self {
        let exe = env!("CARGO_BIN_EXE_schoold");
        let mut child = Command::new(exe)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn schoold");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
            workspace: tempfile::tempdir().expect("workspace dir"),
        }
    }

    /// Spawn and select a fresh workspace.
    pub fn start() -> Self {
        Self::start_with(&[])
    }

    pub fn start_with(args: &[&str]) -> Self {
        let mut sc = Self::spawn_bare(args);
        let path = sc.workspace.path().to_string_lossy().to_string();
        let resp = sc.call("workspace.select", json!({ "path": path }));
        ok(&resp);
        sc
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    fn send(&mut self, method: &str, params: Value, session: Option<&str>) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let mut payload = json!({ "id": id, "method": method, "params": params });
        if let Some(token) = session {
            payload["session"] = json!(token);
        }
        let resp = self.send_line(&payload.to_string());
        assert_eq!(resp.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        resp
    }

    pub fn call(&mut self, method: &str, params: Value) -> Value {
        self.send(method, params, None)
    }

    pub fn call_as(&mut self, token: &str, method: &str, params: Value) -> Value {
        self.send(method, params, Some(token))
    }

    pub fn login(&mut self, role: &str, email: &str, password: &str) -> String {
        let resp = self.call(
            "auth.login",
            json!({ "role": role, "email": email, "password": password }),
        );
        ok(&resp)["token"].as_str().expect("token").to_string()
    }

    /// Seed defaults and log in as the default admin.
    pub fn admin(&mut self) -> String {
        ok(&self.call("setup.seedDefaults", json!({})));
        self.login("admin", ADMIN_EMAIL, ADMIN_PASSWORD)
    }

    pub fn class_id(&mut self, admin: &str, class_name: &str) -> String {
        let resp = self.call_as(admin, "classes.list", json!({}));
        ok(&resp)["classes"]
            .as_array()
            .expect("classes")
            .iter()
            .find(|c| c["className"] == class_name)
            .and_then(|c| c["id"].as_str())
            .expect("class present")
            .to_string()
    }

    pub fn subject_id(&mut self, token: &str, code: &str) -> String {
        let resp = self.call_as(token, "subjects.list", json!({}));
        ok(&resp)["subjects"]
            .as_array()
            .expect("subjects")
            .iter()
            .find(|s| s["subjectCode"] == code)
            .and_then(|s| s["id"].as_str())
            .expect("subject present")
            .to_string()
    }

    pub fn create_teacher(&mut self, admin: &str, name: &str, email: &str, class_id: Option<&str>) -> String {
        let resp = self.call_as(
            admin,
            "teachers.create",
            json!({
                "name": name,
                "email": email,
                "mobile": "9000000000",
                "joiningDate": "2020-06-01",
                "password": "teach123",
                "classId": class_id,
                "monthlySalary": "25000.00",
            }),
        );
        ok(&resp)["teacherId"].as_str().expect("teacherId").to_string()
    }

    pub fn create_student(&mut self, admin: &str, name: &str, email: &str, class_id: Option<&str>) -> String {
        let resp = self.call_as(
            admin,
            "students.create",
            json!({
                "name": name,
                "fatherName": "Father of ".to_string() + name,
                "mobile": "8000000000",
                "admissionDate": "2023-04-01",
                "email": email,
                "password": "stud123",
                "classId": class_id,
                "monthlyFee": 1500,
            }),
        );
        ok(&resp)["studentId"].as_str().expect("studentId").to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// The `result` of a successful response; panics with the error otherwise.
pub fn ok(resp: &Value) -> Value {
    assert_eq!(resp["ok"], json!(true), "expected ok response, got {}", resp);
    resp["result"].clone()
}

pub fn error_code(resp: &Value) -> &str {
    assert_eq!(resp["ok"], json!(false), "expected error response, got {}", resp);
    resp["error"]["code"].as_str().expect("error code")
}

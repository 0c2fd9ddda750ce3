mod auth;
mod backup;
mod db;
mod decimal;
mod grading;
mod ipc;
mod model;

use clap::{Parser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// School administration sidecar: JSON requests on stdin, one response per line on stdout.
#[derive(Debug, Parser)]
#[command(name = "schoold", version, about)]
struct Cli {
    /// Open this workspace directory at startup.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Seed the default admin, classes and subjects into the startup workspace.
    #[arg(long, requires = "workspace")]
    seed_defaults: bool,

    /// Session lifetime in seconds.
    #[arg(long, default_value_t = 86_400)]
    session_ttl_secs: u64,

    /// Log output format; falls back to SCHOOLD_LOG_FORMAT, then text.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

fn init_tracing(format: LogFormat) {
    // stdout carries the protocol, so logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "schoold=info".into());
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(false),
                )
                .init();
        }
    }
}

fn startup_workspace(state: &mut ipc::AppState, path: PathBuf, seed: bool) -> anyhow::Result<()> {
    ipc::open_workspace(state, path)?;
    if seed {
        if let Some(conn) = state.db.as_ref() {
            let summary = db::seed_defaults(conn, db::DEFAULT_ADMIN_EMAIL, db::DEFAULT_ADMIN_PASSWORD)?;
            tracing::info!(
                admin_created = summary.admin_created,
                classes_created = summary.classes_created,
                subjects_created = summary.subjects_created,
                "default data seeded"
            );
        }
    }
    Ok(())
}

fn write_line(stdout: &mut io::Stdout, value: &serde_json::Value) {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    let _ = writeln!(stdout, "{}", text);
    let _ = stdout.flush();
}

fn main() {
    let cli = Cli::parse();
    let format = cli.log_format.unwrap_or_else(|| {
        match std::env::var("SCHOOLD_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    });
    init_tracing(format);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        session_ttl_secs = cli.session_ttl_secs,
        "schoold starting"
    );

    let mut state = ipc::AppState::new(cli.session_ttl_secs);
    if let Some(path) = cli.workspace {
        if let Err(e) = startup_workspace(&mut state, path, cli.seed_defaults) {
            tracing::error!(error = %format!("{e:#}"), "startup workspace failed");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                write_line(&mut stdout, &ipc::bad_json(e.to_string()));
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
    }
    tracing::info!("stdin closed; exiting");
}

mod activity_config;
mod backup;
mod calc;
mod config;
mod content;
mod db;
mod error;
mod gradebook;
mod grades;
mod import;
mod ipc;
mod logging;
mod model;
mod notify;
mod remote;
mod roster;
mod session;
mod store;
mod sync;

use std::io::{self, BufRead, Write};
use tracing::{info, warn};

fn main() {
    let env_file = config::load_env_file();
    if let Err(e) = logging::init_logging() {
        eprintln!("simbiod: logging disabled: {e:#}");
    }
    let config = config::SimbioConfig::from_env();
    config::log_summary(&config, env_file.as_ref());

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    if let Some(path) = startup_workspace {
        if let Err(e) = state.open_workspace(path) {
            warn!(error = %e, "startup workspace unavailable");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    info!(version = env!("CARGO_PKG_VERSION"), "simbiod ready");

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
                // No id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed, exiting");
}

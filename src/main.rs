mod attendance;
mod bootstrap;
mod calc;
mod catalog;
mod config;
mod courses;
mod db;
mod enrollment;
mod error;
mod fees;
mod identity;
mod ipc;
mod logging;
mod notices;
mod reports;
mod submissions;
#[cfg(test)]
mod test_helper;

use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() {
    let config = config::Config::parse();
    logging::init_tracing(&config.log_level);

    let mut state = ipc::AppState::new(config.admin_seed());
    if let Some(path) = config.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(
                workspace = %path.display(),
                error = %format!("{e:#}"),
                "startup workspace open failed"
            );
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "campusd ready");

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
                // No id to answer with.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = ipc::err("", "bad_json", e.to_string(), false, None);
                let _ = writeln!(stdout, "{resp}");
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

    if state.db.take().is_some() {
        tracing::info!("workspace released at shutdown");
    }
}

use serde::Serialize;
use serde_json::json;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: &'static str,
    detail: String,
}

pub async fn run(json_output: bool) -> CommandResult {
    let mut checks = Vec::new();

    let config = match super::load_config() {
        Ok(config) => {
            checks.push(Check {
                name: "config",
                status: "ok",
                detail: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err(error) => {
            return CommandResult::failure("doctor", "config", error.to_string(), 2);
        }
    };

    // Memory path: the parent directory must be writable for persists.
    let memory_parent = config
        .memory
        .path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| parent.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    checks.push(match std::fs::metadata(&memory_parent) {
        Ok(metadata) if metadata.is_dir() => Check {
            name: "memory_path",
            status: "ok",
            detail: format!("`{}` exists", memory_parent.display()),
        },
        _ => Check {
            name: "memory_path",
            status: "warn",
            detail: format!("`{}` missing; it will be created on first persist", memory_parent.display()),
        },
    });

    // Sandbox interpreter must be spawnable.
    let interpreter_ok = tokio::process::Command::new(&config.sandbox.interpreter)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);
    checks.push(Check {
        name: "sandbox_interpreter",
        status: if interpreter_ok { "ok" } else { "error" },
        detail: if interpreter_ok {
            format!("`{}` is runnable", config.sandbox.interpreter)
        } else {
            format!("`{}` could not be spawned", config.sandbox.interpreter)
        },
    });

    checks.push(Check {
        name: "llm",
        status: if config.llm.base_url.is_some() { "ok" } else { "warn" },
        detail: match &config.llm.base_url {
            Some(url) => format!("generator endpoint configured: {url}"),
            None => "no generator endpoint; turns will use the deterministic fallback".to_string(),
        },
    });

    let failed = checks.iter().any(|check| check.status == "error");
    if json_output {
        let payload = json!({ "command": "doctor", "status": if failed { "error" } else { "ok" }, "checks": checks });
        let output = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
        return CommandResult { exit_code: u8::from(failed), output };
    }

    let mut lines = Vec::new();
    for check in &checks {
        lines.push(format!("[{}] {}: {}", check.status, check.name, check.detail));
    }
    CommandResult { exit_code: u8::from(failed), output: lines.join("\n") }
}

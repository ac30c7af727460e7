use serde_json::json;

use super::CommandResult;

pub async fn run(query: &str, json: bool) -> CommandResult {
    let config = match super::load_config() {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("ask", "config", error.to_string(), 2),
    };

    let runtime = super::compose_runtime(&config);
    let result = runtime.process_query(query).await;

    if json {
        let payload = serde_json::to_string_pretty(&result)
            .unwrap_or_else(|error| json!({ "error": error.to_string() }).to_string());
        return CommandResult::raw(payload);
    }

    let mut output = result.response.clone();
    if !result.reasoning.is_empty() {
        output.push_str("\n\n--- reasoning ---\n");
        output.push_str(&result.reasoning);
    }
    for (tool, execution) in &result.tool_results {
        output.push_str(&format!(
            "\n\n--- {tool} (exit {}) ---\n{}",
            execution.exit_code,
            if execution.succeeded { &execution.stdout } else { &execution.stderr }
        ));
    }
    CommandResult::raw(output)
}

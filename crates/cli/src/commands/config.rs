use serde_json::json;

use super::CommandResult;

pub fn run() -> CommandResult {
    let config = match super::load_config() {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("config", "config", error.to_string(), 2),
    };

    let payload = json!({
        "memory": {
            "path": config.memory.path,
            "retention": config.memory.retention,
            "lookup_limit": config.memory.lookup_limit,
        },
        "sandbox": {
            "interpreter": config.sandbox.interpreter,
            "timeout_secs": config.sandbox.timeout_secs,
        },
        "llm": {
            "provider": config.llm.provider,
            "api_key": config.llm.api_key.as_ref().map(|_| "<redacted>"),
            "base_url": config.llm.base_url,
            "model": config.llm.model,
            "max_tokens": config.llm.max_tokens,
            "temperature": config.llm.temperature,
            "timeout_secs": config.llm.timeout_secs,
        },
        "server": {
            "bind_address": config.server.bind_address,
            "port": config.server.port,
        },
        "logging": {
            "level": config.logging.level,
            "format": config.logging.format,
        },
    });

    CommandResult::raw(serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()))
}

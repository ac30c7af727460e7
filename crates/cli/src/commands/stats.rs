use super::CommandResult;

pub async fn run() -> CommandResult {
    let config = match super::load_config() {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("stats", "config", error.to_string(), 2),
    };

    let runtime = super::compose_runtime(&config);
    let stats = runtime.stats().await;

    match serde_json::to_string_pretty(&stats) {
        Ok(output) => CommandResult::raw(output),
        Err(error) => CommandResult::failure("stats", "serialization", error.to_string(), 1),
    }
}

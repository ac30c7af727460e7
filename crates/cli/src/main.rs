use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    sage_cli::run().await
}

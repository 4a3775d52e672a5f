//! fitrelay gateway - fair per-user access to a shared wearable API quota

use fitrelay_rs::server;
use fitrelay_rs::utils::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing(false);

    match server::builder::run_server().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Display (not Debug) keeps the message readable
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

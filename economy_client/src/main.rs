use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match economy_client::run_with_config().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "economy client stopped");
            ExitCode::FAILURE
        }
    }
}

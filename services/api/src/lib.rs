mod cli;
mod estimate;
mod infra;
mod routes;
mod server;

use dupa_estimator::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

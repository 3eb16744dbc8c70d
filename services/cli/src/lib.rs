mod cli;
mod commands;
mod infra;

use lodge_ledger::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}

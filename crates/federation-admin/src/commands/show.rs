use federation_core::TransactionId;
use federation_txlog::TransactionLog;

use super::Context;
use crate::error::{CliError, Result};

pub(crate) fn run(context: &Context, transaction_id: &str) -> Result<()> {
    let id: TransactionId = transaction_id.parse()?;
    let log = context.open_log()?;
    let record = log.load(id)?.ok_or(CliError::NotFound(id))?;

    let json = serde_json::to_string_pretty(&record).map_err(CliError::Render)?;
    println!("{json}");
    Ok(())
}

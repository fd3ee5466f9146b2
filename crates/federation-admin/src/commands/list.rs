use federation_core::TransactionState;
use federation_txlog::TransactionLog;

use super::Context;
use crate::error::Result;
use crate::output::print_records;

pub(crate) fn run(context: &Context, state: Option<TransactionState>) -> Result<()> {
    let log = context.open_log()?;
    let records = log.list(state)?;

    let empty = match state {
        Some(state) => format!("No {state} transactions."),
        None => "No transactions.".to_string(),
    };
    print_records(&records, &empty);
    Ok(())
}

pub(crate) fn run_incomplete(context: &Context) -> Result<()> {
    let log = context.open_log()?;
    let records = log.load_incomplete()?;

    print_records(&records, "No incomplete transactions.");
    Ok(())
}

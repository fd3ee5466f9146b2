use chrono::{TimeDelta, Utc};
use federation_txlog::TransactionLog;
use tracing::info;

use super::Context;
use crate::error::Result;

pub(crate) fn run(context: &Context, older_than_hours: u32) -> Result<()> {
    let log = context.open_log()?;
    let cutoff = Utc::now() - TimeDelta::hours(i64::from(older_than_hours));

    let purged = log.purge_terminal(cutoff)?;
    info!(purged, %cutoff, "purged finished transactions");

    if purged == 0 {
        println!("Nothing to purge.");
    } else {
        println!("Purged {purged} finished transaction(s) older than {older_than_hours}h.");
    }
    Ok(())
}

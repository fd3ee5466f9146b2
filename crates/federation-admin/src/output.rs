use federation_core::{StepStatus, TransactionRecord};

/// One line per record: id, state, step progress and last update.
pub(crate) fn record_line(record: &TransactionRecord) -> String {
    let succeeded = record
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Succeeded)
        .count();
    let mut line = format!(
        "{}  {:<12}  {}/{} steps  updated {}",
        record.transaction_id,
        record.state.to_string(),
        succeeded,
        record.steps.len(),
        record.updated_at.format("%Y-%m-%dT%H:%M:%SZ"),
    );
    if let Some(error) = &record.last_error {
        line.push_str("  error: ");
        line.push_str(error);
    }
    line
}

pub(crate) fn print_records(records: &[TransactionRecord], empty_message: &str) {
    if records.is_empty() {
        println!("{empty_message}");
        return;
    }

    for record in records {
        println!("{}", record_line(record));
    }
    println!();
    println!("{} transaction(s)", records.len());
}

#[cfg(test)]
mod tests {
    use federation_core::{StepOutcome, StoreRef, TransactionId, TransactionRecord, TransactionState};
    use federation_saga::testing::write_step;

    use super::record_line;

    fn record() -> TransactionRecord {
        TransactionRecord::new(
            TransactionId::new(),
            vec![
                write_step(0, StoreRef::subgraph("orders"), "Order", "o-1"),
                write_step(1, StoreRef::subgraph("users"), "User", "u-1"),
            ],
        )
    }

    #[test]
    fn line_shows_state_and_progress() {
        let mut record = record();
        record.steps[0] = StepOutcome::succeeded(0, serde_json::json!({}));

        let line = record_line(&record);

        assert!(line.starts_with(&record.transaction_id.to_string()));
        assert!(line.contains("PENDING"));
        assert!(line.contains("1/2 steps"));
        assert!(!line.contains("error:"));
    }

    #[test]
    fn line_includes_last_error() {
        let mut record = record();
        record.state = TransactionState::Failed;
        record.last_error = Some("compensation of step 0 exhausted".to_string());

        let line = record_line(&record);

        assert!(line.contains("FAILED"));
        assert!(line.ends_with("error: compensation of step 0 exhausted"));
    }
}

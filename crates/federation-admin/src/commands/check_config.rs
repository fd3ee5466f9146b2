use std::path::Path;

use federation_coordinator::CoordinatorConfig;

use crate::error::Result;

pub(crate) fn run(path: &Path) -> Result<()> {
    let config = CoordinatorConfig::load(path)?;

    println!("Configuration OK: {}", path.display());
    println!();
    println!(
        "  lock acquire timeout:   {:?}",
        config.locks().acquire_timeout()
    );
    println!(
        "  step timeout:           {:?}",
        config.executor().step_timeout()
    );
    let retry = config.executor().compensation_retry();
    println!(
        "  compensation retries:   {} ({:?}, {:?}..{:?})",
        retry.max_attempts(),
        retry.strategy(),
        retry.base_delay(),
        retry.max_delay()
    );
    println!(
        "  probe interval:         {:?}",
        config.partition().probe_interval()
    );
    println!(
        "  recovery interval:      {:?}",
        config.recovery().interval()
    );
    println!("  transaction log:        {}", config.log_path().display());
    Ok(())
}

//! Health probes for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::probe::HealthProbe;

/// A probe whose answer is flipped by the test.
#[derive(Debug)]
pub struct ToggleProbe {
    up: AtomicBool,
    hang: AtomicBool,
    pings: AtomicUsize,
}

impl ToggleProbe {
    #[must_use]
    pub fn up() -> Self {
        Self::with_state(true)
    }

    #[must_use]
    pub fn down() -> Self {
        Self::with_state(false)
    }

    fn with_state(up: bool) -> Self {
        Self {
            up: AtomicBool::new(up),
            hang: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    /// A hung probe never answers; the monitor's timeout has to cut it off.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    #[must_use]
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ToggleProbe {
    async fn ping(&self) -> Result<(), ProbeError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProbeError::Unreachable("toggled down".to_string()))
        }
    }
}

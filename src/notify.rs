//! Clinician notification hook for severe red flags.
//!
//! Ingestion fires a notification for every CRITICAL or HIGH flag after
//! the intake commits. Delivery is fire-and-forget: a failing notifier
//! must never fail the submission it rides on.

use crate::models::enums::FlagSeverity;
use crate::models::RedFlag;

pub trait Notifier: Send + Sync {
    fn notify(&self, flag: &RedFlag);
}

/// Whether a flag is severe enough to page a clinician about.
pub fn warrants_notification(flag: &RedFlag) -> bool {
    flag.severity >= FlagSeverity::High
}

/// Default notifier: a structured log line per severe flag. Real
/// deployments swap in a pager or messaging integration.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, flag: &RedFlag) {
        tracing::warn!(
            intake_id = %flag.intake_id,
            category = flag.category.as_str(),
            severity = flag.severity.as_str(),
            "Red flag requires clinician attention: {}",
            flag.description,
        );
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts notifications instead of delivering them.
    #[derive(Default)]
    pub(crate) struct CountingNotifier {
        pub count: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn notify(&self, _flag: &RedFlag) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

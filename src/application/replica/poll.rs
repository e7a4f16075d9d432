//! Long-poll reconciler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::Shared;
use crate::domain::Record;
use crate::infrastructure::config::RetryConfig;
use crate::infrastructure::{Backoff, ShutdownSignal};

/// Repeatedly ask the authority for changes after the local watermark.
///
/// The authority holds each request until data arrives or `poll_timeout`
/// elapses, so an idle symbol costs one request per timeout.
pub(super) async fn run<R: Record>(
    shared: Arc<Shared<R>>,
    poll_timeout: Duration,
    retry: RetryConfig,
    shutdown: ShutdownSignal,
) {
    let mut backoff = Backoff::new(&retry);
    loop {
        let (epoch, serial) = shared.position();
        let poll = shared
            .authority
            .diff_since(&shared.symbol, epoch, serial + 1, poll_timeout);
        let result = tokio::select! {
            () = shutdown.wait() => break,
            result = poll => result,
        };

        match result {
            Ok(diff) => {
                backoff.reset();
                let records = diff.records.len();
                let max_serial = diff.max_serial;
                if shared.apply_diff(diff) {
                    trace!(symbol = %shared.symbol, records, serial = max_serial, "Applied diff");
                }
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    kind = %R::KIND,
                    symbol = %shared.symbol,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Long poll failed, backing off"
                );
                tokio::select! {
                    () = shutdown.wait() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    debug!(kind = %R::KIND, symbol = %shared.symbol, "Long-poll reconciler stopped");
}

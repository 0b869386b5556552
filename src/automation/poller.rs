use super::operation::{OperationMessage, OperationTicket, OperationUpdate};
use crate::api::{ApiError, AutomationBackend, AutomationStatus};
use crate::shared::ids::CaseId;
use crate::shared::logging::{LogLevel, LogSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// Sleeps in short slices so a cancelled poller wakes promptly. Returns
/// `false` when `stop` was raised.
pub(crate) fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(STOP_CHECK_INTERVAL);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}

pub struct Poller {
    backend: Arc<dyn AutomationBackend>,
    ticket: OperationTicket,
    interval: Duration,
    log: LogSink,
}

impl Poller {
    pub fn new(
        backend: Arc<dyn AutomationBackend>,
        ticket: OperationTicket,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            ticket,
            interval,
            log: LogSink::disabled(),
        }
    }

    pub fn with_log(mut self, log: LogSink) -> Self {
        self.log = log;
        self
    }

    /// Polls immediately, then once per interval, until cancelled, the
    /// receiver hangs up, or the backend reports a settled run.
    pub fn run(&self, updates: &Sender<OperationUpdate>) {
        let case_id = self.ticket.case_id.as_str();
        loop {
            if self.ticket.cancel.is_cancelled() {
                return;
            }
            let fetched = self.backend.automation_status(&self.ticket.case_id);
            if self.ticket.cancel.is_cancelled() {
                self.log.append(
                    LogLevel::Debug,
                    "poll.discarded",
                    Some(case_id),
                    "status arrived after cancellation",
                );
                return;
            }

            match fetched {
                Ok(status) => {
                    let settled = status.is_settled();
                    let update = self.ticket.update(OperationMessage::Status(status));
                    if updates.send(update).is_err() {
                        return;
                    }
                    if settled {
                        let _ = updates.send(self.ticket.update(OperationMessage::Ended));
                        return;
                    }
                }
                Err(err) => {
                    self.log.warn("poll.failed", Some(case_id), &err.to_string());
                }
            }

            if !sleep_with_stop(self.ticket.cancel.flag(), self.interval) {
                return;
            }
        }
    }
}

pub fn poll_once(
    backend: &dyn AutomationBackend,
    case_id: &CaseId,
) -> Result<AutomationStatus, ApiError> {
    backend.automation_status(case_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_with_stop_returns_early_when_raised() {
        let stop = AtomicBool::new(true);
        let started = Instant::now();
        assert!(!sleep_with_stop(&stop, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_with_stop_completes_when_not_raised() {
        let stop = AtomicBool::new(false);
        assert!(sleep_with_stop(&stop, Duration::from_millis(10)));
    }
}

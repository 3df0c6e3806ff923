//! Background connection check.
//!
//! Each check runs on its own worker thread so the UI keeps painting. The UI polls
//! for the outcome once per frame.

use std::sync::mpsc::{self, TryRecvError};
use std::thread;

use crate::error::{AppError, Result};
use crate::influx::{self, ConnectionError};
use crate::panels::DatabaseConfig;

/// Outcome of one check.
pub type CheckResult = std::result::Result<(), ConnectionError>;

/// At most one in-flight connection check.
///
/// Dropping a running check detaches the worker: it finishes its requests (bounded
/// by the configured timeout) and its result is discarded.
#[derive(Default)]
pub struct ConnectionCheck {
    rx: Option<mpsc::Receiver<CheckResult>>,
}

impl ConnectionCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a worker is running and its result has not been collected.
    pub fn is_running(&self) -> bool {
        self.rx.is_some()
    }

    /// Check `config` against the server.
    pub fn start(&mut self, config: DatabaseConfig) -> Result<()> {
        self.start_with(move || run_check(&config))
    }

    /// Run `probe` on a worker thread. Fails with `AlreadyRunning` if a check is
    /// in flight.
    pub fn start_with<F>(&mut self, probe: F) -> Result<()>
    where
        F: FnOnce() -> CheckResult + Send + 'static,
    {
        if self.is_running() {
            return Err(AppError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("connection-check".to_string())
            .spawn(move || {
                let result = probe();
                let _ = tx.send(result);
            })?;

        self.rx = Some(rx);
        Ok(())
    }

    /// Collect the outcome. `None` while the check is still running or when no
    /// check was started.
    pub fn poll(&mut self) -> Option<CheckResult> {
        let rx = self.rx.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(ConnectionError::Transport(
                "Connection check stopped unexpectedly".to_string(),
            )),
        };
        self.rx = None;
        Some(result)
    }
}

fn run_check(config: &DatabaseConfig) -> CheckResult {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;

    rt.block_on(influx::check_connection(config))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_for(check: &mut ConnectionCheck) -> CheckResult {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = check.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "connection check did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_second_start_is_rejected() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut check = ConnectionCheck::new();

        check
            .start_with(move || {
                let _ = release_rx.recv();
                Ok(())
            })
            .unwrap();
        assert!(check.is_running());
        assert_eq!(check.poll(), None);

        let second = check.start_with(|| Err(ConnectionError::InvalidToken));
        assert!(matches!(second, Err(AppError::AlreadyRunning)));

        release_tx.send(()).unwrap();
        assert_eq!(wait_for(&mut check), Ok(()));
        assert!(!check.is_running());
    }

    #[test]
    fn test_failure_is_reported_once() {
        let mut check = ConnectionCheck::new();
        check.start_with(|| Err(ConnectionError::InvalidToken)).unwrap();

        assert_eq!(wait_for(&mut check), Err(ConnectionError::InvalidToken));
        assert_eq!(check.poll(), None);
    }

    #[test]
    fn test_panicking_worker_is_reported() {
        let mut check = ConnectionCheck::new();
        check.start_with(|| panic!("boom")).unwrap();

        assert!(matches!(wait_for(&mut check), Err(ConnectionError::Transport(_))));
    }

    #[test]
    fn test_unknown_host() {
        let config = DatabaseConfig {
            url: "http://host.invalid:8086".to_string(),
            timeout: 5,
            ..DatabaseConfig::default()
        };
        let mut check = ConnectionCheck::new();
        check.start(config).unwrap();

        let deadline = Instant::now() + Duration::from_secs(30);
        let result = loop {
            if let Some(result) = check.poll() {
                break result;
            }
            assert!(Instant::now() < deadline, "connection check did not finish");
            thread::sleep(Duration::from_millis(20));
        };
        assert_eq!(
            result,
            Err(ConnectionError::UnknownHost("http://host.invalid:8086".to_string()))
        );
    }
}

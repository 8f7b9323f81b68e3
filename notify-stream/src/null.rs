//! Stub Notifier implementation

#![allow(unused_variables)]

use crate::{Config, Error, Event, Notifier, Op, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Stub `Notifier` implementation
///
/// Accepts every registration and never reports events. Reads wait for the configured poll
/// timeout so a dispatch loop driven by it idles instead of spinning.
#[derive(Debug)]
pub struct NullNotifier {
    poll_timeout: Duration,
    closed: AtomicBool,
}

impl NullNotifier {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::closed());
        }
        Ok(())
    }
}

impl Notifier for NullNotifier {
    fn new(config: Config) -> Result<Self> {
        Ok(NullNotifier {
            poll_timeout: config.poll_timeout(),
            closed: AtomicBool::new(false),
        })
    }

    fn add_watch(&self, path: &Path, flags: Op) -> Result<()> {
        self.ensure_open()
    }

    fn add_watch_recursive(&self, path: &Path, flags: Op) -> Result<()> {
        self.ensure_open()
    }

    fn remove_watch(&self, path: &Path) -> Result<()> {
        self.ensure_open()
    }

    fn read(&self) -> Result<Vec<Event>> {
        self.ensure_open()?;
        thread::sleep(self.poll_timeout);
        Ok(Vec::new())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::closed());
        }
        Ok(())
    }

    fn kind() -> crate::NotifierKind {
        crate::NotifierKind::NullNotifier
    }
}

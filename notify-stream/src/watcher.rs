//! The consumer-facing handle tying a [`Notifier`] to a dispatch loop.

use crate::dispatch::DispatchLoop;
use crate::{
    update_paths, Config, Error, Event, Notifier, NotifierKind, Op, PathOp, Result,
    UpdatePathsError,
};
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Watches paths and streams what happens to them
///
/// Every watcher owns one dispatch thread. Events arrive on [`Watcher::events`] in the order
/// the kernel reported them; asynchronous failures arrive on [`Watcher::errors`].
///
/// ```rust
/// # use notify_stream::{Config, NullNotifier, Op, PathOp, Watcher};
/// # fn main() -> notify_stream::Result<()> {
/// let watcher = Watcher::new::<NullNotifier>(Config::default())?;
/// watcher.update_paths(vec![PathOp::watch_recursive("/tmp")])?;
/// watcher.close()?;
///
/// // the events queue ends once the watcher is closed
/// assert!(watcher.events().recv().is_err());
/// # Ok(())
/// # }
/// ```
pub struct Watcher {
    notifier: Arc<dyn Notifier>,
    kind: NotifierKind,
    events: Receiver<Event>,
    errors: Receiver<Error>,
    done: Mutex<Option<Sender<()>>>,
}

impl Watcher {
    /// Create a new watcher around a freshly created notifier of type `N`.
    pub fn new<N: Notifier>(config: Config) -> Result<Self> {
        Self::from_notifier(N::new(config)?, config)
    }

    /// Create a new watcher around an existing notifier and start its dispatch thread.
    pub fn from_notifier<N: Notifier>(notifier: N, config: Config) -> Result<Self> {
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);
        let (dispatch, queues) =
            DispatchLoop::new(notifier.clone(), config.max_events(), config.poll_timeout());
        if let Err(err) = dispatch.run() {
            let _ = notifier.close();
            return Err(Error::io(err));
        }

        Ok(Watcher {
            notifier,
            kind: N::kind(),
            events: queues.events,
            errors: queues.errors,
            done: Mutex::new(Some(queues.done)),
        })
    }

    /// Begin watching a path for the given operations. An empty set watches every operation.
    pub fn add_watch(&self, path: &Path, flags: Op) -> Result<()> {
        self.notifier.add_watch(path, flags)
    }

    /// Begin watching a path and every directory currently below it.
    pub fn add_watch_recursive(&self, path: &Path, flags: Op) -> Result<()> {
        self.notifier.add_watch_recursive(path, flags)
    }

    /// Stop watching a path. Does nothing if the path is not watched.
    pub fn remove_watch(&self, path: &Path) -> Result<()> {
        self.notifier.remove_watch(path)
    }

    /// Add/remove paths to watch in batch.
    ///
    /// Operations are applied in order. On the first failure the remaining operations are
    /// handed back in the error so they can be retried.
    ///
    /// # Examples
    ///
    /// ```
    /// # use notify_stream::{Config, NullNotifier, PathOp, Watcher};
    /// # use std::path::PathBuf;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let many_paths_to_add: Vec<PathBuf> = vec![];
    /// # let many_paths_to_remove: Vec<PathBuf> = vec![];
    /// let watcher = Watcher::new::<NullNotifier>(Config::default())?;
    /// let mut batch = Vec::new();
    ///
    /// for path in many_paths_to_add {
    ///     batch.push(PathOp::watch_recursive(path));
    /// }
    ///
    /// for path in many_paths_to_remove {
    ///     batch.push(PathOp::unwatch(path));
    /// }
    ///
    /// watcher.update_paths(batch)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn update_paths(&self, ops: Vec<PathOp>) -> std::result::Result<(), UpdatePathsError> {
        update_paths(ops, |op| match op {
            PathOp::Watch(path, config) if config.recursive_mode().is_recursive() => {
                self.add_watch_recursive(&path, config.flags())
            }
            PathOp::Watch(path, config) => self.add_watch(&path, config.flags()),
            PathOp::Unwatch(path) => self.remove_watch(&path),
        })
    }

    /// Events in kernel order. The queue ends once the watcher is closed.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Errors raised while reading, such as a kernel queue overflow.
    pub fn errors(&self) -> &Receiver<Error> {
        &self.errors
    }

    /// Stop the dispatch thread and release the notifier.
    ///
    /// Does not wait for the dispatch thread to exit; the events queue ends once it has. Events
    /// read but not yet received are discarded. Calling this twice fails with
    /// [`ErrorKind::Closed`](crate::ErrorKind::Closed).
    pub fn close(&self) -> Result<()> {
        let done = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(Error::closed)?;

        // disconnecting is the shutdown signal, a send would only race the drop
        drop(done);
        self.notifier.close()
    }

    /// Returns the kind of notifier backing this watcher
    pub fn kind(&self) -> NotifierKind {
        self.kind
    }

    fn is_closed(&self) -> bool {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.close();
        }
    }
}

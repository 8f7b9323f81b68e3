//! Configuration types

use notify_stream_types::event::Op;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Default soft bound on buffered, undelivered events.
///
/// The notifier's read buffer is also sized to hold at least this many minimal event records.
pub const MAX_EVENTS: usize = 4096;

/// Indicates whether only the provided directory or its sub-directories as well should be watched
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum RecursiveMode {
    /// Watch every directory below the provided one as well, as it exists at registration time
    Recursive,

    /// Watch only the provided directory
    NonRecursive,
}

impl RecursiveMode {
    pub(crate) fn is_recursive(&self) -> bool {
        match *self {
            RecursiveMode::Recursive => true,
            RecursiveMode::NonRecursive => false,
        }
    }
}

/// Watcher configuration
///
/// ```rust
/// # use std::time::Duration;
/// # use notify_stream::Config;
/// let config = Config::default()
///     .with_max_events(1024)
///     .with_poll_timeout(Duration::from_millis(50));
/// ```
///
/// All options have to be set when creating the watcher.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Config {
    /// See [Config::with_max_events]
    max_events: usize,

    /// See [Config::with_poll_timeout]
    poll_timeout: Duration,

    follow_symlinks: bool,
}

impl Config {
    /// Soft bound on events read from the kernel but not yet received by the consumer.
    ///
    /// Once more events than this are buffered, the watcher stops reading from the kernel until
    /// the consumer catches up. The notifier's read buffer holds at least this many minimal
    /// records.
    ///
    /// Defaults to [`MAX_EVENTS`].
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    /// Returns current setting
    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// Longest time a single read waits for the kernel to report readiness.
    ///
    /// This bounds how long the dispatch loop takes to notice a shutdown request when nothing
    /// happens on the watched paths. Closing the watcher also wakes a waiting read directly.
    ///
    /// The default is 100 milliseconds.
    pub fn with_poll_timeout(mut self, dur: Duration) -> Self {
        self.poll_timeout = dur;
        self
    }

    /// Returns current setting
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Determine if symbolic links to directories should be followed when recursively watching
    /// a directory.
    ///
    /// Off by default.
    pub fn with_follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }

    /// Returns current setting
    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_events: MAX_EVENTS,
            poll_timeout: Duration::from_millis(100),
            follow_symlinks: false,
        }
    }
}

/// Single watch configuration
#[derive(Debug)]
pub struct WatchPathConfig {
    recursive_mode: RecursiveMode,
    flags: Op,
}

impl WatchPathConfig {
    /// Creates new instance with provided [`RecursiveMode`], watching all events
    pub fn new(recursive_mode: RecursiveMode) -> Self {
        Self {
            recursive_mode,
            flags: Op::ALL_EVENTS,
        }
    }

    /// Set [`RecursiveMode`] for the watch
    pub fn with_recursive_mode(mut self, recursive_mode: RecursiveMode) -> Self {
        self.recursive_mode = recursive_mode;
        self
    }

    /// Set the operations to watch for. An empty set means all of them.
    pub fn with_flags(mut self, flags: Op) -> Self {
        self.flags = flags;
        self
    }

    /// Returns current setting
    pub fn recursive_mode(&self) -> RecursiveMode {
        self.recursive_mode
    }

    /// Returns current setting
    pub fn flags(&self) -> Op {
        self.flags
    }
}

/// An operation to apply to a watcher
///
/// See [`Watcher::update_paths`](crate::Watcher::update_paths) for more information
#[derive(Debug)]
pub enum PathOp {
    /// Path should be watched
    Watch(PathBuf, WatchPathConfig),

    /// Path should be unwatched
    Unwatch(PathBuf),
}

impl PathOp {
    /// Watch the path with [`RecursiveMode::Recursive`]
    pub fn watch_recursive<P: Into<PathBuf>>(path: P) -> Self {
        Self::Watch(path.into(), WatchPathConfig::new(RecursiveMode::Recursive))
    }

    /// Watch the path with [`RecursiveMode::NonRecursive`]
    pub fn watch_non_recursive<P: Into<PathBuf>>(path: P) -> Self {
        Self::Watch(
            path.into(),
            WatchPathConfig::new(RecursiveMode::NonRecursive),
        )
    }

    /// Unwatch the path
    pub fn unwatch<P: Into<PathBuf>>(path: P) -> Self {
        Self::Unwatch(path.into())
    }

    /// Returns the path associated with this operation.
    pub fn as_path(&self) -> &Path {
        match self {
            PathOp::Watch(p, _) => p,
            PathOp::Unwatch(p) => p,
        }
    }

    /// Returns the path associated with this operation.
    pub fn into_path(self) -> PathBuf {
        match self {
            PathOp::Watch(p, _) => p,
            PathOp::Unwatch(p) => p,
        }
    }
}

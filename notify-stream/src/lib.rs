//! Streaming file system notifications for Linux
//!
//! # Installation
//!
//! ```toml
//! [dependencies]
//! notify-stream = "0.1.0"
//! ```
//!
//! ## Features
//!
//! - `serde` for serialization of events
//!
//! # Overview
//!
//! A [`Watcher`] registers paths with a [`Notifier`] (the kernel facility, inotify on Linux) and
//! runs a dispatch thread that reads kernel records, decodes them into [`Event`]s and hands them
//! to the consumer through two queues:
//!
//! - [`Watcher::events`] yields events in kernel order and ends once the watcher is closed;
//! - [`Watcher::errors`] yields asynchronous errors such as [`ErrorKind::EventOverflow`].
//!
//! Events read but not yet received are buffered. Once more than
//! [`Config::with_max_events`] of them are waiting, the watcher stops reading from the kernel
//! until the consumer catches up. Events are never dropped by the watcher itself; the kernel
//! queue overflowing is reported on the errors queue.
//!
//! # Known Problems
//!
//! ### Linux: No space left on device
//!
//! This may be the case of running into the max-files watched limits of your user or system.
//! (Files also includes folders.) Note that for recursive watched folders each folder inside
//! counts towards the limit. It surfaces as [`ErrorKind::MaxFilesWatch`].
//!
//! You may increase this limit in linux via
//! ```sh
//! sudo sysctl fs.inotify.max_user_watches=524288 # example number
//! sudo sysctl -p
//! ```
//!
//! ### Recursive watches are a snapshot
//!
//! [`Watcher::add_watch_recursive`] registers the directories that exist when it is called.
//! Directories created later are not picked up automatically; watch them as their `CREATE`
//! events arrive if needed.
//!
//! # Examples
//!
//! ```rust
//! use notify_stream::{Op, Result};
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//! #     #[cfg(any(target_os = "linux", target_os = "android"))]
//! #     {
//!     let watcher = notify_stream::recommended_watcher()?;
//!
//!     // Watch the current directory for every kind of operation.
//!     watcher.add_watch(Path::new("."), Op::empty())?;
//! #     #[cfg(any())]
//! #     { // don't run this in doctests, it blocks forever
//!     for event in watcher.events() {
//!         println!("event: {:?}", event);
//!     }
//! #     }
//!
//!     // Stops the dispatch thread and releases the kernel resources.
//!     watcher.close()?;
//! #     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

pub use config::{Config, PathOp, RecursiveMode, WatchPathConfig, MAX_EVENTS};
pub use error::{Error, ErrorKind, Result, UpdatePathsError};
pub use notify_stream_types::event::{self, Event, Op};
use std::path::Path;
pub use watcher::Watcher;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use crate::inotify::InotifyNotifier;
pub use null::NullNotifier;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod inotify;
pub mod null;

mod config;
mod dispatch;
mod error;
mod watcher;


/// Notifier kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NotifierKind {
    /// inotify backend (linux)
    Inotify,
    /// Fake notifier for testing
    NullNotifier,
}

/// A kernel facility that watches paths and reports what happens to them
///
/// Implementations are shared between the caller's threads and the dispatch thread, so every
/// operation takes `&self`.
pub trait Notifier: Send + Sync + 'static {
    /// Create a new notifier with an initial Config.
    fn new(config: Config) -> Result<Self>
    where
        Self: Sized;

    /// Begin watching a path for the given operations. An empty set watches every operation.
    ///
    /// Registering a path again replaces its flags.
    fn add_watch(&self, path: &Path, flags: Op) -> Result<()>;

    /// Begin watching a path and every directory below it, as the tree exists right now.
    ///
    /// On a file this is the same as [`Notifier::add_watch`].
    fn add_watch_recursive(&self, path: &Path, flags: Op) -> Result<()>;

    /// Stop watching a path.
    ///
    /// Removing a path that is not watched is not an error.
    fn remove_watch(&self, path: &Path) -> Result<()>;

    /// Read the next batch of events.
    ///
    /// Waits a bounded time for the kernel to report something, so an empty batch is a normal
    /// outcome.
    fn read(&self) -> Result<Vec<Event>>;

    /// Release every watch and the kernel resources. Later calls fail with
    /// [`ErrorKind::Closed`].
    fn close(&self) -> Result<()>;

    /// Returns the notifier kind, allowing to perform backend-specific tasks
    fn kind() -> NotifierKind
    where
        Self: Sized;
}

/// The recommended [`Notifier`] implementation for the current platform
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type RecommendedNotifier = InotifyNotifier;

/// Convenience method for creating a [`Watcher`] backed by the [`RecommendedNotifier`] for the
/// current platform.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn recommended_watcher() -> Result<Watcher> {
    Watcher::new::<RecommendedNotifier>(Config::default())
}

pub(crate) fn update_paths<F>(
    ops: Vec<PathOp>,
    mut apply: F,
) -> std::result::Result<(), UpdatePathsError>
where
    F: FnMut(PathOp) -> Result<()>,
{
    let mut iter = ops.into_iter();
    while let Some(op) = iter.next() {
        if let Err(source) = apply(op) {
            return Err(UpdatePathsError {
                source,
                remaining: iter.collect(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::{
        update_paths, Config, Error, ErrorKind, Event, Notifier, NotifierKind, NullNotifier, Op,
        PathOp, RecursiveMode, UpdatePathsError, Watcher, WatchPathConfig,
    };

    #[test]
    fn test_object_safe() {
        let notifier = NullNotifier::new(Config::default()).unwrap();
        let _notifier: &dyn Notifier = &notifier;
    }

    #[test]
    fn test_debug_impl() {
        macro_rules! assert_debug_impl {
            ($t:ty) => {{
                #[allow(dead_code)]
                trait NeedsDebug: std::fmt::Debug {}
                impl NeedsDebug for $t {}
            }};
        }

        assert_debug_impl!(Config);
        assert_debug_impl!(Error);
        assert_debug_impl!(ErrorKind);
        assert_debug_impl!(Event);
        assert_debug_impl!(NotifierKind);
        assert_debug_impl!(NullNotifier);
        assert_debug_impl!(Op);
        assert_debug_impl!(PathOp);
        assert_debug_impl!(RecursiveMode);
        assert_debug_impl!(UpdatePathsError);
        assert_debug_impl!(Watcher);
        assert_debug_impl!(WatchPathConfig);
        #[cfg(any(target_os = "linux", target_os = "android"))]
        assert_debug_impl!(super::RecommendedNotifier);
    }

    #[test]
    fn update_paths_stops_at_first_failure() {
        let ops = vec![
            PathOp::watch_recursive("/a"),
            PathOp::watch_non_recursive("/missing"),
            PathOp::unwatch("/b"),
        ];
        let mut applied = Vec::new();

        let err = update_paths(ops, |op| {
            let path = op.into_path();
            if path.ends_with("missing") {
                return Err(Error::path_not_found().add_path(path));
            }
            applied.push(path);
            Ok(())
        })
        .unwrap_err();

        assert_eq!(applied, vec![PathBuf::from("/a")]);
        assert!(matches!(err.source.kind, ErrorKind::PathNotFound));
        let remaining: Vec<_> = err.remaining.into_iter().map(PathOp::into_path).collect();
        assert_eq!(remaining, vec![PathBuf::from("/b")]);
    }

    #[test]
    fn update_paths_applies_everything_in_order() {
        let mut applied = Vec::new();
        update_paths(
            vec![PathOp::unwatch("/x"), PathOp::watch_recursive("/y")],
            |op| {
                applied.push(op.into_path());
                Ok(())
            },
        )
        .expect("no failure");
        assert_eq!(applied, vec![PathBuf::from("/x"), PathBuf::from("/y")]);
    }

    #[test]
    fn empty_flags_mean_all_events() {
        assert_eq!(Op::empty().or_all(), Op::ALL_EVENTS);
    }
}

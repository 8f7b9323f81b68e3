//! Error types

use crate::PathOp;
use std::error::Error as StdError;
use std::path::PathBuf;
use std::result::Result as StdResult;
use std::{fmt, io};

/// Type alias to use this library's `Error` type in a Result
pub type Result<T> = StdResult<T, Error>;

/// Error kinds
#[derive(Debug)]
pub enum ErrorKind {
    /// Generic error
    ///
    /// May be used in cases where a platform specific error is mapped to this type, or for opaque
    /// internal errors.
    Generic(String),

    /// I/O errors.
    Io(io::Error),

    /// A path does not exist.
    PathNotFound,

    /// The kernel refused the requested watch flags.
    InvalidFlags,

    /// Can't watch (more) files, limit on the total number of inotify watches reached
    MaxFilesWatch,

    /// The kernel event queue overran before it was drained.
    ///
    /// An unknown number of events between the last one delivered and this error were lost, so
    /// any state derived from earlier events should be treated as stale.
    EventOverflow,

    /// The kernel returned fewer bytes than a single event record.
    ShortRead,

    /// A kernel event record was malformed or overran the read buffer.
    Decode(String),

    /// The watcher or notifier has been closed.
    Closed,
}

/// Notify-stream error type.
///
/// Errors are emitted either at creation time of a `Watcher`, during registration of paths, or
/// asynchronously on the errors queue while events are being read.
#[derive(Debug)]
pub struct Error {
    /// Kind of the error.
    pub kind: ErrorKind,

    /// Relevant paths to the error, if any.
    pub paths: Vec<PathBuf>,
}

impl Error {
    /// Adds a path to the error.
    pub fn add_path(mut self, path: PathBuf) -> Self {
        self.paths.push(path);
        self
    }

    /// Replaces the paths for the error.
    pub fn set_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    /// Sets the kind for the error.
    pub fn set_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Creates a new Error with empty paths given its kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            paths: Vec::new(),
        }
    }

    /// Creates a new generic Error from a message.
    pub fn generic(msg: &str) -> Self {
        Self::new(ErrorKind::Generic(msg.into()))
    }

    /// Creates a new i/o Error from a stdlib `io::Error`.
    pub fn io(err: io::Error) -> Self {
        Self::new(ErrorKind::Io(err))
    }

    /// Similar to [`Error::io`], but specific errors of a registration call are mapped to their
    /// own kinds.
    pub fn io_watch(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ENOENT) => Self::path_not_found(),
            Some(libc::ENOSPC) => Self::new(ErrorKind::MaxFilesWatch),
            Some(libc::EINVAL) => Self::new(ErrorKind::InvalidFlags),
            _ if err.kind() == io::ErrorKind::NotFound => Self::path_not_found(),
            _ => Self::io(err),
        }
    }

    /// Creates a new "path not found" error.
    pub fn path_not_found() -> Self {
        Self::new(ErrorKind::PathNotFound)
    }

    /// Creates a new "closed" error.
    pub fn closed() -> Self {
        Self::new(ErrorKind::Closed)
    }

    /// Creates a new decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode(msg.into()))
    }

    /// Whether the kernel queue overflowed and events were lost.
    pub fn is_overflow(&self) -> bool {
        matches!(self.kind, ErrorKind::EventOverflow)
    }

    /// Whether the operation failed because the watcher was already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::Closed)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let error = match self.kind {
            ErrorKind::PathNotFound => "No path was found.".into(),
            ErrorKind::InvalidFlags => "Invalid watch flags.".into(),
            ErrorKind::Generic(ref err) => err.clone(),
            ErrorKind::Io(ref err) => err.to_string(),
            ErrorKind::MaxFilesWatch => "OS file watch limit reached.".into(),
            ErrorKind::EventOverflow => "Event queue overflow, events were lost.".into(),
            ErrorKind::ShortRead => "Short read from the event queue.".into(),
            ErrorKind::Decode(ref err) => format!("Malformed event record: {err}"),
            ErrorKind::Closed => "Watcher is closed.".into(),
        };

        if self.paths.is_empty() {
            write!(f, "{error}")
        } else {
            write!(f, "{} about {:?}", error, self.paths)
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self.kind {
            ErrorKind::Io(ref cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let error = match err.into_io_error() {
            Some(err) => Error::io_watch(err),
            None => Error::generic("filesystem loop found while walking the tree"),
        };
        match path {
            Some(path) => error.add_path(path),
            None => error,
        }
    }
}

/// The error provided by [`crate::Watcher::update_paths`] method
#[derive(Debug)]
pub struct UpdatePathsError {
    /// The original error
    pub source: Error,
    /// The remaining path operations that haven't been applied
    pub remaining: Vec<PathOp>,
}

impl fmt::Display for UpdatePathsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to apply the batch operation: {}", self.source)
    }
}

impl StdError for UpdatePathsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl From<UpdatePathsError> for Error {
    fn from(value: UpdatePathsError) -> Self {
        value.source
    }
}

#[test]
fn display_formatted_errors() {
    let expected = "Some error";

    assert_eq!(expected, format!("{}", Error::generic(expected)));

    assert_eq!(
        expected,
        format!("{}", Error::io(io::Error::new(io::ErrorKind::Other, expected)))
    );

    assert_eq!(
        "No path was found. about [\"/some/path\"]",
        format!("{}", Error::path_not_found().add_path("/some/path".into()))
    );
}

#[test]
fn registration_errors_map_to_kinds() {
    let not_found = Error::io_watch(io::Error::from_raw_os_error(libc::ENOENT));
    assert!(matches!(not_found.kind, ErrorKind::PathNotFound));

    let limit = Error::io_watch(io::Error::from_raw_os_error(libc::ENOSPC));
    assert!(matches!(limit.kind, ErrorKind::MaxFilesWatch));

    let flags = Error::io_watch(io::Error::from_raw_os_error(libc::EINVAL));
    assert!(matches!(flags.kind, ErrorKind::InvalidFlags));

    let denied = Error::io_watch(io::Error::from_raw_os_error(libc::EACCES));
    assert!(matches!(denied.kind, ErrorKind::Io(_)));
}

#[test]
fn io_errors_expose_their_source() {
    let err = Error::io(io::Error::new(io::ErrorKind::Other, "boom"));
    assert!(err.source().is_some());
    assert!(Error::closed().source().is_none());
    assert!(Error::closed().is_closed());
    assert!(Error::new(ErrorKind::EventOverflow).is_overflow());
}

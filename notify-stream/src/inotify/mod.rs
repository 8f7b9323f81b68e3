//! Notifier implementation for the inotify Linux API
//!
//! The inotify API provides a mechanism for monitoring filesystem events. Inotify can be used to
//! monitor individual files, or to monitor directories. When a directory is monitored, inotify
//! will return events for the directory itself, and for files inside the directory.
//!
//! Recursive watches are built from one kernel watch per directory in the tree.

use super::event::*;
use super::{Config, Error, ErrorKind, Notifier, Result};
use std::env;
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, OwnedFd};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use walkdir::WalkDir;

mod record;
mod sys;
mod watches;

pub use sys::WatchDescriptor;

use record::{Records, HEADER_LEN, NAME_MAX};
use watches::WatchTable;

const INOTIFY: mio::Token = mio::Token(0);
const WAKE: mio::Token = mio::Token(1);

/// Notifier implementation based on inotify
///
/// The registration table is shared between the caller's thread (registration) and the
/// dispatch thread (self-delete cleanup while reading). It is only locked for the duration of a
/// table operation, never across a system call.
#[derive(Debug)]
pub struct InotifyNotifier {
    fd: RwLock<Option<OwnedFd>>,
    reader: Mutex<Reader>,
    waker: mio::Waker,
    watches: Mutex<WatchTable>,
    follow_links: bool,
}

// Readiness polling and the raw read buffer, only ever used by the reading thread.
#[derive(Debug)]
struct Reader {
    poll: mio::Poll,
    events: mio::Events,
    buffer: Box<[u8]>,
    timeout: Duration,
}

impl InotifyNotifier {
    fn from_config(config: Config) -> Result<Self> {
        let fd = sys::init().map_err(Error::io)?;

        let poll = mio::Poll::new()?;
        let waker = mio::Waker::new(poll.registry(), WAKE)?;
        let raw_fd = fd.as_raw_fd();
        poll.registry().register(
            &mut mio::unix::SourceFd(&raw_fd),
            INOTIFY,
            mio::Interest::READABLE,
        )?;

        // room for max_events minimal records, and never less than one record with the longest
        // possible name, or the kernel refuses the read with EINVAL
        let buffer_len = (HEADER_LEN * config.max_events()).max(HEADER_LEN + NAME_MAX + 1);

        Ok(InotifyNotifier {
            fd: RwLock::new(Some(fd)),
            reader: Mutex::new(Reader {
                poll,
                events: mio::Events::with_capacity(2),
                buffer: vec![0; buffer_len].into_boxed_slice(),
                timeout: config.poll_timeout(),
            }),
            waker,
            watches: Mutex::new(WatchTable::default()),
            follow_links: config.follow_symlinks(),
        })
    }

    fn table(&self) -> MutexGuard<'_, WatchTable> {
        // table operations never panic halfway, the data is intact
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_single_watch(&self, fd: &OwnedFd, path: PathBuf, flags: Op) -> Result<()> {
        log::trace!("adding inotify watch: {}", path.display());

        match sys::add_watch(fd.as_fd(), &path, flags.bits()) {
            Err(e) => Err(Error::io_watch(e).add_path(path)),
            Ok(wd) => {
                self.table().insert(path, wd);
                Ok(())
            }
        }
    }

    /// Decodes one raw read into events, keeping the table in sync with the kernel.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Event>> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::new(ErrorKind::ShortRead));
        }

        let mut events = Vec::new();

        for record in Records::new(bytes) {
            let record = record?;
            log::trace!("inotify event: {record:?}");

            if record.mask.contains(Op::Q_OVERFLOW) {
                return Err(Error::new(ErrorKind::EventOverflow));
            }

            let path = {
                let mut table = self.table();
                // the kernel drops the watch on its own after these, follow suit
                if record.mask.intersects(Op::DELETE_SELF | Op::IGNORED) {
                    table.remove_descriptor(record.wd)
                } else {
                    table.path(record.wd).cloned()
                }
            };

            let path = match path {
                Some(path) => path,
                None => {
                    log::debug!("inotify event with unknown descriptor: {record:?}");
                    continue;
                }
            };

            let path = match record.name {
                Some(name) => path.join(name),
                None => path,
            };

            events.push(Event::new(path, record.mask));
        }

        Ok(events)
    }

    fn read_raw(&self, fd: &OwnedFd, reader: &mut Reader) -> io::Result<usize> {
        match sys::read(fd.as_fd(), &mut reader.buffer) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            result => return result,
        }

        // The descriptor is registered edge-triggered: only wait once the queue is drained.
        let Reader {
            poll,
            events,
            timeout,
            ..
        } = &mut *reader;
        poll.poll(events, Some(*timeout))?;

        if !events.iter().any(|event| event.token() == INOTIFY) {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        sys::read(fd.as_fd(), &mut reader.buffer)
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.table().is_consistent()
    }

    #[cfg(test)]
    fn watched(&self, path: &Path) -> Option<WatchDescriptor> {
        self.table().descriptor(path)
    }
}

impl Notifier for InotifyNotifier {
    fn new(config: Config) -> Result<Self> {
        Self::from_config(config)
    }

    fn add_watch(&self, path: &Path, flags: Op) -> Result<()> {
        let path = normalize(path)?;
        let fd = self.fd.read().unwrap_or_else(PoisonError::into_inner);
        let fd = fd.as_ref().ok_or_else(Error::closed)?;
        self.add_single_watch(fd, path, flags.or_all())
    }

    fn add_watch_recursive(&self, path: &Path, flags: Op) -> Result<()> {
        let root = normalize(path)?;
        let flags = flags.or_all();
        let fd = self.fd.read().unwrap_or_else(PoisonError::into_inner);
        let fd = fd.as_ref().ok_or_else(Error::closed)?;

        self.add_single_watch(fd, root.clone(), flags)?;

        for entry in WalkDir::new(&root)
            .min_depth(1)
            .follow_links(self.follow_links)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(Error::from(err).set_paths(vec![root]));
                }
                Err(err) => {
                    log::debug!("skipping unreadable entry below {}: {err}", root.display());
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                self.add_single_watch(fd, entry.into_path(), flags)?;
            }
        }

        Ok(())
    }

    fn remove_watch(&self, path: &Path) -> Result<()> {
        let path = normalize(path)?;
        let fd = self.fd.read().unwrap_or_else(PoisonError::into_inner);
        let fd = fd.as_ref().ok_or_else(Error::closed)?;

        let wd = match self.table().descriptor(&path) {
            Some(wd) => wd,
            None => return Ok(()),
        };

        log::trace!("removing inotify watch: {}", path.display());
        remove_kernel_watch(fd, wd).map_err(|e| Error::io(e).add_path(path.clone()))?;
        self.table().remove(&path, wd);
        Ok(())
    }

    fn read(&self) -> Result<Vec<Event>> {
        let fd = self.fd.read().unwrap_or_else(PoisonError::into_inner);
        let fd = fd.as_ref().ok_or_else(Error::closed)?;
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);

        let n = match self.read_raw(fd, &mut reader) {
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::io(e)),
        };

        self.decode(&reader.buffer[..n])
    }

    fn close(&self) -> Result<()> {
        // let a reader blocked on readiness give up the descriptor
        let _ = self.waker.wake();

        let fd = self
            .fd
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(Error::closed)?;

        let watches = self.table().drain();
        let removed = watches.into_iter().try_for_each(|(path, wd)| {
            log::trace!("removing inotify watch: {}", path.display());
            remove_kernel_watch(&fd, wd).map_err(|e| Error::io(e).add_path(path))
        });
        let closed = sys::close(fd).map_err(Error::io);

        removed.and(closed)
    }

    fn kind() -> crate::NotifierKind {
        crate::NotifierKind::Inotify
    }
}

/// Asks the kernel to drop a watch. EINVAL means the kernel dropped it already.
fn remove_kernel_watch(fd: &OwnedFd, wd: WatchDescriptor) -> io::Result<()> {
    match sys::rm_watch(fd.as_fd(), wd) {
        Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
            log::debug!("{wd:?} was already removed by the kernel");
            Ok(())
        }
        result => result,
    }
}

/// Makes `path` absolute and lexically cleans it, without touching the filesystem.
fn normalize(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_owned()
    } else {
        env::current_dir().map_err(Error::io)?.join(path)
    };

    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other.as_os_str()),
        }
    }
    Ok(clean)
}

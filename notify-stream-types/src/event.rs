//! The `Event` type and the `Op` flag set.

use std::path::{Path, PathBuf};

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// A set of filesystem operations.
    ///
    /// The bit values are those of the Linux inotify ABI, so an `Op` can be handed to the kernel
    /// as a watch mask unchanged, and the mask of every kernel record is echoed back as-is on the
    /// resulting [`Event`]. Bits this type does not name are retained rather than dropped.
    ///
    /// An empty `Op` passed at registration time means [`Op::ALL_EVENTS`].
    ///
    /// ```
    /// use notify_stream_types::event::Op;
    ///
    /// let op = Op::CREATE | Op::ISDIR;
    /// assert!(op.contains(Op::CREATE));
    /// assert!(!op.intersects(Op::DELETE | Op::DELETE_SELF));
    /// ```
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct Op: u32 {
        /// File was accessed.
        ///
        /// When monitoring a directory, the event may occur both for the directory itself and
        /// the files within.
        const ACCESS = 0x0000_0001;

        /// File was modified.
        ///
        /// When monitoring a directory, the event may occur *only* for the files within, not the
        /// directory itself.
        const MODIFY = 0x0000_0002;

        /// Metadata has changed: permissions, timestamps, extended attributes, link count or
        /// ownership.
        const ATTRIB = 0x0000_0004;

        /// File opened for writing was closed.
        const CLOSE_WRITE = 0x0000_0008;

        /// File not opened for writing was closed.
        const CLOSE_NOWRITE = 0x0000_0010;

        /// File was opened.
        const OPEN = 0x0000_0020;

        /// File or directory was moved away from a watched directory.
        const MOVED_FROM = 0x0000_0040;

        /// File or directory was moved into a watched directory.
        const MOVED_TO = 0x0000_0080;

        /// File or directory was created.
        ///
        /// This may also include hard links, symlinks, and UNIX sockets.
        const CREATE = 0x0000_0100;

        /// File or directory was deleted.
        const DELETE = 0x0000_0200;

        /// Watched file or directory was deleted.
        ///
        /// This may also occur if the object is moved to another filesystem, since `mv` in effect
        /// copies the file to the other filesystem and then deletes it from the original. The
        /// kernel drops the watch afterwards and an [`Op::IGNORED`] record follows.
        const DELETE_SELF = 0x0000_0400;

        /// Watched file or directory was moved.
        const MOVE_SELF = 0x0000_0800;

        /// Filesystem containing the watched object was unmounted.
        const UNMOUNT = 0x0000_2000;

        /// Kernel event queue overflowed.
        const Q_OVERFLOW = 0x0000_4000;

        /// Watch was removed, explicitly or because the kernel dropped it.
        const IGNORED = 0x0000_8000;

        /// Only watch the path if it is a directory.
        const ONLYDIR = 0x0100_0000;

        /// Don't dereference the path if it is a symlink.
        const DONT_FOLLOW = 0x0200_0000;

        /// Don't generate events for children after they have been unlinked from the watched
        /// directory.
        const EXCL_UNLINK = 0x0400_0000;

        /// Add to the mask of an existing watch instead of replacing it.
        const MASK_ADD = 0x2000_0000;

        /// Subject of this event is a directory.
        const ISDIR = 0x4000_0000;

        /// Listen for one event, then remove the watch.
        const ONESHOT = 0x8000_0000;

        /// File or directory was moved away or in.
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();

        /// File was closed.
        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();

        /// Every event the kernel can report for a watch.
        const ALL_EVENTS = Self::ACCESS.bits()
            | Self::MODIFY.bits()
            | Self::ATTRIB.bits()
            | Self::CLOSE_WRITE.bits()
            | Self::CLOSE_NOWRITE.bits()
            | Self::OPEN.bits()
            | Self::MOVED_FROM.bits()
            | Self::MOVED_TO.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::DELETE_SELF.bits()
            | Self::MOVE_SELF.bits();

        // kernel bits not named above are kept
        const _ = !0;
    }
}

impl Op {
    /// Something appeared: created, or moved into a watched directory.
    pub fn is_create(&self) -> bool {
        self.intersects(Op::CREATE | Op::MOVED_TO)
    }

    /// File content changed.
    pub fn is_write(&self) -> bool {
        self.intersects(Op::MODIFY | Op::CLOSE_WRITE)
    }

    /// Something was deleted, either a child or the watched object itself.
    pub fn is_remove(&self) -> bool {
        self.intersects(Op::DELETE | Op::DELETE_SELF)
    }

    /// Something was moved away, either a child or the watched object itself.
    pub fn is_rename(&self) -> bool {
        self.intersects(Op::MOVED_FROM | Op::MOVE_SELF)
    }

    /// Metadata changed.
    pub fn is_chmod(&self) -> bool {
        self.contains(Op::ATTRIB)
    }

    /// The subject is a directory.
    pub fn is_dir(&self) -> bool {
        self.contains(Op::ISDIR)
    }

    /// Returns `self`, or [`Op::ALL_EVENTS`] if `self` is empty.
    pub fn or_all(self) -> Op {
        if self.is_empty() {
            Op::ALL_EVENTS
        } else {
            self
        }
    }
}

impl Default for Op {
    fn default() -> Self {
        Op::empty()
    }
}

/// A single filesystem notification.
///
/// `path` is the watched path for events about the watched object itself, or the watched path
/// joined with the entry name for events about an entry inside a watched directory. `op` is the
/// set of operations the kernel reported for that record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Path the event is about.
    pub path: PathBuf,

    /// Operations that triggered the event.
    pub op: Op,
}

impl Event {
    /// Creates a new `Event`.
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Path the event is about.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Operations that triggered the event.
    pub fn op(&self) -> Op {
        self.op
    }

    /// See [`Op::is_create`].
    pub fn is_create(&self) -> bool {
        self.op.is_create()
    }

    /// See [`Op::is_write`].
    pub fn is_write(&self) -> bool {
        self.op.is_write()
    }

    /// See [`Op::is_remove`].
    pub fn is_remove(&self) -> bool {
        self.op.is_remove()
    }

    /// See [`Op::is_rename`].
    pub fn is_rename(&self) -> bool {
        self.op.is_rename()
    }

    /// See [`Op::is_chmod`].
    pub fn is_chmod(&self) -> bool {
        self.op.is_chmod()
    }

    /// See [`Op::is_dir`].
    pub fn is_dir(&self) -> bool {
        self.op.is_dir()
    }
}

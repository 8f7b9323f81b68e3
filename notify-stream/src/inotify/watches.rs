//! Bidirectional path <-> watch descriptor table.

use super::sys::WatchDescriptor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Both directions of the registration table.
///
/// A pair is always present in both maps or in neither.
#[derive(Debug, Default)]
pub(crate) struct WatchTable {
    watches: HashMap<PathBuf, WatchDescriptor>,
    paths: HashMap<WatchDescriptor, PathBuf>,
}

impl WatchTable {
    /// Records a successful registration.
    ///
    /// The kernel hands out one descriptor per inode, so registering a second path for the same
    /// object returns a descriptor another path already owns; the newest path takes it over.
    pub fn insert(&mut self, path: PathBuf, wd: WatchDescriptor) {
        if let Some(stale) = self.watches.insert(path.clone(), wd) {
            if stale != wd {
                log::debug!("{} now refers to {wd:?}, dropping {stale:?}", path.display());
                self.paths.remove(&stale);
            }
        }
        if let Some(previous) = self.paths.insert(wd, path.clone()) {
            if previous != path {
                log::debug!(
                    "{wd:?} moved from {} to {}",
                    previous.display(),
                    path.display()
                );
                self.watches.remove(&previous);
            }
        }
    }

    pub fn descriptor(&self, path: &Path) -> Option<WatchDescriptor> {
        self.watches.get(path).copied()
    }

    pub fn path(&self, wd: WatchDescriptor) -> Option<&PathBuf> {
        self.paths.get(&wd)
    }

    /// Removes `path` if it is still registered under `wd`.
    pub fn remove(&mut self, path: &Path, wd: WatchDescriptor) -> bool {
        if self.watches.get(path) != Some(&wd) {
            return false;
        }
        self.watches.remove(path);
        self.paths.remove(&wd);
        true
    }

    /// Removes the entry for a descriptor the kernel no longer knows about.
    pub fn remove_descriptor(&mut self, wd: WatchDescriptor) -> Option<PathBuf> {
        let path = self.paths.remove(&wd)?;
        self.watches.remove(&path);
        Some(path)
    }

    /// Takes every entry out of the table.
    pub fn drain(&mut self) -> Vec<(PathBuf, WatchDescriptor)> {
        self.paths.clear();
        self.watches.drain().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        self.watches.len() == self.paths.len()
            && self
                .watches
                .iter()
                .all(|(path, wd)| self.paths.get(wd) == Some(path))
    }
}

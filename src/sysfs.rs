//! Which modules the kernel currently has loaded.
//!
//! # Implementation
//!
//! This uses the sysfs interface, documented [here][1].
//! Only directory entries are looked at, module attributes are never read.
//!
//! The Linux kernel puts some built-in modules alongside dynamically loaded
//! ones, if they have parameters or a version.
//! A module is considered built-in if the `coresize` attribute does not
//! exist, and built-in modules are never reported as loaded.
//!
//! [1]: https://www.kernel.org/doc/Documentation/ABI/stable/sysfs-module
use std::{
    fs::{self, DirEntry},
    io,
    path::PathBuf,
};

use crate::util::SYSFS_PATH;

/// A sysfs mount
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Sysfs {
    /// sysfs at [`SYSFS_PATH`]
    pub fn new() -> Self {
        Self::with_root(SYSFS_PATH)
    }

    /// sysfs mounted at `root`
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Whether a dynamic module `name` is currently loaded.
    ///
    /// `-` and `_` are treated as equal, like `modprobe` does.
    ///
    /// # Errors
    ///
    /// - If sysfs can't be read
    pub fn is_loaded(&self, name: &str) -> io::Result<bool> {
        if name.is_empty() || name.contains(['/', '\0']) || name == "." || name == ".." {
            return Ok(false);
        }
        // `/sys/module` always uses `_` in paths
        let path = self.modules().join(name.replace('-', "_"));
        path.join("coresize").try_exists()
    }

    /// Names of all currently loaded dynamic modules, sorted.
    ///
    /// # Errors
    ///
    /// - If sysfs can't be read
    /// - [`io::ErrorKind::InvalidData`] if a module name isn't UTF-8
    pub fn loaded(&self) -> io::Result<Vec<String>> {
        let mut mods = Vec::new();
        for entry in fs::read_dir(self.modules())? {
            let entry: DirEntry = match entry {
                Ok(e) => e,
                // Unloaded while we were scanning
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            // Ignore built-in modules
            if !entry.path().join("coresize").try_exists()? {
                continue;
            }
            let name = entry.file_name().into_string().map_err(|n| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid UTF-8 in module name {:?}", n),
                )
            })?;
            mods.push(name);
        }
        mods.sort();
        Ok(mods)
    }

    fn modules(&self) -> PathBuf {
        self.root.join("module")
    }
}

/// Whether module `name` is currently loaded
///
/// See [`Sysfs::is_loaded`]
pub fn is_loaded(name: &str) -> io::Result<bool> {
    Sysfs::new().is_loaded(name)
}

/// Currently loaded dynamic modules
///
/// See [`Sysfs::loaded`]
pub fn loaded() -> io::Result<Vec<String>> {
    Sysfs::new().loaded()
}

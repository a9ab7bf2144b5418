//! Linux-specific extensions to std types
use std::{fs::File, io, path::Path};

use rustix::{
    fd::IntoFd,
    fs::{memfd_create, MemfdFlags},
};

/// Internal implementation details
mod imp {
    use super::*;

    pub trait FileExtSeal {}

    impl FileExtSeal for File {}
}

/// Impl for [`FileExt::create_memory`] and co.
fn create_memory_impl(path: &Path, flags: MemfdFlags) -> io::Result<File> {
    Ok(memfd_create(path, flags).map_err(io::Error::from)?.into_fd().into())
}

/// Extends [`File`] with linux-specific methods
///
/// This trait is sealed
pub trait FileExt: imp::FileExtSeal {
    /// Like [`File::create`], except the file exists only in memory.
    /// The file is opened for both reading and writing.
    ///
    /// # Implementation
    ///
    /// This uses `memfd_create(2)`.
    /// The `MFD_CLOEXEC` and `MFD_ALLOW_SEALING` flags are set.
    ///
    /// As the file exists only in memory, `path` doesn't matter
    /// and is only used as a debugging marker in `/proc/self/fd/`.
    /// The same name/path may exist multiple times.
    ///
    /// # Errors
    ///
    /// - If `path` is more than 249 bytes. This is a Linux Kernel limit.
    /// - If `path` has any internal null bytes.
    /// - The per process/system file limit is reached.
    /// - Insufficient memory.
    fn create_memory<P: AsRef<Path>>(path: P) -> io::Result<File> {
        create_memory_impl(
            path.as_ref(),
            MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING,
        )
    }
}

impl FileExt for File {}

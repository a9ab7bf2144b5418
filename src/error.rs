//! Error handling stuff
use displaydoc::Display;
use nix::errno::Errno;
use std::{ffi::NulError, io};
use thiserror::Error;

pub type Result<T, E = ModuleError> = std::result::Result<T, E>;

/// Error type for [`crate::module`]
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum ModuleError {
    /// Module parameters contained a nul byte
    Parameters(#[source] NulError),

    /// Module name contained a nul byte
    Name(#[source] NulError),

    /// IO Failed
    Io(#[from] io::Error),

    /// Kernel rejected the request
    Kernel(#[source] io::Error),

    /// Forced unloading requires `force_remove`
    ForceRequiresUnsafe,
}

impl ModuleError {
    /// The errno the kernel returned, if this is a [`ModuleError::Kernel`]
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Kernel(e) => e.raw_os_error().map(Errno::from_i32),
            _ => None,
        }
    }

    /// Whether the kernel was called and rejected the request.
    ///
    /// `false` means the input was malformed or local IO failed, and the
    /// kernel was never asked.
    pub fn is_kernel(&self) -> bool {
        matches!(self, Self::Kernel(_))
    }
}

impl From<Errno> for ModuleError {
    fn from(e: Errno) -> Self {
        Self::Kernel(io::Error::from_raw_os_error(e as i32))
    }
}

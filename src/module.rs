//! Loading and unloading Linux Kernel modules.
//!
//! Every operation here is exactly one request to the kernel, and the kernel
//! owns everything after that. Errors the kernel reports are returned as
//! [`ModuleError::Kernel`], untouched.
//!
//! Strings are handed to the kernel nul-terminated, so a nul byte inside one
//! is rejected up front as [`ModuleError::Parameters`] or
//! [`ModuleError::Name`], and the kernel is never called.
//!
//! # Examples
//!
//! ```rust,no_run
//! # fn main() -> linmod::error::Result<()> {
//! use std::fs::File;
//!
//! let f = File::open("dummy.ko")?;
//! linmod::load(&f, "numdummies=2")?;
//! linmod::remove("dummy")?;
//! # Ok(())
//! # }
//! ```
use std::{
    ffi::CString,
    fs::File,
    io::Write,
    os::unix::io::{AsFd, AsRawFd},
};

use log::debug;

use crate::{
    error::{ModuleError, Result},
    extensions::FileExt,
    sys::{Kernel, LoadFlags, System, UnloadFlags},
};

/// Loads modules into a [`Kernel`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Loader<K = System> {
    kernel: K,
}

// Constructors
impl Loader {
    /// Load into the running kernel
    pub fn system() -> Self {
        Self::new(System)
    }
}

impl<K: Kernel> Loader<K> {
    /// Load into `kernel`
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }
}

// Operations
impl<K: Kernel> Loader<K> {
    /// Load the module in `module`, with `params`.
    ///
    /// `params` is passed to the kernel as-is, see `init_module(2)` for its
    /// format.
    ///
    /// `module` is only borrowed, and is left open.
    ///
    /// # Errors
    ///
    /// - [`ModuleError::Parameters`] if `params` has a nul byte
    /// - [`ModuleError::Kernel`] if the kernel refuses, for example
    ///   - `EPERM`, missing `CAP_SYS_MODULE`
    ///   - `ENOEXEC`, not a module
    ///   - `EINVAL`/`ENOEXEC`, built for a different kernel
    ///   - `EEXIST`, already loaded
    ///
    /// # Implementation
    ///
    /// ## Linux
    ///
    /// This uses `finit_module(2)`, with no flags.
    pub fn load<F: AsFd>(&self, module: F, params: &str) -> Result<()> {
        self.finit(module, params, LoadFlags::empty())
    }

    /// Like [`Loader::load`], but passes `flags` to the kernel.
    ///
    /// # Safety
    ///
    /// [`LoadFlags::MODULE_INIT_IGNORE_MODVERSIONS`] and
    /// [`LoadFlags::MODULE_INIT_IGNORE_VERMAGIC`] skip the checks that the
    /// module was built for this kernel. A mismatched module can corrupt
    /// kernel memory, and the kernel taints itself.
    ///
    /// # Errors
    ///
    /// See [`Loader::load`]
    pub unsafe fn load_with<F: AsFd>(
        &self,
        module: F,
        params: &str,
        flags: LoadFlags,
    ) -> Result<()> {
        self.finit(module, params, flags)
    }

    /// Load the module `image`, which is already in memory, with `params`.
    ///
    /// The image must be uncompressed.
    ///
    /// # Errors
    ///
    /// See [`Loader::load`]
    ///
    /// # Implementation
    ///
    /// ## Linux
    ///
    /// This uses `init_module(2)`
    pub fn load_image(&self, image: &[u8], params: &str) -> Result<()> {
        let params = CString::new(params).map_err(ModuleError::Parameters)?;

        debug!("loading module image of {} bytes", image.len());
        self.kernel.init_module(image, &params).map_err(|e| {
            debug!("kernel refused module image: {}", e);
            ModuleError::from(e)
        })
    }

    /// Like [`Loader::load_image`], but passes `flags` to the kernel.
    ///
    /// # Safety
    ///
    /// See [`Loader::load_with`]
    ///
    /// # Errors
    ///
    /// - [`ModuleError::Io`] if the in-memory file couldn't be created
    /// - See [`Loader::load`]
    ///
    /// # Implementation
    ///
    /// ## Linux
    ///
    /// `init_module(2)` has no flags, so when `flags` isn't empty the image
    /// is copied to a `memfd` and loaded with `finit_module(2)`.
    pub unsafe fn load_image_with(
        &self,
        image: &[u8],
        params: &str,
        flags: LoadFlags,
    ) -> Result<()> {
        if flags.is_empty() {
            return self.load_image(image, params);
        }
        // Check before copying anything
        CString::new(params).map_err(ModuleError::Parameters)?;

        let mut file = File::create_memory("module image")?;
        file.write_all(image)?;

        debug!("loading module image of {} bytes via memfd", image.len());
        self.finit(&file, params, flags)
    }
}

// Private
impl<K: Kernel> Loader<K> {
    fn finit<F: AsFd>(&self, module: F, params: &str, flags: LoadFlags) -> Result<()> {
        let params = CString::new(params).map_err(ModuleError::Parameters)?;
        let fd = module.as_fd();

        debug!("loading module from fd {}", fd.as_raw_fd());
        self.kernel
            .finit_module(fd, &params, flags)
            .map_err(|e| {
                debug!("kernel refused module from fd {}: {}", fd.as_raw_fd(), e);
                ModuleError::from(e)
            })
    }
}

/// Unloads modules from a [`Kernel`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Remover<K = System> {
    kernel: K,
}

// Constructors
impl Remover {
    /// Unload from the running kernel
    pub fn system() -> Self {
        Self::new(System)
    }
}

impl<K: Kernel> Remover<K> {
    /// Unload from `kernel`
    pub fn new(kernel: K) -> Self {
        Self { kernel }
    }
}

// Operations
impl<K: Kernel> Remover<K> {
    /// Unload module `name`
    ///
    /// Will only succeed if nothing is using the module.
    ///
    /// # Errors
    ///
    /// - [`ModuleError::Name`] if `name` has a nul byte
    /// - [`ModuleError::Kernel`] if the kernel refuses, for example
    ///   - `ENOENT`, no such module is loaded
    ///   - `EBUSY`/`EWOULDBLOCK`, the module is in use, or can't be unloaded
    ///   - `EPERM`, missing `CAP_SYS_MODULE`
    ///
    /// # Implementation
    ///
    /// ## Linux
    ///
    /// This uses `delete_module(2)`, with no flags.
    pub fn remove(&self, name: &str) -> Result<()> {
        self.remove_with(name, UnloadFlags::empty())
    }

    /// Like [`Remover::remove`], but passes `flags` to the kernel.
    ///
    /// # Errors
    ///
    /// - [`ModuleError::ForceRequiresUnsafe`] if `flags` contains
    ///   [`UnloadFlags::O_TRUNC`]. See [`Remover::force_remove`]
    /// - See [`Remover::remove`]
    pub fn remove_with(&self, name: &str, flags: UnloadFlags) -> Result<()> {
        if flags.contains(UnloadFlags::O_TRUNC) {
            return Err(ModuleError::ForceRequiresUnsafe);
        }
        self.delete(name, flags)
    }

    /// Forcefully unload module `name`
    ///
    /// # Safety
    ///
    /// Force unloading is extremely dangerous, and will taint your kernel.
    ///
    /// It can cause modules to be unloaded while still in use, or unload
    /// modules not designed to be unloaded.
    /// It can cause serious system instability and memory errors.
    ///
    /// If the kernel was not built with `MODULE_FORCE_UNLOAD`, forcing is
    /// refused.
    ///
    /// # Errors
    ///
    /// See [`Remover::remove`]
    ///
    /// # Implementation
    ///
    /// ## Linux
    ///
    /// `O_NONBLOCK` and `O_TRUNC` are always specified
    pub unsafe fn force_remove(&self, name: &str) -> Result<()> {
        self.delete(name, UnloadFlags::O_NONBLOCK | UnloadFlags::O_TRUNC)
    }

    fn delete(&self, name: &str, flags: UnloadFlags) -> Result<()> {
        let c_name = CString::new(name).map_err(ModuleError::Name)?;

        debug!("unloading module {}", name);
        self.kernel.delete_module(&c_name, flags).map_err(|e| {
            debug!("kernel refused to unload {}: {}", name, e);
            ModuleError::from(e)
        })
    }
}

/// Load the module in `module` into the running kernel, with `params`.
///
/// See [`Loader::load`]
pub fn load<F: AsFd>(module: F, params: &str) -> Result<()> {
    Loader::system().load(module, params)
}

/// Load the module in `module` into the running kernel, with `params` and
/// `flags`.
///
/// # Safety
///
/// See [`Loader::load_with`]
pub unsafe fn load_with<F: AsFd>(module: F, params: &str, flags: LoadFlags) -> Result<()> {
    Loader::system().load_with(module, params, flags)
}

/// Load the in-memory module `image` into the running kernel.
///
/// See [`Loader::load_image`]
pub fn load_image(image: &[u8], params: &str) -> Result<()> {
    Loader::system().load_image(image, params)
}

/// Load the in-memory module `image` into the running kernel, with `flags`.
///
/// # Safety
///
/// See [`Loader::load_image_with`]
pub unsafe fn load_image_with(image: &[u8], params: &str, flags: LoadFlags) -> Result<()> {
    Loader::system().load_image_with(image, params, flags)
}

/// Unload module `name` from the running kernel.
///
/// See [`Remover::remove`]
pub fn remove(name: &str) -> Result<()> {
    Remover::system().remove(name)
}

/// See [`Remover::remove_with`]
pub fn remove_with(name: &str, flags: UnloadFlags) -> Result<()> {
    Remover::system().remove_with(name, flags)
}

/// Forcefully unload module `name` from the running kernel.
///
/// # Safety
///
/// See [`Remover::force_remove`]
pub unsafe fn force_remove(name: &str) -> Result<()> {
    Remover::system().force_remove(name)
}

//! Load and unload Linux kernel modules
//!
//! This is a thin layer over the kernel's own module system calls.
//! Nothing here resolves dependencies, reads module metadata, or retries,
//! and whatever the kernel says is returned as-is.
//!
//! # Examples
//!
//! ```rust,no_run
//! # fn main() -> linmod::error::Result<()> {
//! use std::fs::File;
//!
//! let f = File::open("/lib/modules/6.1.0/kernel/drivers/net/dummy.ko")?;
//! linmod::load(&f, "numdummies=1")?;
//! assert!(linmod::sysfs::is_loaded("dummy")?);
//!
//! linmod::remove("dummy")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Implementation details
//!
//! Kernel access goes through the [`sys::Kernel`] trait, so [`Loader`] and
//! [`Remover`] can be pointed at something other than the running kernel.
//!
//! Loaded modules are listed through `/sys`, so that requires sysfs.
#![doc(html_root_url = "https://docs.rs/linmod/0.1.0")]

pub mod error;
pub mod extensions;
pub mod module;
pub mod sys;
pub mod sysfs;
mod util;

pub use error::ModuleError;
pub use module::{
    force_remove,
    load,
    load_image,
    load_image_with,
    load_with,
    remove,
    remove_with,
    Loader,
    Remover,
};
pub use sys::{LoadFlags, UnloadFlags};
pub use util::SYSFS_PATH;

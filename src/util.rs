//! Utility functions

/// Where sysfs is mounted.
///
/// Linux expects `/sys`, but [`crate::sysfs::Sysfs::with_root`] can point
/// elsewhere for systems that move it.
pub const SYSFS_PATH: &str = "/sys";

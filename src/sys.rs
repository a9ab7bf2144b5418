//! The kernel module system calls
//!
//! Everything that actually talks to the kernel goes through [`Kernel`].
//! [`System`] is the real thing, backed by [`nix::kmod`].
use std::{
    ffi::CStr,
    os::unix::io::{AsRawFd, BorrowedFd},
};

use log::trace;
use nix::kmod::{delete_module, finit_module, init_module};

pub use nix::kmod::{DeleteModuleFlags as UnloadFlags, ModuleInitFlags as LoadFlags};

/// The kernel module system calls.
///
/// Implementations must issue exactly one kernel request per call and
/// report its result as-is.
pub trait Kernel {
    /// `finit_module(2)`
    ///
    /// `fd` is borrowed for the duration of the call, and never closed.
    fn finit_module(&self, fd: BorrowedFd<'_>, params: &CStr, flags: LoadFlags)
        -> nix::Result<()>;

    /// `init_module(2)`
    fn init_module(&self, image: &[u8], params: &CStr) -> nix::Result<()>;

    /// `delete_module(2)`
    fn delete_module(&self, name: &CStr, flags: UnloadFlags) -> nix::Result<()>;
}

impl<K: Kernel + ?Sized> Kernel for &K {
    fn finit_module(
        &self,
        fd: BorrowedFd<'_>,
        params: &CStr,
        flags: LoadFlags,
    ) -> nix::Result<()> {
        (**self).finit_module(fd, params, flags)
    }

    fn init_module(&self, image: &[u8], params: &CStr) -> nix::Result<()> {
        (**self).init_module(image, params)
    }

    fn delete_module(&self, name: &CStr, flags: UnloadFlags) -> nix::Result<()> {
        (**self).delete_module(name, flags)
    }
}

/// The running Linux kernel
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

impl Kernel for System {
    fn finit_module(
        &self,
        fd: BorrowedFd<'_>,
        params: &CStr,
        flags: LoadFlags,
    ) -> nix::Result<()> {
        trace!("finit_module({}, {:?}, {:?})", fd.as_raw_fd(), params, flags);
        finit_module(&fd, params, flags)
    }

    fn init_module(&self, image: &[u8], params: &CStr) -> nix::Result<()> {
        trace!("init_module(<{} bytes>, {:?})", image.len(), params);
        init_module(image, params)
    }

    fn delete_module(&self, name: &CStr, flags: UnloadFlags) -> nix::Result<()> {
        trace!("delete_module({:?}, {:?})", name, flags);
        delete_module(name, flags)
    }
}

/// A pretend kernel for tests.
///
/// Keeps its own registry of loaded module names, and records every call.
#[cfg(test)]
pub(crate) mod fake {
    use std::{
        cell::{Cell, RefCell},
        collections::{BTreeSet, VecDeque},
        ffi::CString,
        fs::File,
        os::unix::{fs::FileExt, io::RawFd},
    };

    use nix::errno::Errno;

    use super::*;

    /// A single recorded system call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Finit {
            fd: RawFd,
            /// Everything in `fd`, read from the start like the kernel does
            contents: Vec<u8>,
            params: CString,
            flags: LoadFlags,
        },
        Init {
            image: Vec<u8>,
            params: CString,
        },
        Delete {
            name: CString,
            flags: UnloadFlags,
        },
    }

    #[derive(Debug)]
    pub struct FakeKernel {
        /// Whether the caller has `CAP_SYS_MODULE`
        privileged: Cell<bool>,

        /// Currently "loaded" modules
        loaded: RefCell<BTreeSet<String>>,

        /// Names the next successful loads will register as.
        ///
        /// Loading with nothing queued acts like a file that isn't a module.
        incoming: RefCell<VecDeque<String>>,

        /// Errors to return before anything else, in order
        failures: RefCell<VecDeque<Errno>>,

        calls: RefCell<Vec<Call>>,
    }

    impl FakeKernel {
        pub fn new() -> Self {
            Self {
                privileged: Cell::new(true),
                loaded: RefCell::default(),
                incoming: RefCell::default(),
                failures: RefCell::default(),
                calls: RefCell::default(),
            }
        }

        pub fn unprivileged() -> Self {
            let k = Self::new();
            k.privileged.set(false);
            k
        }

        /// The next successful load registers `name`
        pub fn expect_load(&self, name: &str) {
            self.incoming.borrow_mut().push_back(name.into());
        }

        /// Pretend `name` is already loaded
        pub fn preload(&self, name: &str) {
            self.loaded.borrow_mut().insert(name.into());
        }

        /// The next call fails with `e`
        pub fn fail_next(&self, e: Errno) {
            self.failures.borrow_mut().push_back(e);
        }

        pub fn is_loaded(&self, name: &str) -> bool {
            self.loaded.borrow().contains(name)
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn check(&self) -> nix::Result<()> {
            if let Some(e) = self.failures.borrow_mut().pop_front() {
                return Err(e);
            }
            if !self.privileged.get() {
                return Err(Errno::EPERM);
            }
            Ok(())
        }

        fn insert(&self) -> nix::Result<()> {
            self.check()?;
            let name = self
                .incoming
                .borrow_mut()
                .pop_front()
                .ok_or(Errno::ENOEXEC)?;
            if !self.loaded.borrow_mut().insert(name) {
                return Err(Errno::EEXIST);
            }
            Ok(())
        }
    }

    /// Read all of `fd` without moving its offset
    fn read_all(fd: BorrowedFd<'_>) -> nix::Result<Vec<u8>> {
        let file = File::from(fd.try_clone_to_owned().map_err(|_| Errno::EBADF)?);
        let len = file.metadata().map_err(|_| Errno::EBADF)?.len();
        let mut buf = vec![0; len as usize];
        file.read_exact_at(&mut buf, 0).map_err(|_| Errno::EIO)?;
        Ok(buf)
    }

    impl Kernel for FakeKernel {
        fn finit_module(
            &self,
            fd: BorrowedFd<'_>,
            params: &CStr,
            flags: LoadFlags,
        ) -> nix::Result<()> {
            let contents = read_all(fd)?;
            self.calls.borrow_mut().push(Call::Finit {
                fd: fd.as_raw_fd(),
                contents,
                params: params.into(),
                flags,
            });
            self.insert()
        }

        fn init_module(&self, image: &[u8], params: &CStr) -> nix::Result<()> {
            self.calls.borrow_mut().push(Call::Init {
                image: image.into(),
                params: params.into(),
            });
            self.insert()
        }

        fn delete_module(&self, name: &CStr, flags: UnloadFlags) -> nix::Result<()> {
            self.calls.borrow_mut().push(Call::Delete {
                name: name.into(),
                flags,
            });
            self.check()?;
            let name = name.to_str().map_err(|_| Errno::ENOENT)?;
            if !self.loaded.borrow_mut().remove(name) {
                return Err(Errno::ENOENT);
            }
            Ok(())
        }
    }
}

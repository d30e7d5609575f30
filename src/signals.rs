//! Thin wrappers over POSIX signal masks for the scan handshake.
//!
//! Signals are consumed synchronously with `sigwait`, never through
//! handlers. A set must be blocked in every thread before it is waited on,
//! so callers block it on the main thread before spawning anything.

use std::io;

pub use libc::{SIGCHLD, SIGINT, SIGTERM, SIGUSR1};

#[derive(Clone, Copy)]
pub struct SignalSet {
    set: libc::sigset_t,
}

impl std::fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSet").finish_non_exhaustive()
    }
}

fn check(rc: libc::c_int) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// pthread functions return the error number instead of setting errno.
fn check_pthread(rc: libc::c_int) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

impl SignalSet {
    pub fn new(signals: &[libc::c_int]) -> io::Result<Self> {
        // SAFETY: sigset_t is plain data; sigemptyset initializes it fully.
        let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
        check(unsafe { libc::sigemptyset(&mut set) })?;
        for &signal in signals {
            // SAFETY: `set` was initialized by sigemptyset above.
            check(unsafe { libc::sigaddset(&mut set, signal) })?;
        }
        Ok(Self { set })
    }

    /// Blocks the set for the calling thread and threads it spawns later.
    pub fn block(&self) -> io::Result<()> {
        // SAFETY: `self.set` is initialized; the old mask is not requested.
        check_pthread(unsafe {
            libc::pthread_sigmask(libc::SIG_BLOCK, &self.set, std::ptr::null_mut())
        })
    }

    pub fn unblock(&self) -> io::Result<()> {
        // SAFETY: as in `block`.
        check_pthread(unsafe {
            libc::pthread_sigmask(libc::SIG_UNBLOCK, &self.set, std::ptr::null_mut())
        })
    }

    /// Waits until one signal of the set is pending and consumes it.
    pub fn wait(&self) -> io::Result<libc::c_int> {
        let mut signal: libc::c_int = 0;
        // SAFETY: both pointers refer to live, initialized locals.
        check_pthread(unsafe { libc::sigwait(&self.set, &mut signal) })?;
        Ok(signal)
    }
}

/// Sends `signal` to process `pid`.
pub fn send(pid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    // SAFETY: kill has no memory-safety preconditions.
    check(unsafe { libc::kill(pid, signal) })
}

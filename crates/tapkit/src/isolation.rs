//! Fork-based crash isolation.
//!
//! A caller-supplied block runs in a forked child. The child proves it
//! survived by clearing a [`SharedDeathFlag`] after the block returns; any
//! other ending (signal, `exit`, `abort`, panic) leaves the flag armed. The
//! parent waits for the child and reads the flag. Only the flag decides
//! whether the child died: the raw wait status is reported for diagnostics.

use std::io;
use std::mem::size_of;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::TapError;

/// Flag value while the block has not been proven to return.
pub const UNRESOLVED: i32 = 1;
/// Flag value once the block returned normally.
pub const RESOLVED: i32 = 0;

/// Exit status of a child whose block panicked.
pub const PANIC_EXIT_STATUS: i32 = 101;

/// One integer shared between a parent and the child it forks.
///
/// Backed by an anonymous `MAP_SHARED` mapping, so writes made by the child
/// are visible to the parent once `waitpid` has returned. Each isolation
/// check maps its own flag; the mapping is released on drop.
#[derive(Debug)]
pub struct SharedDeathFlag {
    cell: NonNull<AtomicI32>,
}

#[allow(unsafe_code)]
impl SharedDeathFlag {
    /// Map a fresh flag, initially [`RESOLVED`].
    pub fn map() -> io::Result<Self> {
        // SAFETY: anonymous mapping with no address hint and no fd; the
        // kernel picks a page-aligned region that is zero-filled.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size_of::<AtomicI32>(),
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let cell = NonNull::new(addr.cast::<AtomicI32>())
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;
        let flag = Self { cell };
        flag.cell().store(RESOLVED, Ordering::SeqCst);
        Ok(flag)
    }

    fn cell(&self) -> &AtomicI32 {
        // SAFETY: `cell` points at a live, page-aligned mapping that outlives
        // `self`; AtomicI32 has the same layout as i32.
        unsafe { self.cell.as_ref() }
    }

    /// Set the flag to [`UNRESOLVED`] before forking.
    pub fn arm(&self) {
        self.cell().store(UNRESOLVED, Ordering::SeqCst);
    }

    /// Mark the block as having returned. Called by the child only.
    pub fn resolve(&self) {
        self.cell().store(RESOLVED, Ordering::SeqCst);
    }

    /// Reset the flag and report whether it was still armed.
    pub fn take_died(&self) -> bool {
        self.cell().swap(RESOLVED, Ordering::SeqCst) == UNRESOLVED
    }
}

#[allow(unsafe_code)]
impl Drop for SharedDeathFlag {
    fn drop(&mut self) {
        // SAFETY: the pointer and length are exactly what `map` obtained.
        unsafe {
            libc::munmap(self.cell.as_ptr().cast(), size_of::<AtomicI32>());
        }
    }
}

/// How the child process ended, as reported by `waitpid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    Signaled(i32),
    Other(i32),
}

impl ChildStatus {
    #[must_use]
    pub fn from_raw(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            Self::Exited(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            Self::Signaled(libc::WTERMSIG(status))
        } else {
            Self::Other(status)
        }
    }

    /// Shell-style code: exit status, or `128 + signal`.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(signal) => 128 + signal,
            Self::Other(raw) => raw,
        }
    }
}

/// Result of one isolated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Isolation {
    pub pid: libc::pid_t,
    pub died: bool,
    pub status: ChildStatus,
}

/// Run `block` in a forked child and report whether the child died.
///
/// `enter_child` runs first thing in the child, before standard output and
/// standard error are pointed at `/dev/null`. The child never returns from
/// this function: it always ends with `_exit`.
#[allow(unsafe_code)]
pub fn run_isolated<F, E>(block: &mut F, enter_child: E) -> Result<Isolation, TapError>
where
    F: FnMut(),
    E: FnOnce(),
{
    let flag = SharedDeathFlag::map().map_err(TapError::SharedMap)?;
    flag.arm();

    // SAFETY: the child only runs the caller's block and then `_exit`s; it
    // never returns into the caller's stack frames.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(TapError::Fork(io::Error::last_os_error()));
    }
    if pid == 0 {
        enter_child();
        silence_std_streams();
        let code = match catch_unwind(AssertUnwindSafe(|| block())) {
            Ok(()) => {
                flag.resolve();
                0
            }
            Err(_) => PANIC_EXIT_STATUS,
        };
        // SAFETY: `_exit` skips destructors and atexit handlers that belong
        // to the parent's copy of the process state.
        unsafe { libc::_exit(code) }
    }

    let status = wait_for(pid).map_err(TapError::Wait)?;
    Ok(Isolation {
        pid,
        died: flag.take_died(),
        status: ChildStatus::from_raw(status),
    })
}

/// Block until `pid` terminates, retrying on `EINTR`.
#[allow(unsafe_code)]
fn wait_for(pid: libc::pid_t) -> io::Result<libc::c_int> {
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `status` is a valid out-pointer for the duration of the call.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc >= 0 {
            return Ok(status);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Point fds 1 and 2 at `/dev/null`, or close them if that cannot be opened.
///
/// Writes from the block must not reach the TAP stream, but they must not
/// fail either, or `println!` in the block would panic and look like a crash.
#[allow(unsafe_code)]
fn silence_std_streams() {
    // SAFETY: plain fd syscalls on a NUL-terminated literal path.
    unsafe {
        let null = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if null < 0 {
            libc::close(libc::STDOUT_FILENO);
            libc::close(libc::STDERR_FILENO);
            return;
        }
        libc::dup2(null, libc::STDOUT_FILENO);
        libc::dup2(null, libc::STDERR_FILENO);
        if null > libc::STDERR_FILENO {
            libc::close(null);
        }
    }
}

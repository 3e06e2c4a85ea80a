//! Exclusive pass lock.
//!
//! The runtime may fire triggers from separate processes. Each convergence
//! pass holds an exclusive `flock` on a file in the state directory so passes
//! never interleave.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::StateError;

/// File-lock guard that releases the lock on drop.
#[derive(Debug)]
pub struct PassLock {
    file: File,
    path: PathBuf,
}

impl PassLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// Acquire an exclusive lock on `lock_path`, polling until `timeout_ms`.
pub fn acquire(lock_path: &Path, timeout_ms: u64) -> Result<PassLock, StateError> {
    let lock_err = |source| StateError::Lock {
        path: lock_path.to_path_buf(),
        source,
    };
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(lock_err)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(lock_err)?;

    let fd = file.as_raw_fd();
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);

    loop {
        let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if ret == 0 {
            return Ok(PassLock {
                file,
                path: lock_path.to_path_buf(),
            });
        }

        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::WouldBlock {
            return Err(lock_err(err));
        }

        if Instant::now() >= deadline {
            return Err(StateError::LockTimeout {
                path: lock_path.to_path_buf(),
                timeout_ms,
            });
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Warden.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Exclusive install lock
//!
//! Two updater instances racing on the same install directory can only
//! happen through operator error, but the outcome would be a shredded
//! install tree. The lock is held from before Backup until the process
//! exits. The lock file itself is on the preserve-list so the replace pass
//! never deletes it out from under the held descriptor.

use crate::error::{Result, UpdaterError};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

pub const LOCK_FILE: &str = ".warden.lock";

const LOCK_RETRIES: u32 = 5;

/// Lock guard that releases on drop
pub struct InstallLock {
    #[allow(dead_code)]
    file: File,
    fd: i32,
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.fd, libc::LOCK_UN);
        }
    }
}

/// Acquire the exclusive lock for an install directory, with backoff
pub fn acquire(install_dir: &Path) -> Result<InstallLock> {
    let path = install_dir.join(LOCK_FILE);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;

    let fd = file.as_raw_fd();

    for attempt in 0..=LOCK_RETRIES {
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

        if result == 0 {
            tracing::debug!("Install lock acquired at {}", path.display());
            return Ok(InstallLock { file, fd });
        }

        let err = std::io::Error::last_os_error();
        let would_block = err.raw_os_error() == Some(libc::EWOULDBLOCK)
            || err.raw_os_error() == Some(libc::EAGAIN);

        if !would_block {
            return Err(UpdaterError::Io(err));
        }

        if attempt < LOCK_RETRIES {
            // 50ms, 100ms, 200ms, 400ms, 800ms
            let wait_ms = 50u64 * (1 << attempt);
            std::thread::sleep(Duration::from_millis(wait_ms));
        }
    }

    Err(UpdaterError::LockHeld(format!(
        "{} still locked after {LOCK_RETRIES} retries",
        path.display()
    )))
}

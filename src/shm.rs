//! Anonymous POSIX shared memory for pixel buffers
//!
//! Regions are created under a random name with `O_EXCL`, unlinked right
//! away, and resized to the requested length. The returned descriptor is the
//! only handle to the memory; dropping it releases the region unless the
//! server still holds a pool built from it.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{AllocationFailure, ClientError};

/// Upper bound on name-collision retries
pub const MAX_NAME_ATTEMPTS: u32 = 100;

const NAME_SUFFIX_LEN: usize = 6;

/// Creates an unlinked shared-memory region of exactly `size` bytes
pub fn allocate(size: usize) -> Result<OwnedFd, ClientError> {
    let fd = create_unlinked().map_err(|reason| ClientError::Allocation { size, reason })?;

    // On failure `fd` is dropped here, closing the descriptor.
    resize(&fd, size).map_err(|reason| ClientError::Allocation { size, reason })?;

    debug!("Allocated {} byte shm region (fd {})", size, fd.as_raw_fd());
    Ok(fd)
}

fn create_unlinked() -> Result<OwnedFd, AllocationFailure> {
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = random_name();
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL | libc::O_CLOEXEC,
                0o600,
            )
        };

        if fd >= 0 {
            unsafe {
                libc::shm_unlink(name.as_ptr());
            }
            return Ok(unsafe { OwnedFd::from_raw_fd(fd) });
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EEXIST) {
            return Err(AllocationFailure::Open(err));
        }
        warn!("shm name {:?} already taken (attempt {})", name, attempt);
    }

    Err(AllocationFailure::NamesExhausted(MAX_NAME_ATTEMPTS))
}

fn resize(fd: &OwnedFd, size: usize) -> Result<(), AllocationFailure> {
    let len = libc::off_t::try_from(size).map_err(|_| {
        AllocationFailure::Resize(io::Error::new(
            io::ErrorKind::InvalidInput,
            "region length exceeds off_t",
        ))
    })?;

    loop {
        if unsafe { libc::ftruncate(fd.as_raw_fd(), len) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(AllocationFailure::Resize(err));
        }
    }
}

/// `/lattice-<pid>-XXXXXX`, unique per process and unlikely to collide across processes
fn random_name() -> CString {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_SUFFIX_LEN)
        .map(char::from)
        .collect();
    let name = format!("/lattice-{}-{}", std::process::id(), suffix);
    // Alphanumerics and a decimal pid never contain a NUL byte.
    CString::new(name).unwrap_or_default()
}

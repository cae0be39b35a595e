//! Pixel buffer production
//!
//! A [`PixelRegion`] is one frame's worth of XRGB8888 pixels in shared
//! memory, filled with a [`Pattern`] and unmapped before it is handed to the
//! server. The [`ledger`] tracks each buffer from filling through attach to
//! the server's release.

pub mod ledger;

pub use ledger::{BufferId, BufferLedger, BufferState, LedgerStats, ReleaseOutcome};

use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use log::debug;
use memmap2::{Mmap, MmapMut};
use serde::{Deserialize, Serialize};

use crate::error::{AllocationFailure, ClientError};
use crate::shm;

/// Bytes per XRGB8888 pixel
pub const BYTES_PER_PIXEL: u32 = 4;

/// Edge length of one checkerboard tile
pub const TILE_SIZE: u32 = 8;

/// Two-colour checkerboard fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub color_a: u32,
    pub color_b: u32,
}

impl Pattern {
    pub const fn checkerboard(color_a: u32, color_b: u32) -> Self {
        Self { color_a, color_b }
    }

    /// Colour of the pixel at `(x, y)`; rows shift by one tile every tile height
    pub fn color_at(&self, x: u32, y: u32) -> u32 {
        let period = TILE_SIZE * 2;
        let shifted = (x as u64 + (y / TILE_SIZE) as u64 * TILE_SIZE as u64) % period as u64;
        if shifted < TILE_SIZE as u64 {
            self.color_a
        } else {
            self.color_b
        }
    }

    fn fill(&self, dst: &mut [u8], width: u32) {
        let width = width as usize;
        for (index, pixel) in dst.chunks_exact_mut(BYTES_PER_PIXEL as usize).enumerate() {
            let x = (index % width) as u32;
            let y = (index / width) as u32;
            pixel.copy_from_slice(&self.color_at(x, y).to_le_bytes());
        }
    }
}

impl From<[u32; 2]> for Pattern {
    fn from(colors: [u32; 2]) -> Self {
        Self::checkerboard(colors[0], colors[1])
    }
}

/// A filled, unmapped shared-memory region ready to become a `wl_buffer`
#[derive(Debug)]
pub struct PixelRegion {
    fd: OwnedFd,
    width: u32,
    height: u32,
    stride: u32,
    len: usize,
}

impl PixelRegion {
    /// Allocates a `width * 4 * height` byte region and fills it with `pattern`
    ///
    /// The descriptor is owned by the returned region, so every error path
    /// closes it.
    pub fn draw(width: u32, height: u32, pattern: &Pattern) -> Result<Self, ClientError> {
        let (stride, len) = Self::geometry(width, height)?;
        let fd = shm::allocate(len)?;
        let file = File::from(fd);

        let mut map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|source| ClientError::Map { size: len, source })?;
        pattern.fill(&mut map[..], width);
        drop(map);

        debug!("Drew {}x{} region ({} bytes, stride {})", width, height, len, stride);

        Ok(Self {
            fd: OwnedFd::from(file),
            width,
            height,
            stride,
            len,
        })
    }

    /// Stride and total length for a buffer, rejecting empty or overflowing sizes
    pub fn geometry(width: u32, height: u32) -> Result<(u32, usize), ClientError> {
        let invalid = || ClientError::Allocation {
            size: 0,
            reason: AllocationFailure::Geometry { width, height },
        };
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        let stride = width.checked_mul(BYTES_PER_PIXEL).ok_or_else(invalid)?;
        let len = (stride as usize)
            .checked_mul(height as usize)
            .filter(|len| i32::try_from(*len).is_ok())
            .ok_or_else(invalid)?;
        Ok((stride, len))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads one pixel back through a fresh read-only mapping
    pub fn pixel(&self, x: u32, y: u32) -> std::io::Result<u32> {
        let file = File::from(self.fd.try_clone()?);
        let map = unsafe { Mmap::map(&file)? };
        let offset = (y * self.stride + x * BYTES_PER_PIXEL) as usize;
        let bytes: [u8; 4] = map
            .get(offset..offset + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::UnexpectedEof))?;
        Ok(u32::from_le_bytes(bytes))
    }
}

impl AsFd for PixelRegion {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

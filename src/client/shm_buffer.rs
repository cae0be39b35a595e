//! Wrapping drawn pixel regions as `wl_buffer` objects
//!
//! Each buffer gets its own single-use pool. The pool is destroyed right
//! after the buffer is carved out of it and the region's descriptor closes
//! when this function returns; the server keeps its own mapping alive until
//! the buffer is destroyed.

use std::os::fd::AsFd;

use log::debug;
use wayland_client::protocol::{wl_buffer::WlBuffer, wl_shm, wl_shm_pool::WlShmPool};
use wayland_client::{Dispatch, QueueHandle};

use crate::buffer::{BufferId, PixelRegion};
use crate::error::{AllocationFailure, ClientError};

/// Only pixel format this client produces
pub const FORMAT: wl_shm::Format = wl_shm::Format::Xrgb8888;

/// Hands `region` to the server as a buffer tagged with `id`
pub fn wrap<D>(
    shm: &wl_shm::WlShm,
    region: PixelRegion,
    id: BufferId,
    qh: &QueueHandle<D>,
) -> Result<WlBuffer, ClientError>
where
    D: Dispatch<WlShmPool, ()> + Dispatch<WlBuffer, BufferId> + 'static,
{
    let geometry_error = || ClientError::Allocation {
        size: region.len(),
        reason: AllocationFailure::Geometry {
            width: region.width(),
            height: region.height(),
        },
    };
    let pool_size = i32::try_from(region.len()).map_err(|_| geometry_error())?;
    let width = i32::try_from(region.width()).map_err(|_| geometry_error())?;
    let height = i32::try_from(region.height()).map_err(|_| geometry_error())?;
    let stride = i32::try_from(region.stride()).map_err(|_| geometry_error())?;

    let pool = shm.create_pool(region.as_fd(), pool_size, qh, ());
    let buffer = pool.create_buffer(0, width, height, stride, FORMAT, qh, id);
    pool.destroy();

    debug!("Buffer {} wrapped ({}x{}, stride {})", id, width, height, stride);
    Ok(buffer)
}

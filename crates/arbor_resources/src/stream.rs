//! Scoped stream mapping.
//!
//! [`StreamMap`] grants direct access to the raw bytes behind a resource stream.
//! It mutably borrows the resource manager, so a resource cannot be mapped twice
//! (or touched in any other way) until the map is dropped:
//!
//! ```compile_fail
//! # use arbor_resources::{ResElem, ResStream, ResourceManager};
//! # fn demo(mgr: &mut ResourceManager, geo: arbor_core::ResHandle) -> arbor_core::Result<()> {
//! let first = mgr.map_stream(geo, ResElem::Geometry, 0, ResStream::GeoVertPos, true, false)?;
//! let second = mgr.map_stream(geo, ResElem::Geometry, 0, ResStream::GeoIndex, true, false)?;
//! drop(first);
//! # drop(second);
//! # Ok(())
//! # }
//! ```
//!
//! Dropping the map unmaps the stream. Writes to vertex positions refresh the
//! geometry's bounding box at that point.

use bytemuck::Pod;

use crate::data::GeometryData;
use crate::params::ResStream;

pub(crate) enum MapTarget<'a> {
    Geometry {
        geo: &'a mut GeometryData,
        stream: ResStream,
    },
    Pixels(&'a mut [u8]),
}

/// A mapped resource stream. Unmapped when dropped.
pub struct StreamMap<'a> {
    target: MapTarget<'a>,
    writable: bool,
}

impl<'a> StreamMap<'a> {
    pub(crate) fn new(target: MapTarget<'a>, writable: bool) -> Self {
        Self { target, writable }
    }

    /// Raw bytes of the stream.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match &self.target {
            MapTarget::Geometry { geo, stream } => {
                let bytes: &[u8] = match stream {
                    ResStream::GeoIndex => bytemuck::cast_slice(geo.indices.as_slice()),
                    ResStream::GeoVertPos => bytemuck::cast_slice(geo.positions.as_slice()),
                    ResStream::GeoVertTan => bytemuck::cast_slice(geo.tangents.as_slice()),
                    ResStream::GeoVertStatic => bytemuck::cast_slice(geo.statics.as_slice()),
                    ResStream::ImgPixel => &[],
                };
                bytes
            }
            MapTarget::Pixels(pixels) => pixels,
        }
    }

    /// Mutable raw bytes, `None` unless mapped for writing.
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        if !self.writable {
            return None;
        }
        let bytes: &mut [u8] = match &mut self.target {
            MapTarget::Geometry { geo, stream } => match stream {
                ResStream::GeoIndex => bytemuck::cast_slice_mut(geo.indices.as_mut_slice()),
                ResStream::GeoVertPos => bytemuck::cast_slice_mut(geo.positions.as_mut_slice()),
                ResStream::GeoVertTan => bytemuck::cast_slice_mut(geo.tangents.as_mut_slice()),
                ResStream::GeoVertStatic => bytemuck::cast_slice_mut(geo.statics.as_mut_slice()),
                ResStream::ImgPixel => &mut [],
            },
            MapTarget::Pixels(pixels) => pixels,
        };
        Some(bytes)
    }

    /// The stream viewed as a slice of `T`. `None` if the size or alignment
    /// does not fit.
    #[must_use]
    pub fn cast<T: Pod>(&self) -> Option<&[T]> {
        bytemuck::try_cast_slice(self.bytes()).ok()
    }

    pub fn cast_mut<T: Pod>(&mut self) -> Option<&mut [T]> {
        bytemuck::try_cast_slice_mut(self.bytes_mut()?).ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl Drop for StreamMap<'_> {
    fn drop(&mut self) {
        if self.writable
            && let MapTarget::Geometry {
                geo,
                stream: ResStream::GeoVertPos,
            } = &mut self.target
        {
            geo.update_bbox();
        }
    }
}

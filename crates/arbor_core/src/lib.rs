//! Arbor Core
//!
//! Foundational types shared by every Arbor crate:
//!
//! - [`handle`]: typed integer handles and the [`HandleTable`] slot store
//! - [`errors`]: the [`ArborError`] type and [`Result`] alias
//! - [`messages`]: the diagnostic [`MessageQueue`]
//! - [`bounds`]: bounding boxes and ray/triangle intersection
//! - [`time`]: the engine [`Timer`]

pub mod bounds;
pub mod errors;
pub mod handle;
pub mod messages;
pub mod time;

pub use bounds::{BoundingBox, intersect_triangle};
pub use errors::{ArborError, Result};
pub use handle::{HandleTable, NodeHandle, RawHandle, ResHandle};
pub use messages::{LogLevel, Message, MessageQueue};
pub use time::Timer;

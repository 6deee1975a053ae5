//! Raster compositing core shared by the reimplemented renderers.
//!
//! A [`FrameCompositor`] owns a pending/committed pair of 16-bit planes and
//! a bounded dirty-rectangle list; decoded frame payloads (full or
//! incremental) land in the pending plane and flush to the committed plane
//! per dirty rect. [`scan_polygon`] and [`scan_polygon_shaded`] convert
//! polygons into horizontal spans for the sprite and highlight fills and
//! are independent of the compositor state.

pub mod compositor;
pub mod dirty;
pub mod error;
pub mod plane;
pub mod scan;

pub use compositor::{CompositorStats, DepthStats, FrameCompositor};
pub use dirty::{DirtyRect, DirtyRectList, MAX_DIRTY_RECTS};
pub use error::CompositeError;
pub use plane::PlanePair;
pub use scan::{scan_polygon, scan_polygon_shaded, ScanVertex};

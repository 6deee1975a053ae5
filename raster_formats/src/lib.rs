//! Wire formats for the raster compositor.
//!
//! A frame payload is a 16-byte header followed by either a length-prefixed
//! LZSS block (full frame) or a sparse patch stream (incremental frame).
//! Captured payload sequences travel in FCAP container files. This crate
//! keeps the byte-level formats in one place so producers and the engine
//! stay interoperable.

pub mod capture;
pub mod frame;
pub mod lzss;
pub mod patch;

pub use capture::{write_capture, CaptureFile};
pub use frame::{write_full_frame, write_patch_frame, FrameHeader, FRAME_HEADER_LEN};
pub use patch::{PatchReader, PatchRun, PatchWriter, SparseValues};

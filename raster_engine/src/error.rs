use thiserror::Error;

/// Expected decode failures surfaced to the render loop. Dimension
/// mismatches are configuration errors the caller must correct before
/// retrying; payload errors cover truncated or malformed frame data.
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("frame reports {got_width}x{got_height} but the surface is {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error(transparent)]
    Payload(#[from] anyhow::Error),
}

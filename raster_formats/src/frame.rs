use anyhow::{ensure, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::lzss;

/// Length of the fixed frame payload header in bytes.
pub const FRAME_HEADER_LEN: usize = 16;

/// Fixed header prefixing every frame payload: surface dimensions, a
/// full-vs-incremental flag, and a reserved word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    pub full_frame: bool,
}

impl FrameHeader {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        ensure!(
            payload.len() >= FRAME_HEADER_LEN,
            "frame payload shorter than header: {} bytes",
            payload.len()
        );
        let width = LittleEndian::read_u32(&payload[0..4]);
        let height = LittleEndian::read_u32(&payload[4..8]);
        let full_frame = LittleEndian::read_u32(&payload[8..12]) != 0;
        // payload[12..16] is reserved and ignored on read.
        ensure!(
            width > 0 && height > 0,
            "frame header reports zero width or height"
        );
        Ok(FrameHeader {
            width,
            height,
            full_frame,
        })
    }

    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut out = [0u8; FRAME_HEADER_LEN];
        LittleEndian::write_u32(&mut out[0..4], self.width);
        LittleEndian::write_u32(&mut out[4..8], self.height);
        LittleEndian::write_u32(&mut out[8..12], u32::from(self.full_frame));
        out
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Build a full-frame payload: header, then the pixel plane compressed with
/// the LZSS codec behind a `u32le` compressed-length prefix.
pub fn write_full_frame(width: u32, height: u32, pixels: &[u16]) -> Result<Vec<u8>> {
    ensure!(
        pixels.len() == width as usize * height as usize,
        "full frame expects {}x{} = {} pixels, got {}",
        width,
        height,
        width as usize * height as usize,
        pixels.len()
    );

    let mut raw = vec![0u8; pixels.len() * 2];
    LittleEndian::write_u16_into(pixels, &mut raw);
    let packed = lzss::compress(&raw);

    let header = FrameHeader {
        width,
        height,
        full_frame: true,
    };
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + 4 + packed.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
    out.extend_from_slice(&packed);
    Ok(out)
}

/// Build an incremental payload: header followed by an already-encoded
/// sparse patch stream (see [`crate::patch::PatchWriter`]).
pub fn write_patch_frame(width: u32, height: u32, patch: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        width,
        height,
        full_frame: false,
    };
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + patch.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(patch);
    out
}

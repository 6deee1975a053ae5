//! Frame decoding into the plane pair plus dirty-rect bookkeeping.

use anyhow::{ensure, Context, Result};
use log::{debug, trace};
use serde::Serialize;

use raster_formats::{lzss, FrameHeader, PatchReader, PatchRun, FRAME_HEADER_LEN};

use crate::dirty::{DirtyRect, DirtyRectList};
use crate::error::CompositeError;
use crate::plane::PlanePair;

/// Owns one surface's plane pair and dirty-rect list and translates frame
/// payloads into plane content. Single-threaded; one instance per surface,
/// driven from the render loop.
#[derive(Debug)]
pub struct FrameCompositor {
    planes: PlanePair,
    dirty: DirtyRectList,
    enabled: bool,
}

/// Snapshot of compositor state for telemetry and the replay tool.
#[derive(Debug, Serialize)]
pub struct CompositorStats {
    pub width: u32,
    pub height: u32,
    pub enabled: bool,
    pub dirty_rects: usize,
    pub depth: DepthStats,
}

/// Committed-plane value distribution.
#[derive(Debug, Serialize)]
pub struct DepthStats {
    pub min: u16,
    pub max: u16,
    pub zero_pixels: usize,
    pub nonzero_pixels: usize,
}

impl FrameCompositor {
    pub fn new(width: u32, height: u32) -> Self {
        FrameCompositor {
            planes: PlanePair::new(width, height),
            dirty: DirtyRectList::new(),
            enabled: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.planes.width()
    }

    pub fn height(&self) -> u32 {
        self.planes.height()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resume accepting frame payloads.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Pause compositing without discarding plane or dirty-rect state.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Committed-plane read for renderers.
    pub fn value_at(&self, x: u32, y: u32) -> u16 {
        self.planes.value_at(x, y)
    }

    pub fn planes(&self) -> &PlanePair {
        &self.planes
    }

    /// Mutable plane access for engines that write pending content
    /// directly; pair any such write with a [`FrameCompositor::mark`].
    pub fn planes_mut(&mut self) -> &mut PlanePair {
        &mut self.planes
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Decode one frame payload. Returns `Ok(false)` without touching the
    /// payload when the compositor is disabled. Dimension mismatches fail
    /// before any plane mutation and are safe to retry with a corrected
    /// payload; a truncation mid-stream is reported but may leave partial
    /// plane content behind.
    pub fn decode_frame(&mut self, payload: &[u8]) -> Result<bool, CompositeError> {
        if !self.enabled {
            return Ok(false);
        }

        let header = FrameHeader::parse(payload).map_err(CompositeError::Payload)?;
        if header.width != self.width() || header.height != self.height() {
            return Err(CompositeError::DimensionMismatch {
                width: self.width(),
                height: self.height(),
                got_width: header.width,
                got_height: header.height,
            });
        }

        let body = &payload[FRAME_HEADER_LEN..];
        if header.full_frame {
            self.decode_full(body)?;
        } else {
            self.decode_partial(body)?;
        }
        Ok(true)
    }

    /// Flush: pop each tracked rect and blit it pending-to-committed.
    pub fn clean(&mut self) {
        while let Some(rect) = self.dirty.pop_rect() {
            trace!("blit {rect:?}");
            self.planes.blit(&rect);
        }
    }

    /// Record a region whose pending content was mutated outside
    /// `decode_frame`. Returns `false` when the rect list is full; the
    /// caller should then fall back to marking the whole surface.
    pub fn mark(&mut self, rect: DirtyRect) -> bool {
        let clipped = rect.clipped(self.width() as i32, self.height() as i32);
        debug_assert!(clipped.is_valid(), "marking invalid rect {rect:?}");
        self.dirty.add(clipped)
    }

    pub fn stats(&self) -> CompositorStats {
        let committed = self.planes.committed();
        let mut min = u16::MAX;
        let mut max = 0u16;
        let mut zero_pixels = 0usize;
        for &value in committed {
            min = min.min(value);
            max = max.max(value);
            if value == 0 {
                zero_pixels += 1;
            }
        }
        CompositorStats {
            width: self.width(),
            height: self.height(),
            enabled: self.enabled,
            dirty_rects: self.dirty.len(),
            depth: DepthStats {
                min,
                max,
                zero_pixels,
                nonzero_pixels: committed.len() - zero_pixels,
            },
        }
    }

    fn decode_full(&mut self, body: &[u8]) -> Result<(), CompositeError> {
        // A full replacement makes any tracked partial dirt moot.
        self.dirty.reset();

        let expected = self.planes.len() * 2;
        let raw = unpack_plane(body, expected).map_err(CompositeError::Payload)?;
        for (px, chunk) in self
            .planes
            .pending_mut()
            .iter_mut()
            .zip(raw.chunks_exact(2))
        {
            *px = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        self.planes.promote_all();
        debug!(
            "full frame decoded, {} bytes compressed -> {expected} raw",
            body.len()
        );
        Ok(())
    }

    fn decode_partial(&mut self, body: &[u8]) -> Result<(), CompositeError> {
        // Flush previous dirt so the patch lands on a consistent base.
        self.clean();

        // Both planes take the same patch stream through independent
        // cursors; they must agree outside tracked rects or the next
        // row-granular flush resurrects stale content.
        apply_patch(body, self.planes.pending_mut()).map_err(CompositeError::Payload)?;
        apply_patch(body, self.planes.committed_mut()).map_err(CompositeError::Payload)?;
        debug!("partial frame applied, {} patch bytes", body.len());
        Ok(())
    }
}

fn unpack_plane(body: &[u8], expected: usize) -> Result<Vec<u8>> {
    ensure!(body.len() >= 4, "full frame missing compressed-length prefix");
    let packed_len = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
    ensure!(
        4 + packed_len <= body.len(),
        "full frame compressed block truncated: {packed_len} > {}",
        body.len() - 4
    );

    let mut raw = vec![0u8; expected];
    let written = lzss::decompress(&body[4..4 + packed_len], &mut raw)
        .context("decompressing full frame")?;
    ensure!(
        written == expected,
        "full frame decompressed to {written} bytes, expected {expected}"
    );
    Ok(raw)
}

/// One pass of the sparse patch stream over a single plane. Stops when the
/// plane's pixel budget or the input is exhausted.
fn apply_patch(body: &[u8], plane: &mut [u16]) -> Result<()> {
    let mut reader = PatchReader::new(body);
    let mut cursor = 0usize;

    while cursor < plane.len() {
        let run = match reader.next_run()? {
            Some(run) => run,
            None => break,
        };
        match run {
            PatchRun::Fill { len, value } => {
                let end = (cursor + len).min(plane.len());
                if value != 0 {
                    plane[cursor..end].fill(value);
                }
                cursor = end;
            }
            PatchRun::Sparse(values) => {
                for value in values.iter() {
                    if cursor >= plane.len() {
                        break;
                    }
                    if value != 0 {
                        plane[cursor] = value;
                    }
                    cursor += 1;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_formats::{write_full_frame, write_patch_frame, PatchWriter};

    const W: u32 = 8;
    const H: u32 = 6;

    fn full_payload(value: u16) -> Vec<u8> {
        let pixels = vec![value; (W * H) as usize];
        write_full_frame(W, H, &pixels).expect("payload builds")
    }

    #[test]
    fn full_frame_replaces_every_pixel_and_resets_dirt() {
        let mut compositor = FrameCompositor::new(W, H);
        assert!(compositor.mark(DirtyRect::new(0, 0, 3, 3)));
        assert_eq!(compositor.dirty_count(), 1);

        assert!(compositor.decode_frame(&full_payload(0x2222)).unwrap());
        assert_eq!(compositor.dirty_count(), 0);
        for y in 0..H {
            for x in 0..W {
                assert_eq!(compositor.value_at(x, y), 0x2222);
            }
        }
    }

    #[test]
    fn fill_run_covers_whole_plane() {
        let mut compositor = FrameCompositor::new(W, H);
        let mut patch = PatchWriter::new();
        patch.fill((W * H) as usize, 0x0BAD);
        let payload = write_patch_frame(W, H, &patch.into_bytes());

        assert!(compositor.decode_frame(&payload).unwrap());
        for y in 0..H {
            for x in 0..W {
                assert_eq!(compositor.value_at(x, y), 0x0BAD);
            }
        }
        assert_eq!(compositor.planes().pending(), compositor.planes().committed());
    }

    #[test]
    fn skip_run_preserves_previous_content() {
        let mut compositor = FrameCompositor::new(W, H);
        assert!(compositor.decode_frame(&full_payload(0x0101)).unwrap());

        let mut patch = PatchWriter::new();
        patch.skip((W * H) as usize);
        let payload = write_patch_frame(W, H, &patch.into_bytes());
        assert!(compositor.decode_frame(&payload).unwrap());

        for y in 0..H {
            for x in 0..W {
                assert_eq!(compositor.value_at(x, y), 0x0101);
            }
        }
    }

    #[test]
    fn sparse_zeros_preserve_and_values_overwrite() {
        let mut compositor = FrameCompositor::new(W, H);
        assert!(compositor.decode_frame(&full_payload(0x0101)).unwrap());

        let mut patch = PatchWriter::new();
        patch.sparse(&[0x7777, 0, 0x8888]);
        let payload = write_patch_frame(W, H, &patch.into_bytes());
        assert!(compositor.decode_frame(&payload).unwrap());

        assert_eq!(compositor.value_at(0, 0), 0x7777);
        assert_eq!(compositor.value_at(1, 0), 0x0101);
        assert_eq!(compositor.value_at(2, 0), 0x8888);
        assert_eq!(compositor.value_at(3, 0), 0x0101);
        assert_eq!(compositor.planes().pending(), compositor.planes().committed());
    }

    #[test]
    fn patch_input_past_pixel_budget_is_ignored() {
        let mut compositor = FrameCompositor::new(W, H);
        let mut patch = PatchWriter::new();
        patch.fill((W * H) as usize, 0x0042);
        patch.fill(100, 0x0099); // beyond the budget
        let payload = write_patch_frame(W, H, &patch.into_bytes());

        assert!(compositor.decode_frame(&payload).unwrap());
        for y in 0..H {
            for x in 0..W {
                assert_eq!(compositor.value_at(x, y), 0x0042);
            }
        }
    }

    #[test]
    fn dimension_mismatch_fails_without_mutation() {
        let mut compositor = FrameCompositor::new(W, H);
        assert!(compositor.decode_frame(&full_payload(0x0101)).unwrap());

        let wrong = write_full_frame(W + 1, H, &vec![0x5555u16; ((W + 1) * H) as usize])
            .expect("payload builds");
        match compositor.decode_frame(&wrong) {
            Err(CompositeError::DimensionMismatch { got_width, .. }) => {
                assert_eq!(got_width, W + 1);
            }
            other => panic!("expected dimension mismatch, got {other:?}"),
        }
        assert_eq!(compositor.value_at(0, 0), 0x0101);
    }

    #[test]
    fn disabled_compositor_ignores_payloads() {
        let mut compositor = FrameCompositor::new(W, H);
        compositor.disable();
        assert!(!compositor.decode_frame(&full_payload(0x3333)).unwrap());
        assert_eq!(compositor.value_at(0, 0), 0);

        compositor.enable();
        assert!(compositor.decode_frame(&full_payload(0x3333)).unwrap());
        assert_eq!(compositor.value_at(0, 0), 0x3333);
    }

    #[test]
    fn clean_twice_is_idempotent() {
        let mut compositor = FrameCompositor::new(W, H);
        compositor.planes_mut().pending_mut().fill(9);
        assert!(compositor.mark(DirtyRect::new(0, 0, W as i32, H as i32)));
        compositor.clean();
        assert_eq!(compositor.dirty_count(), 0);
        let after_first: Vec<u16> = compositor.planes().committed().to_vec();

        compositor.clean();
        assert_eq!(compositor.dirty_count(), 0);
        assert_eq!(compositor.planes().committed(), after_first.as_slice());
    }

    #[test]
    fn mark_clips_to_surface() {
        let mut compositor = FrameCompositor::new(W, H);
        compositor.planes_mut().pending_mut().fill(3);
        assert!(compositor.mark(DirtyRect::new(-10, -10, 1000, 1000)));
        compositor.clean();
        assert_eq!(compositor.value_at(W - 1, H - 1), 3);
    }

    #[test]
    fn stats_reflect_committed_plane() {
        let mut compositor = FrameCompositor::new(W, H);
        let mut patch = PatchWriter::new();
        patch.fill(4, 0x0010).skip((W * H) as usize - 4);
        let payload = write_patch_frame(W, H, &patch.into_bytes());
        assert!(compositor.decode_frame(&payload).unwrap());

        let stats = compositor.stats();
        assert_eq!(stats.width, W);
        assert_eq!(stats.height, H);
        assert!(stats.enabled);
        assert_eq!(stats.dirty_rects, 0);
        assert_eq!(stats.depth.min, 0);
        assert_eq!(stats.depth.max, 0x0010);
        assert_eq!(stats.depth.nonzero_pixels, 4);
        assert_eq!(stats.depth.zero_pixels, (W * H) as usize - 4);
    }
}

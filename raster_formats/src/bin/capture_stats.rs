use std::env;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use raster_formats::{CaptureFile, FrameHeader};

fn main() -> Result<()> {
    let root = env::args()
        .nth(1)
        .context("usage: capture_stats <capture directory>")?;

    let mut total_files = 0usize;
    let mut total_frames = 0usize;

    for entry in WalkDir::new(&root) {
        let entry = entry.context("walking capture directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_capture = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("fcap"))
            .unwrap_or(false);
        if !is_capture {
            continue;
        }

        let capture = CaptureFile::open(entry.path())
            .with_context(|| format!("opening {}", entry.path().display()))?;

        let mut full = 0usize;
        let mut partial = 0usize;
        let mut bytes = 0usize;
        for payload in capture.frames() {
            bytes += payload.len();
            match FrameHeader::parse(payload) {
                Ok(header) if header.full_frame => full += 1,
                Ok(_) => partial += 1,
                Err(_) => {}
            }
        }

        println!(
            "{name:<40} {frames:>6} frames {full:>6} full {partial:>6} patch {bytes:>12} bytes",
            name = entry.path().display(),
            frames = capture.frame_count(),
            full = full,
            partial = partial,
            bytes = bytes,
        );
        total_files += 1;
        total_frames += capture.frame_count();
    }

    println!("{total_files} captures, {total_frames} frames under {root}");
    Ok(())
}

//! FCAP capture container: a sequence of frame payloads recorded from a
//! running engine, stored with a small length-prefixed index so tools can
//! replay or inspect them without re-parsing the whole file.

use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use memmap2::{Mmap, MmapOptions};

const CAPTURE_MAGIC: &[u8; 4] = b"FCAP";
const CAPTURE_VERSION: u32 = 1;
const CAPTURE_HEADER_LEN: usize = 16;

/// Memory-mapped capture file with a parsed frame index.
#[derive(Debug)]
pub struct CaptureFile {
    path: PathBuf,
    mmap: Mmap,
    frames: Vec<Range<usize>>,
}

impl CaptureFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf)
            .with_context(|| format!("opening capture file at {}", path_buf.display()))?;
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .with_context(|| format!("memory-mapping capture file {}", path_buf.display()))?;

        let frames = parse_index(&mmap)
            .with_context(|| format!("parsing capture file {}", path_buf.display()))?;

        Ok(CaptureFile {
            path: path_buf,
            mmap,
            frames,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> &[u8] {
        &self.mmap[self.frames[index].clone()]
    }

    pub fn frames(&self) -> impl Iterator<Item = &[u8]> {
        self.frames.iter().map(|range| &self.mmap[range.clone()])
    }
}

fn parse_index(mmap: &Mmap) -> Result<Vec<Range<usize>>> {
    ensure!(
        mmap.len() >= CAPTURE_HEADER_LEN,
        "capture file too small to contain a header"
    );

    let header = &mmap[..CAPTURE_HEADER_LEN];
    if &header[0..4] != CAPTURE_MAGIC {
        bail!("capture file missing FCAP signature");
    }

    let version = u32::from_le_bytes(header[4..8].try_into().unwrap());
    ensure!(
        version == CAPTURE_VERSION,
        "unsupported capture version {version}"
    );
    let frame_count = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;

    let mut frames = Vec::with_capacity(frame_count);
    let mut offset = CAPTURE_HEADER_LEN;
    for index in 0..frame_count {
        ensure!(
            offset + 4 <= mmap.len(),
            "capture truncated before frame {index} length"
        );
        let len = u32::from_le_bytes(mmap[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        let end = offset
            .checked_add(len)
            .with_context(|| format!("frame {index} length overflow"))?;
        ensure!(end <= mmap.len(), "frame {index} data extends beyond file");
        frames.push(offset..end);
        offset = end;
    }

    Ok(frames)
}

/// Write `payloads` to `path` as an FCAP capture.
pub fn write_capture<P: AsRef<Path>, B: AsRef<[u8]>>(path: P, payloads: &[B]) -> Result<()> {
    let mut file = File::create(path.as_ref())
        .with_context(|| format!("creating capture file {}", path.as_ref().display()))?;

    let mut header = [0u8; CAPTURE_HEADER_LEN];
    header[0..4].copy_from_slice(CAPTURE_MAGIC);
    header[4..8].copy_from_slice(&CAPTURE_VERSION.to_le_bytes());
    header[8..12].copy_from_slice(&(payloads.len() as u32).to_le_bytes());
    file.write_all(&header).context("writing capture header")?;

    for (index, payload) in payloads.iter().enumerate() {
        let bytes = payload.as_ref();
        file.write_all(&(bytes.len() as u32).to_le_bytes())
            .with_context(|| format!("writing frame {index} length"))?;
        file.write_all(bytes)
            .with_context(|| format!("writing frame {index} payload"))?;
    }

    Ok(())
}

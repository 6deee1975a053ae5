use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use raster_engine::FrameCompositor;
use raster_formats::{CaptureFile, FrameHeader};

#[derive(Parser, Debug)]
#[command(about = "Replay an FCAP capture through the compositor headlessly", version)]
struct Args {
    /// Capture file to replay
    capture: PathBuf,

    /// Write the final compositor stats to this file instead of stdout
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Keep replaying past frames the compositor rejects
    #[arg(long)]
    keep_going: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let capture = CaptureFile::open(&args.capture)?;
    if capture.frame_count() == 0 {
        bail!("capture {} holds no frames", args.capture.display());
    }

    // The first frame's header sizes the surface.
    let header = FrameHeader::parse(capture.frame(0)).context("reading first frame header")?;
    let mut compositor = FrameCompositor::new(header.width, header.height);
    info!(
        "replaying {} frames at {}x{}",
        capture.frame_count(),
        header.width,
        header.height
    );

    let mut rejected = 0usize;
    for (index, payload) in capture.frames().enumerate() {
        match compositor.decode_frame(payload) {
            Ok(applied) => {
                info!(
                    "frame {index}: {} bytes, {} dirty rects pending",
                    payload.len(),
                    compositor.dirty_count()
                );
                debug_assert!(applied, "replay never disables the compositor");
            }
            Err(err) if args.keep_going => {
                warn!("frame {index} rejected: {err}");
                rejected += 1;
            }
            Err(err) => {
                return Err(anyhow::Error::from(err))
                    .with_context(|| format!("decoding frame {index}"));
            }
        }
        compositor.clean();
    }

    if rejected > 0 {
        warn!("{rejected} frames rejected during replay");
    }

    let stats = serde_json::to_string_pretty(&compositor.stats())
        .context("serialising compositor stats")?;
    match args.stats_json {
        Some(path) => fs::write(&path, stats)
            .with_context(|| format!("writing stats to {}", path.display()))?,
        None => println!("{stats}"),
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use raster_formats::{CaptureFile, FrameHeader, PatchReader, PatchRun, FRAME_HEADER_LEN};

#[derive(Parser, Debug)]
#[command(about = "Inspect the frame payloads inside an FCAP capture", version)]
struct Args {
    /// Capture file to inspect
    capture: PathBuf,

    /// Only report the frame at this index
    #[arg(long)]
    frame: Option<usize>,

    /// Emit the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct FrameReport {
    index: usize,
    width: u32,
    height: u32,
    full_frame: bool,
    payload_bytes: usize,
    fill_runs: usize,
    sparse_runs: usize,
    run_pixels: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let capture = CaptureFile::open(&args.capture)?;

    let indices: Vec<usize> = match args.frame {
        Some(index) => {
            anyhow::ensure!(
                index < capture.frame_count(),
                "frame {index} out of range ({} frames)",
                capture.frame_count()
            );
            vec![index]
        }
        None => (0..capture.frame_count()).collect(),
    };

    let mut reports = Vec::with_capacity(indices.len());
    for index in indices {
        let payload = capture.frame(index);
        let report = describe_frame(index, payload)
            .with_context(|| format!("describing frame {index}"))?;
        reports.push(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!(
            "{} frames in {}",
            capture.frame_count(),
            capture.path().display()
        );
        for report in &reports {
            let kind = if report.full_frame { "full" } else { "patch" };
            println!(
                "{index:>5} {kind:<5} {width:>5}x{height:<5} {bytes:>9} bytes  {fills:>5} fill  {sparse:>5} sparse  {pixels:>9} px",
                index = report.index,
                kind = kind,
                width = report.width,
                height = report.height,
                bytes = report.payload_bytes,
                fills = report.fill_runs,
                sparse = report.sparse_runs,
                pixels = report.run_pixels,
            );
        }
    }

    Ok(())
}

fn describe_frame(index: usize, payload: &[u8]) -> Result<FrameReport> {
    let header = FrameHeader::parse(payload)?;
    let mut report = FrameReport {
        index,
        width: header.width,
        height: header.height,
        full_frame: header.full_frame,
        payload_bytes: payload.len(),
        fill_runs: 0,
        sparse_runs: 0,
        run_pixels: 0,
    };

    if !header.full_frame {
        let mut reader = PatchReader::new(&payload[FRAME_HEADER_LEN..]);
        while let Some(run) = reader.next_run()? {
            match run {
                PatchRun::Fill { len, .. } => {
                    report.fill_runs += 1;
                    report.run_pixels += len;
                }
                PatchRun::Sparse(values) => {
                    report.sparse_runs += 1;
                    report.run_pixels += values.len();
                }
            }
        }
    }

    Ok(report)
}

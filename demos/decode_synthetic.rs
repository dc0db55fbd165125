use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cdm_video_decoder::synthetic::{SyntheticEngineFactory, SyntheticEngineOptions, encode_unit};
use cdm_video_decoder::{
    AdapterOptions, BudgetedAllocator, Codec, CompressedUnit, DecodeOutcome, DecoderAdapter,
    DecoderConfig, Dimensions, HeapAllocator, Timestamp, VideoFormat,
};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecArg {
    Vp8,
    Vp9,
    H264,
    Hevc,
}

impl From<CodecArg> for Codec {
    fn from(value: CodecArg) -> Self {
        match value {
            CodecArg::Vp8 => Codec::Vp8,
            CodecArg::Vp9 => Codec::Vp9,
            CodecArg::H264 => Codec::H264,
            CodecArg::Hevc => Codec::Hevc,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    I420,
    Yv12,
}

impl From<FormatArg> for VideoFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::I420 => VideoFormat::I420,
            FormatArg::Yv12 => VideoFormat::Yv12,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Drive the decoder adapter with the synthetic engine")]
struct Args {
    #[arg(long, value_enum, default_value = "vp9")]
    codec: CodecArg,
    #[arg(long, value_enum, default_value = "i420")]
    format: FormatArg,
    #[arg(long, default_value_t = 1280)]
    width: u32,
    #[arg(long, default_value_t = 720)]
    height: u32,
    #[arg(long, default_value_t = 60)]
    frames: u32,
    /// Units the engine buffers before emitting the first picture.
    #[arg(long, default_value_t = 2)]
    lookahead: usize,
    #[arg(long, default_value_t = 0)]
    stride_padding: usize,
    /// Reset the decoder before this frame index, as on a seek.
    #[arg(long)]
    reset_at: Option<u32>,
    /// Cap on frames held at once; unlimited when omitted.
    #[arg(long)]
    max_in_flight: Option<usize>,
    #[arg(long)]
    metrics: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let factory = SyntheticEngineFactory::new(SyntheticEngineOptions {
        lookahead: args.lookahead,
        stride_padding: args.stride_padding,
        ..SyntheticEngineOptions::default()
    });
    let allocator: Arc<dyn cdm_video_decoder::FrameAllocator> = match args.max_in_flight {
        Some(limit) => Arc::new(BudgetedAllocator::new(HeapAllocator::default(), limit)),
        None => Arc::new(HeapAllocator::default()),
    };
    let mut adapter = DecoderAdapter::with_options(
        factory.clone(),
        allocator,
        AdapterOptions {
            report_metrics: args.metrics.then_some(true),
        },
    );

    let config = DecoderConfig::new(
        args.codec.into(),
        Dimensions::new(args.width, args.height),
        args.format.into(),
    );
    adapter
        .initialize(config.clone())
        .with_context(|| format!("initialize {config}"))?;

    let mut emitted = 0usize;
    for index in 0..args.frames {
        if args.reset_at == Some(index) {
            adapter.reset().context("reset")?;
            tracing::info!(index, "decoder reset");
        }
        let unit = encode_unit(index as u8);
        let timestamp = Timestamp(i64::from(index) * 33_333);
        match adapter
            .decode_frame(CompressedUnit::new(&unit, timestamp))
            .with_context(|| format!("decode frame {index}"))?
        {
            DecodeOutcome::Frame(frame) => {
                emitted += 1;
                tracing::debug!(timestamp = %frame.timestamp, bytes = frame.buffer.len(), "frame");
            }
            DecodeOutcome::NeedsMoreData => {}
        }
    }
    while let DecodeOutcome::Frame(frame) = adapter.drain().context("drain")? {
        emitted += 1;
        tracing::debug!(timestamp = %frame.timestamp, "drained frame");
    }

    let summary = adapter.summary();
    adapter.deinitialize();
    if factory.live_sessions() != 0 {
        bail!("engine session leaked after deinitialize");
    }
    println!("emitted={emitted} {summary}");
    Ok(())
}

use std::{fmt, fmt::Display};

use crate::allocator::FrameBuffer;
use crate::error::{AllocError, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Vp8,
    Vp9,
    H264,
    Hevc,
}

impl Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vp8 => f.write_str("vp8"),
            Self::Vp9 => f.write_str("vp9"),
            Self::H264 => f.write_str("h264"),
            Self::Hevc => f.write_str("hevc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    /// Y, U, V.
    I420,
    /// Y, V, U.
    Yv12,
}

impl VideoFormat {
    pub const PLANE_COUNT: usize = 3;

    #[must_use]
    pub fn row_bytes(self, plane: usize, dims: Dimensions) -> usize {
        match plane {
            0 => dims.width as usize,
            _ => (dims.width as usize).div_ceil(2),
        }
    }

    #[must_use]
    pub fn plane_rows(self, plane: usize, dims: Dimensions) -> usize {
        match plane {
            0 => dims.height as usize,
            _ => (dims.height as usize).div_ceil(2),
        }
    }
}

impl Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I420 => f.write_str("i420"),
            Self::Yv12 => f.write_str("yv12"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub codec: Codec,
    pub coded_size: Dimensions,
    pub format: VideoFormat,
    pub extra_data: Vec<u8>,
}

impl DecoderConfig {
    #[must_use]
    pub fn new(codec: Codec, coded_size: Dimensions, format: VideoFormat) -> Self {
        Self {
            codec,
            coded_size,
            format,
            extra_data: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_extra_data(mut self, extra_data: impl Into<Vec<u8>>) -> Self {
        self.extra_data = extra_data.into();
        self
    }
}

impl Display for DecoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecoderConfig(codec={}, coded_size={}, format={}, extra_data_len={})",
            self.codec,
            self.coded_size,
            self.format,
            self.extra_data.len()
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig<'a> {
    pub codec: Codec,
    pub extra_data: &'a [u8],
    pub format: VideoFormat,
    pub coded_size: Dimensions,
}

#[derive(Debug, Clone, Copy)]
pub struct CompressedUnit<'a> {
    pub data: &'a [u8],
    pub timestamp: Timestamp,
}

impl<'a> CompressedUnit<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8], timestamp: Timestamp) -> Self {
        Self { data, timestamp }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// A decoded picture still owned by the engine. Only valid until the next
/// call into the engine.
#[derive(Debug, Clone)]
pub struct Picture<'a> {
    pub format: VideoFormat,
    pub dims: Dimensions,
    pub timestamp: Timestamp,
    pub planes: [PlaneRef<'a>; VideoFormat::PLANE_COUNT],
}

#[derive(Debug)]
pub struct DecodedFrame {
    pub format: VideoFormat,
    pub dims: Dimensions,
    pub timestamp: Timestamp,
    pub buffer: FrameBuffer,
}

impl DecodedFrame {
    #[must_use]
    pub fn plane(&self, plane: usize) -> Option<&[u8]> {
        let rows = self.format.plane_rows(plane, self.dims);
        self.buffer.plane(plane, rows)
    }

    #[must_use]
    pub fn stride(&self, plane: usize) -> Option<usize> {
        self.buffer.layout(plane).map(|layout| layout.stride)
    }

    #[must_use]
    pub fn row(&self, plane: usize, row: usize) -> Option<&[u8]> {
        let stride = self.stride(plane)?;
        let width = self.format.row_bytes(plane, self.dims);
        let start = row.checked_mul(stride)?;
        self.plane(plane)?.get(start..start.checked_add(width)?)
    }
}

#[derive(Debug)]
pub enum DecodeOutcome {
    Frame(DecodedFrame),
    NeedsMoreData,
}

impl DecodeOutcome {
    #[must_use]
    pub fn into_frame(self) -> Option<DecodedFrame> {
        match self {
            Self::Frame(frame) => Some(frame),
            Self::NeedsMoreData => None,
        }
    }

    #[must_use]
    pub fn is_needs_more_data(&self) -> bool {
        matches!(self, Self::NeedsMoreData)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub submitted_units: usize,
    pub decoded_frames: usize,
    pub needs_more_data: usize,
    pub decode_errors: usize,
    pub contract_violations: usize,
}

impl Display for DecodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecodeSummary(submitted_units={}, decoded_frames={}, needs_more_data={}, decode_errors={}, contract_violations={})",
            self.submitted_units,
            self.decoded_frames,
            self.needs_more_data,
            self.decode_errors,
            self.contract_violations
        )
    }
}

pub trait DecodingEngine {
    fn configure(&mut self, config: &EngineConfig<'_>) -> Result<(), EngineError>;

    fn submit(&mut self, data: &[u8], timestamp: Timestamp) -> Result<(), EngineError>;

    fn try_retrieve_picture(&mut self) -> Result<Option<Picture<'_>>, EngineError>;

    fn flush(&mut self) -> Result<(), EngineError>;

    fn finish(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

pub trait EngineFactory {
    fn create(&self, codec: Codec) -> Result<Box<dyn DecodingEngine>, EngineError>;
}

/// Shared source of frame storage. Implementations must tolerate concurrent
/// calls; the adapter issues at most one per decode call.
pub trait FrameAllocator: Send + Sync {
    fn allocate(&self, format: VideoFormat, dims: Dimensions) -> Result<FrameBuffer, AllocError>;
}

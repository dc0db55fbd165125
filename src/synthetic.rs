use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::contract::{
    Codec, DecodingEngine, Dimensions, EngineConfig, EngineFactory, Picture, PlaneRef, Timestamp,
    VideoFormat,
};
use crate::error::EngineError;
use crate::transform::make_marked_planes;

// A unit is the magic followed by one seed byte.
pub const UNIT_MAGIC: &[u8; 4] = b"SYNV";
pub const MAX_PROFILE: u8 = 2;

#[derive(Debug, Clone)]
pub struct SyntheticEngineOptions {
    pub lookahead: usize,
    pub stride_padding: usize,
    pub supported_codecs: Vec<Codec>,
    pub drift_size: Option<Dimensions>,
}

impl Default for SyntheticEngineOptions {
    fn default() -> Self {
        Self {
            lookahead: 0,
            stride_padding: 0,
            supported_codecs: vec![Codec::Vp8, Codec::Vp9, Codec::H264, Codec::Hevc],
            drift_size: None,
        }
    }
}

#[must_use]
pub fn encode_unit(seed: u8) -> Vec<u8> {
    let mut unit = UNIT_MAGIC.to_vec();
    unit.push(seed);
    unit
}

fn parse_unit(data: &[u8]) -> Result<u8, EngineError> {
    match data {
        [m0, m1, m2, m3, seed] if [*m0, *m1, *m2, *m3] == *UNIT_MAGIC => Ok(*seed),
        _ => Err(EngineError::CorruptBitstream(format!(
            "{} byte unit is not a synthetic access unit",
            data.len()
        ))),
    }
}

#[derive(Debug)]
struct Negotiated {
    format: VideoFormat,
    dims: Dimensions,
}

#[derive(Debug)]
struct HeldPicture {
    timestamp: Timestamp,
    planes: [(Vec<u8>, usize); VideoFormat::PLANE_COUNT],
}

#[derive(Debug)]
pub struct SyntheticEngine {
    codec: Codec,
    options: SyntheticEngineOptions,
    negotiated: Option<Negotiated>,
    pending: VecDeque<(Timestamp, u8)>,
    end_of_stream: bool,
    held: Option<HeldPicture>,
    live_sessions: Arc<AtomicUsize>,
}

impl SyntheticEngine {
    #[must_use]
    pub fn new(codec: Codec, options: SyntheticEngineOptions) -> Self {
        Self::with_counter(codec, options, Arc::new(AtomicUsize::new(0)))
    }

    fn with_counter(
        codec: Codec,
        options: SyntheticEngineOptions,
        live_sessions: Arc<AtomicUsize>,
    ) -> Self {
        live_sessions.fetch_add(1, Ordering::SeqCst);
        Self {
            codec,
            options,
            negotiated: None,
            pending: VecDeque::new(),
            end_of_stream: false,
            held: None,
            live_sessions,
        }
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && (self.end_of_stream || self.pending.len() > self.options.lookahead)
    }
}

impl Drop for SyntheticEngine {
    fn drop(&mut self) {
        self.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DecodingEngine for SyntheticEngine {
    fn configure(&mut self, config: &EngineConfig<'_>) -> Result<(), EngineError> {
        if config.codec != self.codec || !self.options.supported_codecs.contains(&config.codec) {
            return Err(EngineError::UnsupportedCodec(config.codec));
        }
        match config.extra_data.first() {
            Some(&profile) if profile > MAX_PROFILE => {
                return Err(EngineError::UnsupportedProfile(format!(
                    "profile {profile} exceeds {MAX_PROFILE}"
                )));
            }
            _ => {}
        }
        self.negotiated = Some(Negotiated {
            format: config.format,
            dims: config.coded_size,
        });
        self.pending.clear();
        self.end_of_stream = false;
        self.held = None;
        Ok(())
    }

    fn submit(&mut self, data: &[u8], timestamp: Timestamp) -> Result<(), EngineError> {
        if self.negotiated.is_none() {
            return Err(EngineError::InvalidInput(
                "submit before configure".to_string(),
            ));
        }
        let seed = parse_unit(data)?;
        self.pending.push_back((timestamp, seed));
        Ok(())
    }

    fn try_retrieve_picture(&mut self) -> Result<Option<Picture<'_>>, EngineError> {
        let Some(negotiated) = self.negotiated.as_ref() else {
            return Err(EngineError::InvalidInput(
                "retrieve before configure".to_string(),
            ));
        };
        if !self.ready() {
            return Ok(None);
        }
        let Some((timestamp, seed)) = self.pending.pop_front() else {
            return Ok(None);
        };
        let format = negotiated.format;
        let dims = self.options.drift_size.unwrap_or(negotiated.dims);
        let held: &HeldPicture = self.held.insert(HeldPicture {
            timestamp,
            planes: make_marked_planes(
                format,
                dims.width,
                dims.height,
                self.options.stride_padding,
                seed,
            ),
        });
        Ok(Some(Picture {
            format,
            dims,
            timestamp: held.timestamp,
            planes: std::array::from_fn(move |i| PlaneRef {
                data: &held.planes[i].0,
                stride: held.planes[i].1,
            }),
        }))
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        self.pending.clear();
        self.end_of_stream = false;
        self.held = None;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        self.end_of_stream = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticEngineFactory {
    options: SyntheticEngineOptions,
    live_sessions: Arc<AtomicUsize>,
    created: Arc<AtomicUsize>,
}

impl SyntheticEngineFactory {
    #[must_use]
    pub fn new(options: SyntheticEngineOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn created_sessions(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EngineFactory for SyntheticEngineFactory {
    fn create(&self, codec: Codec) -> Result<Box<dyn DecodingEngine>, EngineError> {
        if !self.options.supported_codecs.contains(&codec) {
            return Err(EngineError::UnsupportedCodec(codec));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticEngine::with_counter(
            codec,
            self.options.clone(),
            Arc::clone(&self.live_sessions),
        )))
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

mod allocator;
mod contract;
mod error;
pub mod events;
#[cfg(feature = "backend-ffmpeg")]
mod ffmpeg_backend;
pub mod navigation;
mod output;
pub mod synthetic;
mod transform;

pub use allocator::{
    BudgetedAllocator, DEFAULT_ROW_ALIGNMENT, FrameBuffer, HeapAllocator, InFlightCredits,
    PlaneLayout,
};
pub use contract::{
    Codec, CompressedUnit, DecodeOutcome, DecodeSummary, DecodedFrame, DecoderConfig,
    DecodingEngine, Dimensions, EngineConfig, EngineFactory, FrameAllocator, Picture, PlaneRef,
    Timestamp, VideoFormat,
};
pub use error::{AllocError, DecodeFailure, DecoderError, EngineError};
pub use events::frame_id;
#[cfg(feature = "backend-ffmpeg")]
pub use ffmpeg_backend::{FfmpegEngine, FfmpegEngineFactory};
pub use output::{MAX_CANVAS, MAX_DIMENSION, is_valid_output_config};
pub use transform::{
    CopyError, PlaneCopy, copy_plane, make_marked_planes, row_marker, transfer_picture,
};

use error::{map_alloc_error, map_configure_error, map_copy_error, map_engine_error};

pub const METRICS_ENV: &str = "CDM_VIDEO_METRICS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Error,
    TornDown,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Error => "error",
            Self::TornDown => "torn_down",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    pub report_metrics: Option<bool>,
}

fn should_report_metrics(options: &AdapterOptions) -> bool {
    options.report_metrics.unwrap_or_else(|| {
        std::env::var(METRICS_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

pub struct DecoderAdapter {
    factory: Box<dyn EngineFactory>,
    allocator: Arc<dyn FrameAllocator>,
    report_metrics: bool,
    engine: Option<Box<dyn DecodingEngine>>,
    config: Option<DecoderConfig>,
    state: SessionState,
    end_of_stream: bool,
    summary: DecodeSummary,
}

impl DecoderAdapter {
    pub fn new<F>(factory: F, allocator: Arc<dyn FrameAllocator>) -> Self
    where
        F: EngineFactory + 'static,
    {
        Self::with_options(factory, allocator, AdapterOptions::default())
    }

    pub fn with_options<F>(
        factory: F,
        allocator: Arc<dyn FrameAllocator>,
        options: AdapterOptions,
    ) -> Self
    where
        F: EngineFactory + 'static,
    {
        Self {
            factory: Box::new(factory),
            allocator,
            report_metrics: should_report_metrics(&options),
            engine: None,
            config: None,
            state: SessionState::Uninitialized,
            end_of_stream: false,
            summary: DecodeSummary::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Initialized
    }

    #[must_use]
    pub fn config(&self) -> Option<&DecoderConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn summary(&self) -> DecodeSummary {
        self.summary
    }

    pub fn initialize(&mut self, config: DecoderConfig) -> Result<(), DecoderError> {
        if !matches!(
            self.state,
            SessionState::Uninitialized | SessionState::Error
        ) {
            return Err(self.invalid_state("initialize"));
        }
        self.release_engine();

        match self.build_engine(&config) {
            Ok(engine) => {
                tracing::debug!(%config, "decoder initialized");
                self.engine = Some(engine);
                self.config = Some(config);
                self.state = SessionState::Initialized;
                self.end_of_stream = false;
                self.summary = DecodeSummary::default();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%config, %err, "decoder configuration rejected");
                self.state = SessionState::Error;
                Err(err)
            }
        }
    }

    fn build_engine(
        &self,
        config: &DecoderConfig,
    ) -> Result<Box<dyn DecodingEngine>, DecoderError> {
        if !is_valid_output_config(config.format, config.coded_size) {
            return Err(DecoderError::ConfigurationRejected(format!(
                "unsupported output {} at {}",
                config.format, config.coded_size
            )));
        }
        let mut engine = self
            .factory
            .create(config.codec)
            .map_err(|err| map_configure_error(config.codec, err))?;
        engine
            .configure(&EngineConfig {
                codec: config.codec,
                extra_data: &config.extra_data,
                format: config.format,
                coded_size: config.coded_size,
            })
            .map_err(|err| map_configure_error(config.codec, err))?;
        Ok(engine)
    }

    pub fn deinitialize(&mut self) {
        if self.state != SessionState::TornDown {
            tracing::debug!(summary = %self.summary, "decoder deinitialized");
        }
        self.release_engine();
        self.config = None;
        self.end_of_stream = false;
        self.state = SessionState::TornDown;
    }

    pub fn reset(&mut self) -> Result<(), DecoderError> {
        let engine = self.active_engine("reset")?;
        if let Err(err) = engine.flush() {
            tracing::warn!(%err, "engine flush failed");
            self.summary.decode_errors += 1;
            return Err(map_engine_error(err));
        }
        self.end_of_stream = false;
        tracing::debug!("decoder reset");
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if `unit.data` is empty.
    pub fn decode_frame(
        &mut self,
        unit: CompressedUnit<'_>,
    ) -> Result<DecodeOutcome, DecoderError> {
        assert!(
            !unit.data.is_empty(),
            "decode_frame requires a non-empty compressed unit"
        );
        let started = Instant::now();
        let engine = self.active_engine("decode_frame")?;
        let submitted = engine.submit(unit.data, unit.timestamp);
        self.summary.submitted_units += 1;
        if let Err(err) = submitted {
            tracing::warn!(timestamp = %unit.timestamp, %err, "engine rejected access unit");
            self.summary.decode_errors += 1;
            return Err(map_engine_error(err));
        }
        let submit_elapsed = started.elapsed();
        self.emit_next("decode_frame", submit_elapsed)
    }

    pub fn drain(&mut self) -> Result<DecodeOutcome, DecoderError> {
        let end_of_stream = self.end_of_stream;
        let engine = self.active_engine("drain")?;
        if !end_of_stream {
            if let Err(err) = engine.finish() {
                self.summary.decode_errors += 1;
                return Err(map_engine_error(err));
            }
            self.end_of_stream = true;
        }
        self.emit_next("drain", Duration::ZERO)
    }

    fn emit_next(
        &mut self,
        operation: &'static str,
        submit_elapsed: Duration,
    ) -> Result<DecodeOutcome, DecoderError> {
        let (Some(engine), Some(config)) = (self.engine.as_deref_mut(), self.config.as_ref())
        else {
            return Err(DecoderError::InvalidState {
                operation,
                state: self.state.as_str(),
            });
        };
        let copy_started = Instant::now();
        let result = transfer_next(engine, config, self.allocator.as_ref());
        let copy_elapsed = copy_started.elapsed();

        match &result {
            Ok(DecodeOutcome::Frame(frame)) => {
                self.summary.decoded_frames += 1;
                tracing::debug!(timestamp = %frame.timestamp, dims = %frame.dims, "frame decoded");
            }
            Ok(DecodeOutcome::NeedsMoreData) => self.summary.needs_more_data += 1,
            Err(DecoderError::ContractViolation(message)) => {
                tracing::warn!(%message, "engine broke the negotiated output contract");
                self.summary.contract_violations += 1;
                self.state = SessionState::Error;
            }
            Err(err) => {
                tracing::warn!(%err, "{operation} failed");
                self.summary.decode_errors += 1;
            }
        }

        if self.report_metrics {
            tracing::info!(
                operation,
                submit_ms = submit_elapsed.as_secs_f64() * 1_000.0,
                copy_ms = copy_elapsed.as_secs_f64() * 1_000.0,
                frame = matches!(result, Ok(DecodeOutcome::Frame(_))),
                "decode call timing"
            );
        }
        result
    }

    fn active_engine(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut dyn DecodingEngine, DecoderError> {
        let state = self.state;
        match (state, self.engine.as_deref_mut()) {
            (SessionState::Initialized, Some(engine)) => Ok(engine),
            _ => Err(DecoderError::InvalidState {
                operation,
                state: state.as_str(),
            }),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> DecoderError {
        DecoderError::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }

    fn release_engine(&mut self) {
        // Dropping the box tears the native session down.
        self.engine = None;
    }
}

fn transfer_next(
    engine: &mut dyn DecodingEngine,
    config: &DecoderConfig,
    allocator: &dyn FrameAllocator,
) -> Result<DecodeOutcome, DecoderError> {
    let Some(picture) = engine.try_retrieve_picture().map_err(map_engine_error)? else {
        return Ok(DecodeOutcome::NeedsMoreData);
    };
    output::check_picture(config, &picture).map_err(DecoderError::ContractViolation)?;
    let mut buffer = allocator
        .allocate(picture.format, picture.dims)
        .map_err(map_alloc_error)?;
    transfer_picture(&picture, &mut buffer).map_err(map_copy_error)?;
    Ok(DecodeOutcome::Frame(DecodedFrame {
        format: picture.format,
        dims: picture.dims,
        timestamp: picture.timestamp,
        buffer,
    }))
}

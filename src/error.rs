use crate::contract::Codec;
use crate::transform::CopyError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(Codec),
    #[error("unsupported profile: {0}")]
    UnsupportedProfile(String),
    #[error("corrupt bitstream: {0}")]
    CorruptBitstream(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("engine error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("frame allocator exhausted: {in_flight}/{capacity} buffers in flight")]
    Exhausted { in_flight: usize, capacity: usize },
    #[error("invalid frame size: {0}")]
    InvalidSize(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error(transparent)]
    Engine(EngineError),
    #[error("resource exhaustion: {0}")]
    ResourceExhausted(AllocError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecoderError {
    #[error("configuration rejected: {0}")]
    ConfigurationRejected(String),
    #[error("decode error: {0}")]
    Decode(DecodeFailure),
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("{operation} is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl DecoderError {
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

pub(crate) fn map_configure_error(codec: Codec, error: EngineError) -> DecoderError {
    match error {
        EngineError::UnsupportedCodec(codec) => {
            DecoderError::ConfigurationRejected(format!("engine does not support {codec}"))
        }
        EngineError::UnsupportedProfile(message) => DecoderError::ConfigurationRejected(
            format!("engine rejected {codec} profile: {message}"),
        ),
        other => DecoderError::ConfigurationRejected(format!(
            "engine configuration for {codec} failed: {other}"
        )),
    }
}

pub(crate) fn map_engine_error(error: EngineError) -> DecoderError {
    DecoderError::Decode(DecodeFailure::Engine(error))
}

pub(crate) fn map_alloc_error(error: AllocError) -> DecoderError {
    DecoderError::Decode(DecodeFailure::ResourceExhausted(error))
}

// A short or misaligned source is the engine's fault; a destination that
// cannot hold the frame is treated as a failed allocation.
pub(crate) fn map_copy_error(error: CopyError) -> DecoderError {
    match error {
        CopyError::SourceTooShort { .. } => DecoderError::ContractViolation(error.to_string()),
        CopyError::DestinationTooShort { .. } | CopyError::StrideTooNarrow { .. } => {
            map_alloc_error(AllocError::InvalidSize(error.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_failures_become_rejections() {
        let err = map_configure_error(Codec::Vp9, EngineError::UnsupportedCodec(Codec::Vp9));
        assert_eq!(
            err,
            DecoderError::ConfigurationRejected("engine does not support vp9".to_string())
        );

        let err = map_configure_error(
            Codec::H264,
            EngineError::UnsupportedProfile("high 4:4:4".to_string()),
        );
        assert!(
            matches!(err, DecoderError::ConfigurationRejected(msg) if msg.contains("high 4:4:4"))
        );
    }

    #[test]
    fn allocation_failures_are_decode_errors_with_exhaustion_cause() {
        let err = map_alloc_error(AllocError::Exhausted {
            in_flight: 4,
            capacity: 4,
        });
        assert!(err.is_decode_error());
        assert!(matches!(
            err,
            DecoderError::Decode(DecodeFailure::ResourceExhausted(AllocError::Exhausted { .. }))
        ));
        assert_eq!(
            err.to_string(),
            "decode error: resource exhaustion: frame allocator exhausted: 4/4 buffers in flight"
        );
    }

    #[test]
    fn copy_failures_split_between_engine_and_allocator() {
        let source = map_copy_error(CopyError::SourceTooShort {
            plane: 0,
            len: 1,
            needed: 2,
        });
        assert!(matches!(source, DecoderError::ContractViolation(_)));

        let destination = map_copy_error(CopyError::DestinationTooShort {
            plane: 1,
            len: 1,
            needed: 2,
        });
        assert!(matches!(
            destination,
            DecoderError::Decode(DecodeFailure::ResourceExhausted(AllocError::InvalidSize(_)))
        ));
    }

    #[test]
    fn engine_failures_keep_their_cause() {
        let err = map_engine_error(EngineError::CorruptBitstream("bad slice".to_string()));
        assert_eq!(err.to_string(), "decode error: corrupt bitstream: bad slice");
    }
}

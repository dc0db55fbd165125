use std::collections::VecDeque;

use ffmpeg_next as ffmpeg;

use crate::contract::{
    Codec, DecodingEngine, Dimensions, EngineConfig, EngineFactory, Picture, PlaneRef, Timestamp,
    VideoFormat,
};
use crate::error::EngineError;

// libavcodec reads past the end of extradata in optimized bitstream readers.
const INPUT_PADDING: usize = ffmpeg::sys::AV_INPUT_BUFFER_PADDING_SIZE as usize;

fn codec_id(codec: Codec) -> ffmpeg::codec::Id {
    match codec {
        Codec::Vp8 => ffmpeg::codec::Id::VP8,
        Codec::Vp9 => ffmpeg::codec::Id::VP9,
        Codec::H264 => ffmpeg::codec::Id::H264,
        Codec::Hevc => ffmpeg::codec::Id::HEVC,
    }
}

fn is_again(err: &ffmpeg::Error) -> bool {
    matches!(
        err,
        ffmpeg::Error::Other {
            errno: ffmpeg::util::error::EAGAIN
        }
    )
}

fn map_decode_error(context: &str, err: ffmpeg::Error) -> EngineError {
    match err {
        ffmpeg::Error::InvalidData => EngineError::CorruptBitstream(format!("{context}: {err}")),
        ffmpeg::Error::PatchWelcome | ffmpeg::Error::Bug | ffmpeg::Error::Bug2 => {
            EngineError::UnsupportedProfile(format!("{context}: {err}"))
        }
        other => EngineError::Backend(format!("{context}: {other}")),
    }
}

fn open_decoder(config: &EngineConfig<'_>) -> Result<ffmpeg::decoder::Video, EngineError> {
    let codec = ffmpeg::codec::decoder::find(codec_id(config.codec))
        .ok_or(EngineError::UnsupportedCodec(config.codec))?;
    let mut context = ffmpeg::codec::context::Context::new_with_codec(codec);

    // Extra data and coded size must be in place before the codec is opened.
    unsafe {
        let raw = context.as_mut_ptr();
        (*raw).width = config.coded_size.width as i32;
        (*raw).height = config.coded_size.height as i32;
        if !config.extra_data.is_empty() {
            let len = config.extra_data.len();
            let buf = ffmpeg::sys::av_mallocz(len + INPUT_PADDING) as *mut u8;
            if buf.is_null() {
                return Err(EngineError::Backend(
                    "failed to allocate codec extra data".to_string(),
                ));
            }
            std::ptr::copy_nonoverlapping(config.extra_data.as_ptr(), buf, len);
            (*raw).extradata = buf;
            (*raw).extradata_size = len as i32;
        }
    }

    context
        .decoder()
        .video()
        .map_err(|err| map_decode_error("open decoder", err))
}

// Packets the decoder cannot take yet are kept in a backlog and resent
// whenever a picture is pulled, so a caller that retrieves one picture per
// submission never sees `EAGAIN`.
pub struct FfmpegEngine {
    codec: Codec,
    format: VideoFormat,
    decoder: Option<ffmpeg::decoder::Video>,
    backlog: VecDeque<ffmpeg::Packet>,
    eof_requested: bool,
    eof_sent: bool,
    frame: ffmpeg::frame::Video,
}

impl FfmpegEngine {
    #[must_use]
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            format: VideoFormat::I420,
            decoder: None,
            backlog: VecDeque::new(),
            eof_requested: false,
            eof_sent: false,
            frame: ffmpeg::frame::Video::empty(),
        }
    }

    fn decoder(&mut self) -> Result<&mut ffmpeg::decoder::Video, EngineError> {
        self.decoder
            .as_mut()
            .ok_or_else(|| EngineError::InvalidInput("engine is not configured".to_string()))
    }

    fn pump(&mut self) -> Result<(), EngineError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(());
        };
        while let Some(packet) = self.backlog.front() {
            match decoder.send_packet(packet) {
                Ok(()) => {
                    self.backlog.pop_front();
                }
                Err(err) if is_again(&err) => return Ok(()),
                Err(err) => {
                    self.backlog.pop_front();
                    return Err(map_decode_error("send_packet", err));
                }
            }
        }
        if self.eof_requested && !self.eof_sent {
            decoder
                .send_eof()
                .map_err(|err| map_decode_error("send_eof", err))?;
            self.eof_sent = true;
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<bool, EngineError> {
        let decoder = self.decoder()?;
        let mut frame = ffmpeg::frame::Video::empty();
        match decoder.receive_frame(&mut frame) {
            Ok(()) => {
                self.frame = frame;
                Ok(true)
            }
            Err(ffmpeg::Error::Eof) => Ok(false),
            Err(err) if is_again(&err) => Ok(false),
            Err(err) => Err(map_decode_error("receive_frame", err)),
        }
    }
}

impl DecodingEngine for FfmpegEngine {
    fn configure(&mut self, config: &EngineConfig<'_>) -> Result<(), EngineError> {
        if config.codec != self.codec {
            return Err(EngineError::UnsupportedCodec(config.codec));
        }
        self.decoder = Some(open_decoder(config)?);
        self.format = config.format;
        self.backlog.clear();
        self.eof_requested = false;
        self.eof_sent = false;
        tracing::debug!(
            codec = %config.codec,
            coded_size = %config.coded_size,
            "libavcodec decoder opened"
        );
        Ok(())
    }

    fn submit(&mut self, data: &[u8], timestamp: Timestamp) -> Result<(), EngineError> {
        self.decoder()?;
        let mut packet = ffmpeg::Packet::copy(data);
        packet.set_pts(Some(timestamp.0));
        self.backlog.push_back(packet);
        self.pump()
    }

    fn try_retrieve_picture(&mut self) -> Result<Option<Picture<'_>>, EngineError> {
        let mut received = self.receive()?;
        if !received && !self.backlog.is_empty() {
            self.pump()?;
            received = self.receive()?;
        }
        if !received {
            return Ok(None);
        }

        if self.frame.format() != ffmpeg::format::Pixel::YUV420P {
            return Err(EngineError::Backend(format!(
                "decoder produced {:?}, expected planar 4:2:0",
                self.frame.format()
            )));
        }
        let frame = &self.frame;
        let (u, v) = match self.format {
            VideoFormat::I420 => (1, 2),
            VideoFormat::Yv12 => (2, 1),
        };
        let plane = move |index: usize| PlaneRef {
            data: frame.data(index),
            stride: frame.stride(index),
        };
        Ok(Some(Picture {
            format: self.format,
            dims: Dimensions::new(frame.width(), frame.height()),
            timestamp: Timestamp(frame.pts().unwrap_or_default()),
            planes: [plane(0), plane(u), plane(v)],
        }))
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        self.decoder()?.flush();
        self.backlog.clear();
        self.eof_requested = false;
        self.eof_sent = false;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        self.decoder()?;
        self.eof_requested = true;
        self.pump()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegEngineFactory;

impl EngineFactory for FfmpegEngineFactory {
    fn create(&self, codec: Codec) -> Result<Box<dyn DecodingEngine>, EngineError> {
        ffmpeg::init().map_err(|err| EngineError::Backend(format!("ffmpeg init: {err}")))?;
        if ffmpeg::codec::decoder::find(codec_id(codec)).is_none() {
            return Err(EngineError::UnsupportedCodec(codec));
        }
        Ok(Box::new(FfmpegEngine::new(codec)))
    }
}

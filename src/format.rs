//! Media format descriptors for connector negotiation.
//!
//! A [`MediaFormat`] is the unit of negotiation between the connector and
//! its peer: a major type (video/audio), a subtype (the concrete encoding),
//! and an optional payload with the concrete stream geometry. The endpoint
//! never advertises formats of its own; it only validates what the peer
//! proposes against the expected pair it was configured with.

/// Major media type of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorType {
    /// A video stream.
    Video,
    /// An audio stream.
    Audio,
}

/// Concrete encoding of a stream within its major type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubType {
    /// 24-bit RGB.
    Rgb24,
    /// 32-bit RGB with padding byte.
    Rgb32,
    /// Packed 4:2:2 YUV (YUY2).
    Yuy2,
    /// Packed 4:2:2 YUV (UYVY).
    Uyvy,
    /// Semi-planar 4:2:0 YUV.
    Nv12,
    /// Planar 4:2:0 YUV.
    I420,
    /// Motion JPEG.
    Mjpeg,
    /// H.264 elementary stream.
    H264,
    /// Signed 16-bit PCM audio.
    PcmS16,
    /// 32-bit float PCM audio.
    PcmF32,
}

/// Video stream geometry carried in a format payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

/// Audio stream parameters carried in a format payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    /// Samples per second.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

/// Typed format payload attached to a [`MediaFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPayload {
    /// Video geometry.
    Video(VideoInfo),
    /// Audio parameters.
    Audio(AudioInfo),
}

/// A negotiable media format descriptor.
///
/// `major` and `sub` are optional because an outbound probe may leave them
/// unset ("any"); a descriptor recorded as negotiated always has both set.
/// Immutable once negotiated, except for the documented probe-while-connected
/// refresh in [`CapturePin::query_accept`](crate::pin::CapturePin::query_accept).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormat {
    /// Major media type, if constrained.
    pub major: Option<MajorType>,
    /// Encoding subtype, if constrained.
    pub sub: Option<SubType>,
    /// Concrete stream parameters, if supplied.
    pub payload: Option<FormatPayload>,
}

impl MediaFormat {
    /// A descriptor with both types set and no payload.
    pub fn new(major: MajorType, sub: SubType) -> Self {
        Self {
            major: Some(major),
            sub: Some(sub),
            payload: None,
        }
    }

    /// A fully unconstrained descriptor (used by outbound probes).
    pub fn untyped() -> Self {
        Self {
            major: None,
            sub: None,
            payload: None,
        }
    }

    /// A video descriptor with geometry payload.
    pub fn video(sub: SubType, width: u32, height: u32) -> Self {
        Self {
            major: Some(MajorType::Video),
            sub: Some(sub),
            payload: Some(FormatPayload::Video(VideoInfo { width, height })),
        }
    }

    /// An audio descriptor with parameter payload.
    pub fn audio(sub: SubType, sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            major: Some(MajorType::Audio),
            sub: Some(sub),
            payload: Some(FormatPayload::Audio(AudioInfo {
                sample_rate,
                channels,
                bits_per_sample,
            })),
        }
    }

    /// The video payload, if this descriptor carries one.
    #[inline]
    pub fn video_info(&self) -> Option<&VideoInfo> {
        match &self.payload {
            Some(FormatPayload::Video(info)) => Some(info),
            _ => None,
        }
    }

    /// The audio payload, if this descriptor carries one.
    #[inline]
    pub fn audio_info(&self) -> Option<&AudioInfo> {
        match &self.payload {
            Some(FormatPayload::Audio(info)) => Some(info),
            _ => None,
        }
    }
}

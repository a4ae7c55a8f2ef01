//! Media samples and the capture delivery callback.
//!
//! Samples are produced by the upstream peer on its own delivery thread and
//! pushed into the connector, which forwards them to the application's
//! [`SampleCallback`]. Buffer allocation belongs to the upstream allocator;
//! this crate only moves cheap handles around.

use crate::format::{MajorType, SubType};
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// A timestamped media sample delivered by the upstream producer.
///
/// The payload is a cheaply clonable byte handle; timestamps are stream
/// times relative to the segment start, absent when the producer did not
/// stamp the sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSample {
    data: Bytes,
    pts: Option<Duration>,
    duration: Option<Duration>,
}

impl MediaSample {
    /// Create a sample without timestamps.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pts: None,
            duration: None,
        }
    }

    /// Set the presentation timestamp.
    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Set the sample duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// The sample payload.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Presentation timestamp, if stamped.
    #[inline]
    pub fn pts(&self) -> Option<Duration> {
        self.pts
    }

    /// Sample duration, if stamped.
    #[inline]
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Callback invoked once per accepted sample.
///
/// Fire-and-forget from the connector's point of view: the connector reports
/// success to the producer regardless of what happens inside, so failures
/// must be handled by the callback itself. Invoked on the producer's
/// delivery thread; it should not block.
pub type SampleCallback = Box<dyn Fn(&MediaSample) + Send + Sync>;

/// Construction-time configuration of a capture endpoint.
///
/// Supplied by the application when the endpoint is created and immutable
/// afterward. The expected major/sub type pair is what the connector
/// validates every proposed format against.
pub struct CaptureConfig {
    /// Major media type the connector accepts.
    pub expected_major: MajorType,
    /// Encoding subtype the connector accepts.
    pub expected_sub: SubType,
    /// Per-sample delivery callback.
    pub callback: SampleCallback,
}

impl CaptureConfig {
    /// Bundle an expected type pair with a delivery callback.
    pub fn new(
        expected_major: MajorType,
        expected_sub: SubType,
        callback: impl Fn(&MediaSample) + Send + Sync + 'static,
    ) -> Self {
        Self {
            expected_major,
            expected_sub,
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("expected_major", &self.expected_major)
            .field("expected_sub", &self.expected_sub)
            .finish_non_exhaustive()
    }
}

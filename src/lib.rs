//! # capture-endpoint
//!
//! A pluggable capture endpoint for an externally owned, host-managed media
//! transport graph.
//!
//! The host's graph manager discovers the endpoint's single input connector,
//! negotiates a media format with it, drives the endpoint through its
//! lifecycle state machine, and streams timestamped samples into the
//! connector, which forwards them to an application-supplied callback. This
//! crate implements the protocol-glue side of that arrangement: connector
//! negotiation, lifecycle, reference-counted object lifetime, and the cursor
//! enumerators the protocol requires. Device capture, sample allocation, and
//! clock synchronization are external collaborators.
//!
//! ## Quick Start
//!
//! ```rust
//! use capture_endpoint::prelude::*;
//! use std::time::Duration;
//!
//! // Endpoint configured for RGB32 video, printing sample sizes.
//! let filter = CaptureFilter::new(CaptureConfig::new(
//!     MajorType::Video,
//!     SubType::Rgb32,
//!     |sample| println!("captured {} bytes", sample.len()),
//! ));
//!
//! // The host negotiates a format on the connector while stopped...
//! let peer = Retained::new(PeerConnector::new("camera-out"));
//! let format = MediaFormat::video(SubType::Rgb32, 640, 480);
//! filter
//!     .connector()
//!     .accept_connection(Some(&peer), Some(&format))?;
//!
//! // ...then runs the endpoint and streams samples from its own thread.
//! filter.run(Duration::ZERO);
//! filter.connector().receive(Some(&MediaSample::new(vec![0u8; 640 * 480 * 4])));
//! filter.stop();
//! # Ok::<(), capture_endpoint::Error>(())
//! ```
//!
//! ## Threading
//!
//! The component is passive: a control thread (the graph manager) drives
//! negotiation and lifecycle, while the producer's delivery thread pushes
//! samples concurrently. Reference counts and the lifecycle state are
//! atomic; negotiation state relies on the protocol's own guarantee that
//! connections are only made while the endpoint is stopped.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cursor;
pub mod error;
pub mod filter;
pub mod format;
pub mod host;
pub mod object;
pub mod pin;
pub mod sample;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cursor::{ConnectorCursor, CursorStatus, FormatCursor};
    pub use crate::error::{Error, Result};
    pub use crate::filter::{CaptureFilter, LifecycleState};
    pub use crate::format::{MajorType, MediaFormat, SubType};
    pub use crate::host::{HostGraph, PeerConnector, SampleAllocator};
    pub use crate::object::{CapabilityId, QueryCapability, Retained};
    pub use crate::pin::{CapturePin, Direction, DisconnectStatus};
    pub use crate::sample::{CaptureConfig, MediaSample, SampleCallback};
}

pub use error::{Error, Result};

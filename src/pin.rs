//! The input connector (pin) and its negotiation state machine.
//!
//! The connector is where the host's two-phase handshake lands: an outbound
//! probe ([`CapturePin::propose_connect`]) only tests acceptability, while
//! the peer-initiated [`CapturePin::accept_connection`] records the single
//! allowed connection and the negotiated format. Negotiation is permitted
//! only while the owning endpoint is stopped.
//!
//! Sample reception is the other half of the connector: the upstream
//! producer's delivery thread calls [`CapturePin::receive`] at any time, so
//! that path touches no locks and forwards straight to the application
//! callback.

use crate::cursor::FormatCursor;
use crate::error::{Error, Result};
use crate::filter::{CaptureFilter, LifecycleState};
use crate::format::{FormatPayload, MajorType, MediaFormat};
use crate::host::{AllocatorRequirements, PeerConnector, SampleAllocator};
use crate::object::{capability_not_found, CapabilityId, QueryCapability, Retained, Unowned};
use crate::sample::{CaptureConfig, MediaSample};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

/// Display name for a connector expecting video.
pub const VIDEO_PIN_NAME: &str = "Video Capture";
/// Display name for a connector expecting audio.
pub const AUDIO_PIN_NAME: &str = "Audio Capture";
/// Protocol identifier of the connector.
pub const PIN_ID: &str = "Capture Pin";

/// Direction of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Receives samples from upstream.
    Input,
    /// Sends samples downstream.
    Output,
}

/// Outcome of [`CapturePin::disconnect`].
///
/// Disconnecting an unconnected connector is a benign no-op, not an error;
/// repeated calls keep reporting [`DisconnectStatus::AlreadyDisconnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectStatus {
    /// A connection existed and was cleared.
    Disconnected,
    /// There was nothing to clear.
    AlreadyDisconnected,
}

/// Name, direction, and owner reported by [`CapturePin::info`].
#[derive(Debug)]
pub struct ConnectorInfo {
    /// Fixed display name, selected by the expected major type.
    pub name: &'static str,
    /// Always [`Direction::Input`] for this endpoint.
    pub direction: Direction,
    /// Acquired reference to the owning endpoint.
    pub endpoint: Option<Retained<CaptureFilter>>,
}

/// The established connection: peer handle plus negotiated format.
struct Connection {
    peer: Unowned<PeerConnector>,
    format: MediaFormat,
}

/// The endpoint's single input connector.
///
/// Created by [`CaptureFilter::new`] and owned by the endpoint for its whole
/// life. The back-reference to the endpoint is non-owning; host code holding
/// a connector reference must not use it past the endpoint's destruction.
pub struct CapturePin {
    config: CaptureConfig,
    owner: OnceLock<Unowned<CaptureFilter>>,
    connection: Mutex<Option<Connection>>,
}

impl CapturePin {
    pub(crate) fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            owner: OnceLock::new(),
            connection: Mutex::new(None),
        }
    }

    pub(crate) fn bind_owner(&self, owner: Unowned<CaptureFilter>) {
        let _ = self.owner.set(owner);
    }

    fn endpoint_state(&self) -> LifecycleState {
        match self.owner.get() {
            // SAFETY: the endpoint owns this connector, so it is alive
            // whenever the connector is usable.
            Some(owner) => unsafe { owner.get() }.lifecycle_state(),
            None => LifecycleState::Stopped,
        }
    }

    fn lock_connection(&self) -> std::sync::MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Negotiation
    // ------------------------------------------------------------------

    /// Outbound negotiation probe.
    ///
    /// Tests whether `format` would be acceptable without recording a peer
    /// or a format; establishing the connection is the peer-initiated
    /// [`CapturePin::accept_connection`]'s job. With no format the probe
    /// succeeds trivially (acceptance deferred to the inbound phase).
    pub fn propose_connect(
        &self,
        _peer: Option<&Retained<PeerConnector>>,
        format: Option<&MediaFormat>,
    ) -> Result<()> {
        if self.endpoint_state() != LifecycleState::Stopped {
            return Err(Error::NotStopped);
        }
        if self.lock_connection().is_some() {
            return Err(Error::AlreadyConnected);
        }
        let Some(format) = format else {
            return Ok(());
        };
        if format.major.is_some() && format.major != Some(self.config.expected_major) {
            return Err(Error::FormatRejected);
        }
        if format.major == Some(self.config.expected_major) && !self.is_valid_format(format) {
            return Err(Error::FormatRejected);
        }
        Ok(())
    }

    /// Inbound negotiation: record the single allowed connection.
    ///
    /// On success the peer is recorded as a non-owning handle (the host
    /// guarantees the peer outlives the connection) and `format` becomes the
    /// negotiated descriptor.
    pub fn accept_connection(
        &self,
        peer: Option<&Retained<PeerConnector>>,
        format: Option<&MediaFormat>,
    ) -> Result<()> {
        if self.endpoint_state() != LifecycleState::Stopped {
            return Err(Error::NotStopped);
        }
        let (Some(peer), Some(format)) = (peer, format) else {
            return Err(Error::NullArgument);
        };
        if self.lock_connection().is_some() {
            return Err(Error::AlreadyConnected);
        }
        if !self.query_accept(format) {
            return Err(Error::TypeNotAccepted);
        }

        *self.lock_connection() = Some(Connection {
            peer: Retained::downgrade(peer),
            format: *format,
        });
        tracing::debug!(peer = peer.name(), format = ?format, "connection accepted");
        Ok(())
    }

    /// Clear the connection, if any. Benign and idempotent; does not
    /// require the endpoint to be stopped.
    pub fn disconnect(&self) -> DisconnectStatus {
        match self.lock_connection().take() {
            Some(_) => {
                tracing::trace!("connector disconnected");
                DisconnectStatus::Disconnected
            }
            None => DisconnectStatus::AlreadyDisconnected,
        }
    }

    /// Acquired reference to the connected peer.
    pub fn connected_peer(&self) -> Result<Retained<PeerConnector>> {
        let connection = self.lock_connection();
        match connection.as_ref() {
            // SAFETY: the host keeps the peer alive while the connection
            // stands; `disconnect` clears the handle before the peer dies.
            Some(connection) => Ok(unsafe { connection.peer.upgrade() }),
            None => Err(Error::NotConnected),
        }
    }

    /// Copy of the negotiated format descriptor.
    pub fn negotiated_format(&self) -> Result<MediaFormat> {
        self.lock_connection()
            .as_ref()
            .map(|connection| connection.format)
            .ok_or(Error::NotConnected)
    }

    /// Validate a proposed format against the configured expectation.
    ///
    /// Rejects unless the endpoint is stopped, the major type matches, and
    /// the payload (if any) passes structural validation. While connected,
    /// an accepted probe silently refreshes the recorded negotiated format
    /// without renegotiating the peer link; callers relying on the recorded
    /// descriptor observe the refreshed value.
    pub fn query_accept(&self, format: &MediaFormat) -> bool {
        if self.endpoint_state() != LifecycleState::Stopped {
            return false;
        }
        if format.major != Some(self.config.expected_major) {
            return false;
        }
        if !self.is_valid_format(format) {
            return false;
        }

        if let Some(connection) = self.lock_connection().as_mut() {
            connection.format = *format;
        }
        true
    }

    /// Structural validation of a format payload.
    ///
    /// A payload-free descriptor is always structurally valid. A payload
    /// binds the descriptor to the exact expected major/sub pair, and video
    /// payloads must carry nonzero dimensions.
    fn is_valid_format(&self, format: &MediaFormat) -> bool {
        let Some(payload) = &format.payload else {
            return true;
        };
        if format.sub != Some(self.config.expected_sub)
            || format.major != Some(self.config.expected_major)
        {
            return false;
        }
        if self.config.expected_major == MajorType::Video {
            match payload {
                FormatPayload::Video(info) => {
                    if info.width == 0 || info.height == 0 {
                        return false;
                    }
                }
                FormatPayload::Audio(_) => return false,
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Name, direction, and an acquired owner reference.
    pub fn info(&self) -> ConnectorInfo {
        let name = match self.config.expected_major {
            MajorType::Video => VIDEO_PIN_NAME,
            MajorType::Audio => AUDIO_PIN_NAME,
        };
        ConnectorInfo {
            name,
            direction: Direction::Input,
            // SAFETY: the endpoint owns this connector and outlives its use.
            endpoint: self.owner.get().map(|owner| unsafe { owner.upgrade() }),
        }
    }

    /// The connector's direction: always input.
    #[inline]
    pub fn direction(&self) -> Direction {
        Direction::Input
    }

    /// The connector's protocol identifier.
    #[inline]
    pub fn id(&self) -> &'static str {
        PIN_ID
    }

    /// A cursor over advertised formats; this endpoint advertises none.
    pub fn enumerate_formats(this: &Retained<Self>) -> Result<Retained<FormatCursor>> {
        Ok(FormatCursor::new(Retained::downgrade(this)))
    }

    /// Internal connection queries are not supported.
    pub fn internal_connections(&self) -> Result<Vec<Retained<CapturePin>>> {
        Err(Error::NotSupported)
    }

    // ------------------------------------------------------------------
    // Stream control (protocol surface, all no-ops)
    // ------------------------------------------------------------------

    /// Enter flushing. No-op.
    pub fn begin_flush(&self) {}

    /// Leave flushing. No-op; also called by the endpoint's `stop`.
    pub fn end_flush(&self) {}

    /// End-of-stream notification. No-op.
    pub fn end_of_stream(&self) {}

    /// New-segment notification. No-op.
    pub fn new_segment(&self, _start: Duration, _stop: Duration, _rate: f64) {}

    // ------------------------------------------------------------------
    // Allocator negotiation
    // ------------------------------------------------------------------

    /// The endpoint refuses to supply its own allocator.
    pub fn allocator(&self) -> Result<Retained<SampleAllocator>> {
        Err(Error::NoAllocator)
    }

    /// Acknowledge the allocator the upstream peer decided to use.
    pub fn notify_allocator(&self, _allocator: &Retained<SampleAllocator>, _read_only: bool) {}

    /// The endpoint states no allocator requirements.
    pub fn allocator_requirements(&self) -> Result<AllocatorRequirements> {
        Err(Error::NotSupported)
    }

    // ------------------------------------------------------------------
    // Sample delivery
    // ------------------------------------------------------------------

    /// Forward a sample to the application callback.
    ///
    /// Called from the producer's delivery thread, potentially concurrently
    /// with control-thread queries; takes no locks and never blocks. Absent
    /// samples are ignored, and callback outcomes are not surfaced.
    pub fn receive(&self, sample: Option<&MediaSample>) {
        if let Some(sample) = sample {
            (self.config.callback)(sample);
        }
    }

    /// Forward a batch in order, reporting the full count as processed.
    pub fn receive_batch(&self, samples: &[MediaSample]) -> usize {
        for sample in samples {
            self.receive(Some(sample));
        }
        samples.len()
    }

    /// The producing thread must not expect this connector to block.
    #[inline]
    pub fn receive_can_block(&self) -> bool {
        false
    }
}

/// Typed capability views of the connector.
#[derive(Debug)]
pub enum PinCapability {
    /// The base shared-object view.
    Object(Retained<CapturePin>),
    /// The negotiation view.
    Connector(Retained<CapturePin>),
    /// The sample-reception view.
    SampleInput(Retained<CapturePin>),
}

impl QueryCapability for CapturePin {
    type Capability = PinCapability;

    fn query_capability(this: &Retained<Self>, id: CapabilityId) -> Result<PinCapability> {
        match id {
            CapabilityId::Object => Ok(PinCapability::Object(Retained::clone(this))),
            CapabilityId::Connector => Ok(PinCapability::Connector(Retained::clone(this))),
            CapabilityId::SampleInput => Ok(PinCapability::SampleInput(Retained::clone(this))),
            other => capability_not_found(other),
        }
    }
}

impl std::fmt::Debug for CapturePin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePin")
            .field("config", &self.config)
            .field("connected", &self.lock_connection().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SubType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn video_filter() -> Retained<CaptureFilter> {
        CaptureFilter::new(CaptureConfig::new(MajorType::Video, SubType::Rgb32, |_| {}))
    }

    fn rgb32_640x480() -> MediaFormat {
        MediaFormat::video(SubType::Rgb32, 640, 480)
    }

    fn peer() -> Retained<PeerConnector> {
        Retained::new(PeerConnector::new("upstream"))
    }

    #[test]
    fn accept_requires_stopped_state() {
        let filter = video_filter();
        let peer = peer();
        let format = rgb32_640x480();

        filter.run(Duration::ZERO);
        assert_eq!(
            filter
                .connector()
                .accept_connection(Some(&peer), Some(&format)),
            Err(Error::NotStopped)
        );
        filter.pause();
        assert_eq!(
            filter
                .connector()
                .accept_connection(Some(&peer), Some(&format)),
            Err(Error::NotStopped)
        );
        // Nothing was recorded by the failed attempts.
        assert_eq!(
            filter.connector().connected_peer().unwrap_err(),
            Error::NotConnected
        );
    }

    #[test]
    fn accept_requires_both_arguments() {
        let filter = video_filter();
        let peer = peer();
        let format = rgb32_640x480();

        assert_eq!(
            filter.connector().accept_connection(None, Some(&format)),
            Err(Error::NullArgument)
        );
        assert_eq!(
            filter.connector().accept_connection(Some(&peer), None),
            Err(Error::NullArgument)
        );
        assert_eq!(
            filter.connector().accept_connection(None, None),
            Err(Error::NullArgument)
        );
    }

    #[test]
    fn accept_records_connection_once() {
        let filter = video_filter();
        let peer = peer();
        let format = rgb32_640x480();

        filter
            .connector()
            .accept_connection(Some(&peer), Some(&format))
            .expect("first accept");
        assert_eq!(filter.connector().negotiated_format(), Ok(format));

        // The recorded peer handle is non-owning.
        assert_eq!(Retained::reference_count(&peer), 1);
        let connected = filter.connector().connected_peer().expect("peer");
        assert!(Retained::ptr_eq(&connected, &peer));
        assert_eq!(Retained::reference_count(&peer), 2);
        drop(connected);

        assert_eq!(
            filter
                .connector()
                .accept_connection(Some(&peer), Some(&format)),
            Err(Error::AlreadyConnected)
        );
    }

    #[test]
    fn accept_rejects_wrong_major_type() {
        let filter = video_filter();
        let peer = peer();
        let audio = MediaFormat::audio(SubType::PcmS16, 48_000, 2, 16);

        assert_eq!(
            filter
                .connector()
                .accept_connection(Some(&peer), Some(&audio)),
            Err(Error::TypeNotAccepted)
        );
    }

    #[test]
    fn query_accept_rejects_degenerate_video() {
        let filter = video_filter();
        let connector = filter.connector();

        assert!(!connector.query_accept(&MediaFormat::video(SubType::Rgb32, 0, 480)));
        assert!(!connector.query_accept(&MediaFormat::video(SubType::Rgb32, 640, 0)));
        assert!(connector.query_accept(&rgb32_640x480()));
    }

    #[test]
    fn query_accept_rejects_wrong_subtype_payload() {
        let filter = video_filter();
        assert!(!filter
            .connector()
            .query_accept(&MediaFormat::video(SubType::Nv12, 640, 480)));
    }

    #[test]
    fn query_accept_without_payload_checks_major_only() {
        let filter = video_filter();
        assert!(filter
            .connector()
            .query_accept(&MediaFormat::new(MajorType::Video, SubType::Nv12)));
    }

    #[test]
    fn query_accept_rejects_unless_stopped() {
        let filter = video_filter();
        filter.run(Duration::ZERO);
        assert!(!filter.connector().query_accept(&rgb32_640x480()));
        filter.stop();
        assert!(filter.connector().query_accept(&rgb32_640x480()));
    }

    #[test]
    fn query_accept_refreshes_format_while_connected() {
        let filter = video_filter();
        let peer = peer();

        filter
            .connector()
            .accept_connection(Some(&peer), Some(&rgb32_640x480()))
            .expect("accept");

        let probed = MediaFormat::video(SubType::Rgb32, 1920, 1080);
        assert!(filter.connector().query_accept(&probed));

        // Probing while connected refreshed the recorded descriptor without
        // touching the peer link.
        assert_eq!(filter.connector().negotiated_format(), Ok(probed));
        let connected = filter.connector().connected_peer().expect("peer");
        assert!(Retained::ptr_eq(&connected, &peer));
    }

    #[test]
    fn propose_requires_stopped_and_unconnected() {
        let filter = video_filter();
        let peer = peer();

        filter.pause();
        assert_eq!(
            filter.connector().propose_connect(Some(&peer), None),
            Err(Error::NotStopped)
        );
        filter.stop();

        filter
            .connector()
            .accept_connection(Some(&peer), Some(&rgb32_640x480()))
            .expect("accept");
        assert_eq!(
            filter.connector().propose_connect(Some(&peer), None),
            Err(Error::AlreadyConnected)
        );
    }

    #[test]
    fn propose_is_only_a_probe() {
        let filter = video_filter();
        let peer = peer();

        // No format: trivially acceptable, acceptance deferred.
        filter
            .connector()
            .propose_connect(Some(&peer), None)
            .expect("deferred probe");

        // Unset major type passes the probe.
        filter
            .connector()
            .propose_connect(Some(&peer), Some(&MediaFormat::untyped()))
            .expect("untyped probe");

        // Acceptable format acknowledged, still nothing recorded.
        filter
            .connector()
            .propose_connect(Some(&peer), Some(&rgb32_640x480()))
            .expect("acceptable probe");
        assert_eq!(
            filter.connector().connected_peer().unwrap_err(),
            Error::NotConnected
        );
        assert_eq!(
            filter.connector().negotiated_format().unwrap_err(),
            Error::NotConnected
        );
    }

    #[test]
    fn propose_soft_rejects_bad_formats() {
        let filter = video_filter();
        let peer = peer();

        let audio = MediaFormat::audio(SubType::PcmS16, 48_000, 2, 16);
        assert_eq!(
            filter.connector().propose_connect(Some(&peer), Some(&audio)),
            Err(Error::FormatRejected)
        );

        let degenerate = MediaFormat::video(SubType::Rgb32, 0, 0);
        assert_eq!(
            filter
                .connector()
                .propose_connect(Some(&peer), Some(&degenerate)),
            Err(Error::FormatRejected)
        );
    }

    #[test]
    fn disconnect_is_benign_and_idempotent() {
        let filter = video_filter();
        let peer = peer();

        assert_eq!(
            filter.connector().disconnect(),
            DisconnectStatus::AlreadyDisconnected
        );

        filter
            .connector()
            .accept_connection(Some(&peer), Some(&rgb32_640x480()))
            .expect("accept");
        // Disconnect does not require the stopped state.
        filter.run(Duration::ZERO);
        assert_eq!(filter.connector().disconnect(), DisconnectStatus::Disconnected);
        assert_eq!(
            filter.connector().disconnect(),
            DisconnectStatus::AlreadyDisconnected
        );
        assert_eq!(
            filter.connector().connected_peer().unwrap_err(),
            Error::NotConnected
        );
    }

    #[test]
    fn receive_forwards_present_samples_only() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let filter = CaptureFilter::new(CaptureConfig::new(
            MajorType::Video,
            SubType::Rgb32,
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        ));

        filter.connector().receive(None);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let sample = MediaSample::new(vec![0_u8; 16]);
        filter.connector().receive(Some(&sample));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn receive_batch_preserves_order_and_count() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let filter = CaptureFilter::new(CaptureConfig::new(
            MajorType::Video,
            SubType::Rgb32,
            move |sample: &MediaSample| {
                sink.lock().unwrap().push(sample.data().clone());
            },
        ));

        let samples = [
            MediaSample::new(&b"s1"[..]),
            MediaSample::new(&b"s2"[..]),
            MediaSample::new(&b"s3"[..]),
        ];
        let processed = filter.connector().receive_batch(&samples);
        assert_eq!(processed, 3);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[&b"s1"[..], &b"s2"[..], &b"s3"[..]]);
    }

    #[test]
    fn allocator_surface_refuses_politely() {
        let filter = video_filter();
        let connector = filter.connector();

        assert_eq!(connector.allocator().unwrap_err(), Error::NoAllocator);
        assert_eq!(
            connector.allocator_requirements().unwrap_err(),
            Error::NotSupported
        );
        let upstream = Retained::new(SampleAllocator::new());
        connector.notify_allocator(&upstream, true);
        assert!(!connector.receive_can_block());
    }

    #[test]
    fn info_selects_name_by_expected_major() {
        let video = video_filter();
        let info = video.connector().info();
        assert_eq!(info.name, VIDEO_PIN_NAME);
        assert_eq!(info.direction, Direction::Input);
        let owner = info.endpoint.expect("owner reference");
        assert!(Retained::ptr_eq(&owner, &video));

        let audio = CaptureFilter::new(CaptureConfig::new(
            MajorType::Audio,
            SubType::PcmS16,
            |_| {},
        ));
        assert_eq!(audio.connector().info().name, AUDIO_PIN_NAME);
        assert_eq!(audio.connector().id(), PIN_ID);
        assert_eq!(audio.connector().direction(), Direction::Input);
    }

    #[test]
    fn stream_control_surface_is_a_no_op() {
        let filter = video_filter();
        let connector = filter.connector();
        connector.begin_flush();
        connector.end_flush();
        connector.end_of_stream();
        connector.new_segment(Duration::ZERO, Duration::from_secs(1), 1.0);
        assert_eq!(
            connector.internal_connections().unwrap_err(),
            Error::NotSupported
        );
    }

    #[test]
    fn capability_dispatch_matches_exactly_once() {
        let filter = video_filter();
        let connector = Retained::clone(filter.connector());

        match CapturePin::query_capability(&connector, CapabilityId::SampleInput) {
            Ok(PinCapability::SampleInput(handle)) => {
                assert!(Retained::ptr_eq(&handle, &connector));
            }
            other => panic!("wrong capability resolution: {other:?}"),
        }

        assert_eq!(
            CapturePin::query_capability(&connector, CapabilityId::Endpoint).unwrap_err(),
            Error::CapabilityNotFound(CapabilityId::Endpoint)
        );
    }
}

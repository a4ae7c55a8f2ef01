//! The capture endpoint (filter) and its lifecycle state machine.
//!
//! The endpoint owns the single input connector, answers graph-membership
//! and state queries from the host's control thread, and gates connector
//! negotiation through its lifecycle state. All transitions are
//! unconditional: the host decides when to move, the endpoint only records.

use crate::cursor::ConnectorCursor;
use crate::error::{Error, Result};
use crate::host::{HostGraph, ReferenceClock};
use crate::object::{capability_not_found, CapabilityId, QueryCapability, Retained, Unowned};
use crate::pin::CapturePin;
use crate::sample::CaptureConfig;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Display name the endpoint reports to the host.
pub const FILTER_NAME: &str = "Capture Filter";

// ============================================================================
// Lifecycle state
// ============================================================================

/// Lifecycle state of the endpoint.
///
/// Mutated only by the host's explicit transition calls ([`CaptureFilter::stop`],
/// [`CaptureFilter::pause`], [`CaptureFilter::run`]). The connector reads it
/// to gate negotiation; connections may only be made or probed while
/// `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Not streaming; negotiation permitted.
    Stopped = 0,
    /// Prepared but not consuming stream time.
    Paused = 1,
    /// Streaming; samples are expected on the delivery thread.
    Running = 2,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Paused,
            2 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Graph-membership and display information reported by the endpoint.
#[derive(Debug)]
pub struct EndpointInfo {
    /// Fixed display name of the endpoint.
    pub name: &'static str,
    /// Acquired reference to the joined graph, if any.
    pub graph: Option<Retained<HostGraph>>,
}

/// The pluggable capture endpoint.
///
/// Created with [`CaptureFilter::new`], which also creates the single owned
/// connector and binds its back-reference. The state field is atomic because
/// the delivery thread reads it (through the connector) while the control
/// thread transitions it; everything else follows the protocol's invariant
/// that negotiation only happens while stopped.
pub struct CaptureFilter {
    state: AtomicU8,
    pin: Retained<CapturePin>,
    graph: Mutex<Option<Unowned<HostGraph>>>,
}

impl CaptureFilter {
    /// Create an endpoint together with its input connector.
    ///
    /// The connector lives exactly as long as the endpoint holds it; the
    /// connector's back-reference to the endpoint is non-owning, so host
    /// code must not use a connector reference past the endpoint's death.
    pub fn new(config: CaptureConfig) -> Retained<Self> {
        let pin = Retained::new(CapturePin::new(config));
        let filter = Retained::new(Self {
            state: AtomicU8::new(LifecycleState::Stopped as u8),
            pin,
            graph: Mutex::new(None),
        });
        filter.pin.bind_owner(Retained::downgrade(&filter));
        filter
    }

    /// Current lifecycle state.
    ///
    /// The protocol allows callers to pass a wait budget for filters whose
    /// transitions are asynchronous; this endpoint transitions immediately,
    /// so the wait is accepted and ignored.
    pub fn state(&self, _wait: Duration) -> LifecycleState {
        self.lifecycle_state()
    }

    #[inline]
    pub(crate) fn lifecycle_state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, next: LifecycleState) {
        self.state.store(next as u8, Ordering::Release);
        tracing::debug!(state = ?next, "endpoint lifecycle transition");
    }

    /// Stop streaming: flush the connector, then record `Stopped`.
    ///
    /// Safe to call at any time; never waits for in-flight deliveries.
    pub fn stop(&self) {
        self.pin.end_flush();
        self.transition(LifecycleState::Stopped);
    }

    /// Record `Paused`. No validation that a connection exists.
    pub fn pause(&self) {
        self.transition(LifecycleState::Paused);
    }

    /// Record `Running` from the given stream start time.
    ///
    /// The start time is the host's concern; the endpoint does not schedule
    /// against it.
    pub fn run(&self, _start: Duration) {
        self.transition(LifecycleState::Running);
    }

    /// The endpoint's single input connector.
    #[inline]
    pub fn connector(&self) -> &Retained<CapturePin> {
        &self.pin
    }

    /// A fresh cursor over the endpoint's connectors (exactly one).
    ///
    /// `OutOfMemory` is reserved for cursor-allocation failure.
    pub fn enumerate_connectors(this: &Retained<Self>) -> Result<Retained<ConnectorCursor>> {
        Ok(ConnectorCursor::new(Retained::downgrade(this)))
    }

    /// Lookup of connectors by identifier is not supported.
    pub fn find_connector(&self, _id: &str) -> Result<Retained<CapturePin>> {
        Err(Error::NotSupported)
    }

    /// Display name and current graph membership.
    ///
    /// Acquires a reference to the joined graph for the caller, if present.
    pub fn query_info(&self) -> EndpointInfo {
        let graph = self
            .graph
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            // SAFETY: the host keeps the graph alive while the endpoint is
            // joined to it; membership is cleared before the graph dies.
            .map(|graph| unsafe { graph.upgrade() });
        EndpointInfo {
            name: FILTER_NAME,
            graph,
        }
    }

    /// Record (or clear) graph membership.
    ///
    /// The stored reference is non-owning; the host must keep the graph
    /// alive while the endpoint is joined and leave (pass `None`) before
    /// releasing it. The name argument is ignored.
    pub fn join_graph(&self, graph: Option<&Retained<HostGraph>>, _name: &str) {
        let mut slot = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = graph.map(Retained::downgrade);
        tracing::trace!(joined = graph.is_some(), "graph membership updated");
    }

    /// Vendor information is not supported.
    pub fn vendor_info(&self) -> Result<&'static str> {
        Err(Error::NotSupported)
    }

    /// Persistent class identification is not supported.
    pub fn class_id(&self) -> Result<[u8; 16]> {
        Err(Error::NotSupported)
    }

    /// Accept (and ignore) a reference clock offered by the host.
    pub fn set_sync_source(&self, _clock: Option<&Retained<ReferenceClock>>) {}

    /// The endpoint never drives a clock of its own.
    pub fn sync_source(&self) -> Option<Retained<ReferenceClock>> {
        None
    }
}

impl std::fmt::Debug for CaptureFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFilter")
            .field("state", &self.lifecycle_state())
            .field("pin", &self.pin)
            .finish()
    }
}

/// Typed capability views of the endpoint.
#[derive(Debug)]
pub enum FilterCapability {
    /// The base shared-object view.
    Object(Retained<CaptureFilter>),
    /// The persistence view.
    Persist(Retained<CaptureFilter>),
    /// The lifecycle-control view.
    MediaControl(Retained<CaptureFilter>),
    /// The graph-membership view.
    Endpoint(Retained<CaptureFilter>),
}

impl QueryCapability for CaptureFilter {
    type Capability = FilterCapability;

    fn query_capability(this: &Retained<Self>, id: CapabilityId) -> Result<FilterCapability> {
        match id {
            CapabilityId::Object => Ok(FilterCapability::Object(Retained::clone(this))),
            CapabilityId::Persist => Ok(FilterCapability::Persist(Retained::clone(this))),
            CapabilityId::MediaControl => Ok(FilterCapability::MediaControl(Retained::clone(this))),
            CapabilityId::Endpoint => Ok(FilterCapability::Endpoint(Retained::clone(this))),
            other => capability_not_found(other),
        }
    }
}

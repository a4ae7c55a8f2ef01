//! Opaque host-side collaborators.
//!
//! The endpoint references these objects but never owns or inspects them:
//! the peer connector that delivers samples, the graph manager the endpoint
//! joins, and the upstream sample allocator. They exist here so the protocol
//! surface has concrete types to exchange; their behavior lives entirely on
//! the host side.

/// The upstream peer connector on the other side of a connection.
///
/// Recorded by the capture connector as a non-owning handle while connected.
/// The host guarantees the peer outlives the connection.
#[derive(Debug)]
pub struct PeerConnector {
    name: String,
}

impl PeerConnector {
    /// Create a peer connector with a diagnostic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The peer's diagnostic name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The host's graph manager object.
///
/// The endpoint records membership as a non-owning reference; the host
/// guarantees the graph outlives the membership.
#[derive(Debug)]
pub struct HostGraph {
    name: String,
}

impl HostGraph {
    /// Create a graph object with a diagnostic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The graph's diagnostic name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A reference clock the host may offer the endpoint.
///
/// Clock synchronization is external: the endpoint accepts the offer and
/// ignores it, and never reports a clock of its own.
#[derive(Debug, Default)]
pub struct ReferenceClock;

impl ReferenceClock {
    /// Create a clock stand-in.
    pub fn new() -> Self {
        Self
    }
}

/// An upstream sample allocator the connector can be notified of.
///
/// The capture endpoint never supplies an allocator of its own; it only
/// acknowledges the one the upstream peer decides to use.
#[derive(Debug, Default)]
pub struct SampleAllocator;

impl SampleAllocator {
    /// Create an allocator stand-in.
    pub fn new() -> Self {
        Self
    }
}

/// Buffer requirements an input connector could demand from an allocator.
///
/// This endpoint never states requirements (the query is unsupported); the
/// type exists so the protocol surface is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocatorRequirements {
    /// Number of buffers.
    pub buffers: u32,
    /// Size of each buffer in bytes.
    pub buffer_size: u32,
    /// Required buffer alignment.
    pub alignment: u32,
    /// Prefix bytes before each buffer.
    pub prefix: u32,
}

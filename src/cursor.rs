//! Cursor enumerators handed out by the protocol surface.
//!
//! Two minimal, independently reference-counted iterator objects: a cursor
//! over the endpoint's connectors (exactly one item) and a cursor over a
//! connector's advertised formats (zero items; the endpoint only validates
//! proposals, it never advertises). Both hold only a non-owning pointer to
//! the object they enumerate and are created fresh per query call.

use crate::error::Result;
use crate::filter::CaptureFilter;
use crate::format::MediaFormat;
use crate::object::{capability_not_found, CapabilityId, QueryCapability, Retained, Unowned};
use crate::pin::CapturePin;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Soft completion status of a cursor operation. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStatus {
    /// The request was satisfied in full.
    Complete,
    /// Fewer items than requested remained, or a skip moved past the end.
    Exhausted,
}

// ============================================================================
// Connector cursor
// ============================================================================

/// Cursor over an endpoint's connectors.
///
/// This endpoint has exactly one connector, so the position is effectively
/// 0 or 1. Fetched items are acquired references.
pub struct ConnectorCursor {
    filter: Unowned<CaptureFilter>,
    position: AtomicUsize,
}

impl ConnectorCursor {
    pub(crate) fn new(filter: Unowned<CaptureFilter>) -> Retained<Self> {
        Self::at_position(filter, 0)
    }

    fn at_position(filter: Unowned<CaptureFilter>, position: usize) -> Retained<Self> {
        Retained::new(Self {
            filter,
            position: AtomicUsize::new(position),
        })
    }

    /// Fetch up to `count` connectors from the current position.
    ///
    /// Advances by the number fetched. Reports [`CursorStatus::Complete`]
    /// only when exactly `count` items were fetched.
    pub fn next(&self, count: usize) -> (SmallVec<[Retained<CapturePin>; 1]>, CursorStatus) {
        let mut fetched = SmallVec::new();
        if count > 0
            && self
                .position
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            // SAFETY: the host keeps the endpoint alive while it enumerates
            // the endpoint's connectors.
            let filter = unsafe { self.filter.get() };
            fetched.push(Retained::clone(filter.connector()));
        }
        let status = if fetched.len() == count {
            CursorStatus::Complete
        } else {
            CursorStatus::Exhausted
        };
        (fetched, status)
    }

    /// Advance the position by `count`, then check it.
    ///
    /// The position advances unconditionally; the status only reports
    /// whether it ended up past the single valid slot. A skip that
    /// overshoots therefore leaves the cursor overshot rather than clamped.
    pub fn skip(&self, count: usize) -> CursorStatus {
        let position = self.position.fetch_add(count, Ordering::AcqRel) + count;
        if position > 1 {
            CursorStatus::Exhausted
        } else {
            CursorStatus::Complete
        }
    }

    /// Rewind to the first connector.
    pub fn reset(&self) {
        self.position.store(0, Ordering::Release);
    }

    /// A new, pre-referenced cursor over the same endpoint, starting at the
    /// current position.
    pub fn clone_cursor(&self) -> Result<Retained<Self>> {
        Ok(Self::at_position(
            self.filter,
            self.position.load(Ordering::Acquire),
        ))
    }
}

/// Typed capability views of a connector cursor.
#[derive(Debug)]
pub enum ConnectorCursorCapability {
    /// The base shared-object view.
    Object(Retained<ConnectorCursor>),
    /// The cursor view itself.
    Cursor(Retained<ConnectorCursor>),
}

impl QueryCapability for ConnectorCursor {
    type Capability = ConnectorCursorCapability;

    fn query_capability(
        this: &Retained<Self>,
        id: CapabilityId,
    ) -> Result<ConnectorCursorCapability> {
        match id {
            CapabilityId::Object => Ok(ConnectorCursorCapability::Object(Retained::clone(this))),
            CapabilityId::ConnectorCursor => {
                Ok(ConnectorCursorCapability::Cursor(Retained::clone(this)))
            }
            other => capability_not_found(other),
        }
    }
}

impl std::fmt::Debug for ConnectorCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorCursor")
            .field("position", &self.position.load(Ordering::Relaxed))
            .finish()
    }
}

// ============================================================================
// Format cursor
// ============================================================================

/// Cursor over a connector's advertised formats.
///
/// Always empty: the endpoint advertises no format list and only validates
/// what the peer proposes.
pub struct FormatCursor {
    pin: Unowned<CapturePin>,
}

impl FormatCursor {
    pub(crate) fn new(pin: Unowned<CapturePin>) -> Retained<Self> {
        Retained::new(Self { pin })
    }

    /// Fetch formats: there are never any to fetch.
    pub fn next(&self, _count: usize) -> (SmallVec<[MediaFormat; 1]>, CursorStatus) {
        (SmallVec::new(), CursorStatus::Exhausted)
    }

    /// Skip formats: always past the end.
    pub fn skip(&self, _count: usize) -> CursorStatus {
        CursorStatus::Exhausted
    }

    /// Rewind. Nothing to rewind, always succeeds.
    pub fn reset(&self) {}

    /// A fresh, pre-referenced cursor over the same connector.
    pub fn clone_cursor(&self) -> Result<Retained<Self>> {
        Ok(Self::new(self.pin))
    }
}

/// Typed capability views of a format cursor.
#[derive(Debug)]
pub enum FormatCursorCapability {
    /// The base shared-object view.
    Object(Retained<FormatCursor>),
    /// The cursor view itself.
    Cursor(Retained<FormatCursor>),
}

impl QueryCapability for FormatCursor {
    type Capability = FormatCursorCapability;

    fn query_capability(this: &Retained<Self>, id: CapabilityId) -> Result<FormatCursorCapability> {
        match id {
            CapabilityId::Object => Ok(FormatCursorCapability::Object(Retained::clone(this))),
            CapabilityId::FormatCursor => Ok(FormatCursorCapability::Cursor(Retained::clone(this))),
            other => capability_not_found(other),
        }
    }
}

impl std::fmt::Debug for FormatCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatCursor").finish()
    }
}

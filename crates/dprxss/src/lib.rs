//! Interrupt dispatch and callback registration for a DisplayPort RX
//! subsystem.

/// Error taxonomy and numeric status values.
pub mod error;
pub use error::{
    status_of, Collaborator, DispatchError, Precondition, XST_INVALID_PARAM, XST_PRECONDITION,
    XST_SUCCESS,
};

/// Closed event taxonomy and handler routing table.
pub mod event;
pub use event::{
    CipherHandler, EventKind, HandlerRoute, LocalSlot, RxInterrupt, EVENT_KIND_COUNT,
    FIRST_HANDLER_TYPE,
};

/// Collaborator contracts and callback types.
pub mod api;
pub use api::{
    Absent, Callback, DpRxEngine, HdcpCipher, InterruptSource, TimerCounter, TimerHandler,
};

/// Subsystem instance handle.
pub mod subsystem;
pub use subsystem::{ComponentState, DpRxSs, DpRxSsConfig};

#[cfg(test)]
use proptest as _;

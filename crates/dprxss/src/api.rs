//! Collaborator contracts consumed by the subsystem.
//!
//! The RX engine, HDCP cipher and timer counter are owned by their own
//! drivers. The subsystem only installs handlers into them and forwards
//! interrupts to their service routines.

use crate::{CipherHandler, RxInterrupt};

/// Event handler with its context captured by the closure.
pub type Callback = Box<dyn FnMut() + Send + 'static>;

/// Custom delay hook invoked with a duration in microseconds.
pub type TimerHandler = Box<dyn FnMut(u32) + Send + 'static>;

/// DisplayPort RX interrupt engine.
pub trait DpRxEngine {
    /// Installs the handler for one RX interrupt event, replacing any
    /// previous handler for that event.
    fn set_interrupt_handler(&mut self, event: RxInterrupt, handler: Callback);

    /// Installs the custom delay/sleep hook used by the engine.
    fn set_user_timer_handler(&mut self, handler: TimerHandler);

    /// Services a pending engine interrupt.
    fn interrupt_handler(&mut self);
}

/// HDCP cipher engine.
pub trait HdcpCipher {
    /// Installs a handler for a cipher handler reason.
    fn set_callback(&mut self, reason: CipherHandler, handler: Callback);

    /// Services a pending cipher interrupt.
    fn cipher_intr_handler(&mut self);
}

/// Timer counter peripheral.
pub trait TimerCounter {
    /// Services a pending timer interrupt.
    fn interrupt_handler(&mut self);
}

/// Interrupt lines the subsystem can forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InterruptSource {
    /// RX engine interrupt line.
    Dp,
    /// HDCP cipher interrupt line.
    Hdcp,
    /// Timer counter interrupt line.
    TimerCounter,
}

/// Placeholder collaborator for subsystems built without a cipher or timer.
///
/// Its service routines are never reachable because the handle stores it as
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absent {}

impl HdcpCipher for Absent {
    fn set_callback(&mut self, _reason: CipherHandler, _handler: Callback) {
        match *self {}
    }

    fn cipher_intr_handler(&mut self) {
        match *self {}
    }
}

impl TimerCounter for Absent {
    fn interrupt_handler(&mut self) {
        match *self {}
    }
}

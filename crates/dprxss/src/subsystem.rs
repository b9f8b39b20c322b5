//! DisplayPort RX subsystem instance: handler registration and interrupt
//! forwarding.

use std::fmt;

use crate::{
    Absent, Callback, Collaborator, DispatchError, DpRxEngine, EventKind, HandlerRoute,
    HdcpCipher, InterruptSource, LocalSlot, Precondition, TimerCounter, TimerHandler,
    FIRST_HANDLER_TYPE,
};

const LOCAL_SLOT_COUNT: usize = 3;

/// Static configuration of one subsystem instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DpRxSsConfig {
    /// Device identifier of this subsystem instance.
    pub device_id: u16,
    /// Base address of the subsystem register space.
    pub base_address: u32,
}

/// Readiness of a subsystem instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ComponentState {
    /// Constructed but not yet initialized.
    #[default]
    NotReady,
    /// Initialized; registration and forwarding are allowed.
    Ready,
}

/// One DisplayPort RX subsystem instance.
///
/// Owns the RX engine and, optionally, an HDCP cipher and a timer counter.
/// Handlers must be installed before interrupts are enabled: nothing here
/// synchronizes registration against a concurrent interrupt.
pub struct DpRxSs<D, H = Absent, T = Absent> {
    config: DpRxSsConfig,
    state: ComponentState,
    dp: D,
    hdcp: Option<H>,
    tmr_ctr: Option<T>,
    local: [Option<Callback>; LOCAL_SLOT_COUNT],
}

impl<D: DpRxEngine> DpRxSs<D> {
    /// Creates a not-ready instance holding only the RX engine.
    #[must_use]
    pub const fn new(config: DpRxSsConfig, dp: D) -> Self {
        Self::with_collaborators(config, dp, None, None)
    }
}

impl<D, H, T> DpRxSs<D, H, T>
where
    D: DpRxEngine,
    H: HdcpCipher,
    T: TimerCounter,
{
    /// Creates a not-ready instance with an optional cipher and timer.
    #[must_use]
    pub const fn with_collaborators(
        config: DpRxSsConfig,
        dp: D,
        hdcp: Option<H>,
        tmr_ctr: Option<T>,
    ) -> Self {
        Self {
            config,
            state: ComponentState::NotReady,
            dp,
            hdcp,
            tmr_ctr,
            local: [None, None, None],
        }
    }

    /// Marks the instance ready for registration and forwarding.
    pub fn initialize(&mut self) {
        log::debug!(
            "dprxss {}: ready at {:#010x} (hdcp: {}, timer: {})",
            self.config.device_id,
            self.config.base_address,
            self.hdcp.is_some(),
            self.tmr_ctr.is_some()
        );
        self.state = ComponentState::Ready;
    }

    /// Returns the instance configuration.
    #[must_use]
    pub const fn config(&self) -> &DpRxSsConfig {
        &self.config
    }

    /// Returns the current readiness state.
    #[must_use]
    pub const fn state(&self) -> ComponentState {
        self.state
    }

    /// Returns `true` once [`Self::initialize`] has run.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, ComponentState::Ready)
    }

    /// Returns a reference to the RX engine.
    #[must_use]
    pub const fn dp(&self) -> &D {
        &self.dp
    }

    /// Returns a mutable reference to the RX engine.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn dp_mut(&mut self) -> &mut D {
        &mut self.dp
    }

    /// Returns a reference to the HDCP cipher, if present.
    #[must_use]
    pub const fn hdcp(&self) -> Option<&H> {
        self.hdcp.as_ref()
    }

    /// Returns a mutable reference to the HDCP cipher, if present.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn hdcp_mut(&mut self) -> Option<&mut H> {
        self.hdcp.as_mut()
    }

    /// Returns a reference to the timer counter, if present.
    #[must_use]
    pub const fn tmr_ctr(&self) -> Option<&T> {
        self.tmr_ctr.as_ref()
    }

    /// Returns a mutable reference to the timer counter, if present.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn tmr_ctr_mut(&mut self) -> Option<&mut T> {
        self.tmr_ctr.as_mut()
    }

    const fn ensure_ready(&self) -> Result<(), Precondition> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Precondition::NotReady)
        }
    }

    /// Installs `callback` for a raw handler type identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::NotReady`] before initialization,
    /// [`Precondition::HandlerTypeBelowRange`] for identifiers below the
    /// first event kind and [`DispatchError::InvalidParam`] for identifiers
    /// that name no event kind.
    pub fn set_callback_raw(&mut self, raw: u32, callback: Callback) -> Result<(), DispatchError> {
        self.ensure_ready()?;
        if raw < FIRST_HANDLER_TYPE {
            return Err(Precondition::HandlerTypeBelowRange(raw).into());
        }
        match EventKind::from_u32(raw) {
            Some(kind) => self.set_callback(kind, callback),
            None => {
                log::warn!("dprxss {}: unknown handler type {raw}", self.config.device_id);
                Err(DispatchError::InvalidParam(raw))
            }
        }
    }

    /// Installs `callback` for `kind`, replacing any previous handler.
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::NotReady`] before initialization and
    /// [`DispatchError::InvalidParam`] for the repeater event when the
    /// instance has no HDCP cipher.
    pub fn set_callback(
        &mut self,
        kind: EventKind,
        callback: Callback,
    ) -> Result<(), DispatchError> {
        self.ensure_ready()?;
        match kind.route() {
            HandlerRoute::Engine(event) => self.dp.set_interrupt_handler(event, callback),
            HandlerRoute::Cipher(reason) => {
                let Some(hdcp) = self.hdcp.as_mut() else {
                    log::warn!(
                        "dprxss {}: {kind:?} needs an hdcp cipher",
                        self.config.device_id
                    );
                    return Err(DispatchError::InvalidParam(kind.as_u32()));
                };
                hdcp.set_callback(reason, callback);
            }
            HandlerRoute::Local(slot) => self.local[slot.index()] = Some(callback),
        }
        log::debug!("dprxss {}: installed {kind:?} handler", self.config.device_id);
        Ok(())
    }

    /// Returns `true` when a handler is stored in `slot`.
    #[must_use]
    pub const fn has_callback(&self, slot: LocalSlot) -> bool {
        self.local[slot.index()].is_some()
    }

    /// Invokes the handler stored in `slot`.
    ///
    /// Returns `false` when the slot is empty.
    pub fn notify(&mut self, slot: LocalSlot) -> bool {
        match self.local[slot.index()].as_mut() {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Installs the custom delay/sleep hook on the RX engine.
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::NotReady`] before initialization.
    pub fn set_user_timer_handler(&mut self, handler: TimerHandler) -> Result<(), Precondition> {
        self.ensure_ready()?;
        self.dp.set_user_timer_handler(handler);
        Ok(())
    }

    /// Forwards an RX engine interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::NotReady`] before initialization.
    pub fn dp_intr_handler(&mut self) -> Result<(), Precondition> {
        self.ensure_ready()?;
        self.dp.interrupt_handler();
        Ok(())
    }

    /// Forwards an HDCP cipher interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::NotReady`] before initialization and
    /// [`Precondition::MissingCollaborator`] without a cipher.
    pub fn hdcp_intr_handler(&mut self) -> Result<(), Precondition> {
        self.ensure_ready()?;
        self.hdcp
            .as_mut()
            .ok_or(Precondition::MissingCollaborator(Collaborator::HdcpCipher))?
            .cipher_intr_handler();
        Ok(())
    }

    /// Forwards a timer counter interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::NotReady`] before initialization and
    /// [`Precondition::MissingCollaborator`] without a timer counter.
    pub fn tmr_ctr_intr_handler(&mut self) -> Result<(), Precondition> {
        self.ensure_ready()?;
        self.tmr_ctr
            .as_mut()
            .ok_or(Precondition::MissingCollaborator(Collaborator::TimerCounter))?
            .interrupt_handler();
        Ok(())
    }

    /// Forwards the interrupt raised on `source`.
    ///
    /// # Errors
    ///
    /// Propagates the precondition of the matching forwarder.
    pub fn handle_interrupt(&mut self, source: InterruptSource) -> Result<(), Precondition> {
        match source {
            InterruptSource::Dp => self.dp_intr_handler(),
            InterruptSource::Hdcp => self.hdcp_intr_handler(),
            InterruptSource::TimerCounter => self.tmr_ctr_intr_handler(),
        }
    }
}

impl<D: fmt::Debug, H: fmt::Debug, T: fmt::Debug> fmt::Debug for DpRxSs<D, H, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DpRxSs")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("dp", &self.dp)
            .field("hdcp", &self.hdcp)
            .field("tmr_ctr", &self.tmr_ctr)
            .field(
                "local",
                &self.local.iter().map(Option::is_some).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::{ComponentState, DpRxSs, DpRxSsConfig};
    use crate::{
        Callback, DispatchError, DpRxEngine, EventKind, LocalSlot, Precondition,
        RxInterrupt, TimerHandler,
    };

    #[derive(Debug, Default)]
    struct CountingEngine {
        installed: Vec<RxInterrupt>,
        timer_installs: u32,
        serviced: u32,
    }

    impl DpRxEngine for CountingEngine {
        fn set_interrupt_handler(&mut self, event: RxInterrupt, _handler: Callback) {
            self.installed.push(event);
        }

        fn set_user_timer_handler(&mut self, _handler: TimerHandler) {
            self.timer_installs += 1;
        }

        fn interrupt_handler(&mut self) {
            self.serviced += 1;
        }
    }

    fn counter_callback(counter: &Arc<AtomicU32>, amount: u32) -> Callback {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(amount, Ordering::SeqCst);
        })
    }

    fn ready_subsystem() -> DpRxSs<CountingEngine> {
        let mut subsystem = DpRxSs::new(DpRxSsConfig::default(), CountingEngine::default());
        subsystem.initialize();
        subsystem
    }

    #[test]
    fn new_instance_is_not_ready() {
        let subsystem = DpRxSs::new(DpRxSsConfig::default(), CountingEngine::default());
        assert_eq!(subsystem.state(), ComponentState::NotReady);
        assert!(!subsystem.is_ready());
    }

    #[test]
    fn registration_before_initialize_is_a_precondition_failure() {
        let mut subsystem = DpRxSs::new(DpRxSsConfig::default(), CountingEngine::default());
        let result = subsystem.set_callback(EventKind::DpVBlank, Box::new(|| {}));
        assert_eq!(result, Err(DispatchError::Precondition(Precondition::NotReady)));
        assert!(subsystem.dp().installed.is_empty());
    }

    #[test]
    fn engine_kinds_forward_to_engine_setter() {
        let mut subsystem = ready_subsystem();
        subsystem
            .set_callback(EventKind::DpTrainingDone, Box::new(|| {}))
            .expect("engine kind registers");
        assert_eq!(subsystem.dp().installed, vec![RxInterrupt::TrainingDone]);
    }

    #[test]
    fn local_slot_keeps_last_binding() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut subsystem = ready_subsystem();

        subsystem
            .set_callback(EventKind::Unplug, counter_callback(&counter, 1))
            .expect("first binding");
        subsystem
            .set_callback(EventKind::Unplug, counter_callback(&counter, 100))
            .expect("second binding");

        assert!(subsystem.notify(LocalSlot::Unplug));
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn notify_on_empty_slot_reports_false() {
        let mut subsystem = ready_subsystem();
        assert!(!subsystem.has_callback(LocalSlot::PllReset));
        assert!(!subsystem.notify(LocalSlot::PllReset));
    }

    #[test]
    fn repeater_kind_without_cipher_is_invalid_param() {
        let mut subsystem = ready_subsystem();
        let result = subsystem.set_callback(EventKind::HdcpRepeaterTdsa, Box::new(|| {}));
        assert_eq!(result, Err(DispatchError::InvalidParam(17)));
    }

    #[test]
    fn raw_zero_is_below_range() {
        let mut subsystem = ready_subsystem();
        let result = subsystem.set_callback_raw(0, Box::new(|| {}));
        assert_eq!(
            result,
            Err(DispatchError::Precondition(
                Precondition::HandlerTypeBelowRange(0)
            ))
        );
    }

    #[test]
    fn forwarders_without_collaborators_fail() {
        let mut subsystem = ready_subsystem();
        assert!(matches!(
            subsystem.hdcp_intr_handler(),
            Err(Precondition::MissingCollaborator(_))
        ));
        assert!(matches!(
            subsystem.tmr_ctr_intr_handler(),
            Err(Precondition::MissingCollaborator(_))
        ));
        subsystem.dp_intr_handler().expect("engine is always present");
        assert_eq!(subsystem.dp().serviced, 1);
    }

    #[test]
    fn user_timer_handler_forwards_once_ready() {
        let mut subsystem = DpRxSs::new(DpRxSsConfig::default(), CountingEngine::default());
        assert_eq!(
            subsystem.set_user_timer_handler(Box::new(|_| {})),
            Err(Precondition::NotReady)
        );
        subsystem.initialize();
        subsystem
            .set_user_timer_handler(Box::new(|_| {}))
            .expect("ready instance accepts timer hook");
        assert_eq!(subsystem.dp().timer_installs, 1);
    }

    #[test]
    fn debug_output_reports_slot_occupancy() {
        let mut subsystem = ready_subsystem();
        subsystem
            .set_callback(EventKind::LinkBandwidth, Box::new(|| {}))
            .expect("local kind registers");
        let rendered = format!("{subsystem:?}");
        assert!(rendered.contains("state: Ready"));
        assert!(rendered.contains("local: [false, true, false]"));
        assert!(subsystem.has_callback(LocalSlot::LinkBandwidth));
    }
}

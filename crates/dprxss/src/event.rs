//! Closed event taxonomy and handler routing table.

/// Number of defined event kinds.
pub const EVENT_KIND_COUNT: usize = 20;

/// Lowest raw handler type value accepted by registration.
pub const FIRST_HANDLER_TYPE: u32 = EventKind::DpVmChange.as_u32();

/// Event kinds a caller may install a handler for.
///
/// Discriminants are the stable handler type identifiers and are ordered;
/// values below [`FIRST_HANDLER_TYPE`] are contract violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u32)]
pub enum EventKind {
    /// Video mode change.
    DpVmChange = 1,
    /// Sink power state change.
    DpPowerChange = 2,
    /// No-video pattern detected.
    DpNoVideo = 3,
    /// Vertical blanking interval.
    DpVBlank = 4,
    /// Link training lost.
    DpTrainingLost = 5,
    /// Valid video stream detected.
    DpVideo = 6,
    /// Info packet received.
    DpInfoPacket = 7,
    /// Extension packet received.
    DpExtPacket = 8,
    /// Link training completed.
    DpTrainingDone = 9,
    /// Link bandwidth change requested by the source.
    DpBwChange = 10,
    /// Sideband down request received.
    DpDownRequest = 11,
    /// Sideband down reply received.
    DpDownReply = 12,
    /// Audio packet overflow.
    DpAudioOverflow = 13,
    /// Payload allocation table update.
    DpPayloadAlloc = 14,
    /// ACT sequence received.
    DpActRx = 15,
    /// CRC test request.
    DpCrcTest = 16,
    /// HDCP repeater asks for downstream authentication.
    HdcpRepeaterTdsa = 17,
    /// Cable unplugged.
    Unplug = 18,
    /// Link bandwidth changed.
    LinkBandwidth = 19,
    /// PLL reset requested.
    PllReset = 20,
}

impl EventKind {
    /// Every defined kind in ascending handler type order.
    pub const ALL: [Self; EVENT_KIND_COUNT] = [
        Self::DpVmChange,
        Self::DpPowerChange,
        Self::DpNoVideo,
        Self::DpVBlank,
        Self::DpTrainingLost,
        Self::DpVideo,
        Self::DpInfoPacket,
        Self::DpExtPacket,
        Self::DpTrainingDone,
        Self::DpBwChange,
        Self::DpDownRequest,
        Self::DpDownReply,
        Self::DpAudioOverflow,
        Self::DpPayloadAlloc,
        Self::DpActRx,
        Self::DpCrcTest,
        Self::HdcpRepeaterTdsa,
        Self::Unplug,
        Self::LinkBandwidth,
        Self::PllReset,
    ];

    /// Returns the raw handler type identifier.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Converts a raw handler type identifier back into an event kind.
    #[must_use]
    pub const fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::DpVmChange),
            2 => Some(Self::DpPowerChange),
            3 => Some(Self::DpNoVideo),
            4 => Some(Self::DpVBlank),
            5 => Some(Self::DpTrainingLost),
            6 => Some(Self::DpVideo),
            7 => Some(Self::DpInfoPacket),
            8 => Some(Self::DpExtPacket),
            9 => Some(Self::DpTrainingDone),
            10 => Some(Self::DpBwChange),
            11 => Some(Self::DpDownRequest),
            12 => Some(Self::DpDownReply),
            13 => Some(Self::DpAudioOverflow),
            14 => Some(Self::DpPayloadAlloc),
            15 => Some(Self::DpActRx),
            16 => Some(Self::DpCrcTest),
            17 => Some(Self::HdcpRepeaterTdsa),
            18 => Some(Self::Unplug),
            19 => Some(Self::LinkBandwidth),
            20 => Some(Self::PllReset),
            _ => None,
        }
    }

    /// Returns where a handler for this kind is installed.
    #[must_use]
    pub const fn route(self) -> HandlerRoute {
        match self {
            Self::DpVmChange => HandlerRoute::Engine(RxInterrupt::VmChange),
            Self::DpPowerChange => HandlerRoute::Engine(RxInterrupt::PowerState),
            Self::DpNoVideo => HandlerRoute::Engine(RxInterrupt::NoVideo),
            Self::DpVBlank => HandlerRoute::Engine(RxInterrupt::VBlank),
            Self::DpTrainingLost => HandlerRoute::Engine(RxInterrupt::TrainingLost),
            Self::DpVideo => HandlerRoute::Engine(RxInterrupt::Video),
            Self::DpInfoPacket => HandlerRoute::Engine(RxInterrupt::InfoPacket),
            Self::DpExtPacket => HandlerRoute::Engine(RxInterrupt::ExtPacket),
            Self::DpTrainingDone => HandlerRoute::Engine(RxInterrupt::TrainingDone),
            Self::DpBwChange => HandlerRoute::Engine(RxInterrupt::BwChange),
            Self::DpDownRequest => HandlerRoute::Engine(RxInterrupt::DownRequest),
            Self::DpDownReply => HandlerRoute::Engine(RxInterrupt::DownReply),
            Self::DpAudioOverflow => HandlerRoute::Engine(RxInterrupt::AudioOverflow),
            Self::DpPayloadAlloc => HandlerRoute::Engine(RxInterrupt::PayloadAlloc),
            Self::DpActRx => HandlerRoute::Engine(RxInterrupt::ActRx),
            Self::DpCrcTest => HandlerRoute::Engine(RxInterrupt::CrcTest),
            Self::HdcpRepeaterTdsa => HandlerRoute::Cipher(CipherHandler::TriggerDownstreamAuth),
            Self::Unplug => HandlerRoute::Local(LocalSlot::Unplug),
            Self::LinkBandwidth => HandlerRoute::Local(LocalSlot::LinkBandwidth),
            Self::PllReset => HandlerRoute::Local(LocalSlot::PllReset),
        }
    }
}

/// Interrupt events owned by the DisplayPort RX engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RxInterrupt {
    /// Video mode change.
    VmChange,
    /// Power state change.
    PowerState,
    /// No-video pattern.
    NoVideo,
    /// Vertical blank.
    VBlank,
    /// Training lost.
    TrainingLost,
    /// Video valid.
    Video,
    /// Info packet.
    InfoPacket,
    /// Extension packet.
    ExtPacket,
    /// Training done.
    TrainingDone,
    /// Bandwidth change.
    BwChange,
    /// Down request.
    DownRequest,
    /// Down reply.
    DownReply,
    /// Audio overflow.
    AudioOverflow,
    /// Payload allocation.
    PayloadAlloc,
    /// ACT received.
    ActRx,
    /// CRC test.
    CrcTest,
}

/// Handler reasons accepted by the cipher engine's generic callback setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CipherHandler {
    /// Repeater must trigger downstream authentication.
    TriggerDownstreamAuth,
}

/// Callback slots held directly by the subsystem instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LocalSlot {
    /// Cable unplug.
    Unplug,
    /// Link bandwidth change.
    LinkBandwidth,
    /// PLL reset request.
    PllReset,
}

impl LocalSlot {
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Unplug => 0,
            Self::LinkBandwidth => 1,
            Self::PllReset => 2,
        }
    }
}

/// Destination of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerRoute {
    /// Forwarded to the RX engine's per-event setter.
    Engine(RxInterrupt),
    /// Forwarded to the cipher engine tagged with a handler reason.
    Cipher(CipherHandler),
    /// Stored in the instance's own slot.
    Local(LocalSlot),
}

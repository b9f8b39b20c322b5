use thiserror::Error;

/// Status value reported for a successful operation.
pub const XST_SUCCESS: u32 = 0;
/// Status value reported when an argument is outside the accepted set.
pub const XST_INVALID_PARAM: u32 = 15;
/// Status value reported when a caller breaks an operation contract.
pub const XST_PRECONDITION: u32 = 0x100;

/// Collaborator slots an instance handle may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Collaborator {
    /// DisplayPort RX interrupt engine.
    DpEngine,
    /// HDCP cipher engine.
    HdcpCipher,
    /// Timer counter peripheral.
    TimerCounter,
}

/// Contract violations on the dispatcher and forwarder entry points.
///
/// These are never recoverable domain outcomes. Callers that want
/// abort-on-assert behaviour can treat any of them as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Precondition {
    /// The instance handle has not been initialized.
    #[error("subsystem instance is not ready")]
    NotReady,
    /// The raw handler type is below the first defined event kind.
    #[error("handler type {0} is below the first defined event kind")]
    HandlerTypeBelowRange(u32),
    /// The operation targets a collaborator the handle does not hold.
    #[error("subsystem has no {0:?} collaborator")]
    MissingCollaborator(Collaborator),
}

/// Failure returned by callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DispatchError {
    /// Caller broke the registration contract.
    #[error(transparent)]
    Precondition(#[from] Precondition),
    /// Handler type does not name an event kind this handle can route.
    #[error("invalid handler type {0}")]
    InvalidParam(u32),
}

impl DispatchError {
    /// Returns the numeric status value for this failure.
    #[must_use]
    pub const fn status(self) -> u32 {
        match self {
            Self::Precondition(_) => XST_PRECONDITION,
            Self::InvalidParam(_) => XST_INVALID_PARAM,
        }
    }

    /// Returns `true` for contract violations rather than domain errors.
    #[must_use]
    pub const fn is_precondition(self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

/// Collapses a registration result into its numeric status value.
#[must_use]
pub const fn status_of(result: Result<(), DispatchError>) -> u32 {
    match result {
        Ok(()) => XST_SUCCESS,
        Err(error) => error.status(),
    }
}

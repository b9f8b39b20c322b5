//! Error taxonomy for the controller, the flash library and the sequence.

use thiserror::Error;

use crate::SequencerState;

/// Status value reported for a successful sequence.
pub const XST_SUCCESS: u32 = 0;
/// Status value reported for any failed stage.
pub const XST_FAILURE: u32 = 1;
/// Status value reported when no controller configuration matches.
pub const XST_DEVICE_NOT_FOUND: u32 = 2;

/// QSPI controller failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum QspiError {
    /// Operation issued before `cfg_initialize`.
    #[error("qspi controller is not initialized")]
    NotInitialized,
    /// Controller is already started and cannot be reconfigured.
    #[error("qspi controller is busy")]
    Busy,
    /// Controller reported a transfer fault.
    #[error("qspi transfer failed")]
    Transfer,
}

/// Serial-flash library failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum IsfError {
    /// Operation issued before the library was bound to a controller.
    #[error("serial flash library is not initialized")]
    NotInitialized,
    /// Underlying controller failure.
    #[error(transparent)]
    Bus(#[from] QspiError),
    /// Access falls outside the device.
    #[error("access of {len} bytes at {address:#010x} is outside the device")]
    OutOfRange {
        /// First byte of the access.
        address: u32,
        /// Access length in bytes.
        len: usize,
    },
    /// Program request longer than one page.
    #[error("program of {len} bytes exceeds the {page_size}-byte page")]
    PageOverrun {
        /// Requested length.
        len: usize,
        /// Device page size.
        page_size: u32,
    },
    /// Scratch buffer handed to the library is too short.
    #[error("scratch buffer holds {actual} bytes, needs {needed}")]
    ScratchTooSmall {
        /// Minimum accepted length.
        needed: usize,
        /// Provided length.
        actual: usize,
    },
    /// Device did not complete the command.
    #[error("flash command failed")]
    CommandFailed,
}

/// Rejected test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// At least one page must be written.
    #[error("page count must be non-zero")]
    ZeroPages,
    /// Page size outside `1..=MAX_PAGE_SIZE`.
    #[error("page size {0} is outside 1..=1024")]
    PageSize(u32),
    /// Region size does not fit the 32-bit address space.
    #[error("test region overflows the 32-bit address space")]
    RegionOverflow,
}

/// Failure of one stage of the flash sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlashError {
    /// No controller configuration matches the device identifier.
    #[error("no qspi configuration for device {0}")]
    DeviceNotFound(u16),
    /// Controller initialization failed.
    #[error("qspi controller initialization failed")]
    InitFailed(#[source] QspiError),
    /// Flash library configuration failed.
    #[error("serial flash library setup failed")]
    LibraryInitFailed(#[source] IsfError),
    /// Sector size has no defined erase mask.
    #[error("unsupported sector size {0:#x}")]
    UnsupportedSectorSize(u32),
    /// Erase command failed.
    #[error("erase at {address:#010x} failed")]
    EraseFailed {
        /// Address passed to the failing erase.
        address: u32,
        /// Library failure.
        #[source]
        source: IsfError,
    },
    /// Page write failed.
    #[error("write at {address:#010x} failed")]
    WriteFailed {
        /// Address passed to the failing write.
        address: u32,
        /// Library failure.
        #[source]
        source: IsfError,
    },
    /// Read failed.
    #[error("read at {address:#010x} failed")]
    ReadFailed {
        /// Address passed to the failing read.
        address: u32,
        /// Library failure.
        #[source]
        source: IsfError,
    },
    /// Read-back data differs from the written pattern.
    #[error("verification failed at offset {offset}: expected {expected:#04x}, read {actual:#04x}")]
    VerificationFailed {
        /// Offset of the first mismatching byte.
        offset: usize,
        /// Pattern byte.
        expected: u8,
        /// Byte read back.
        actual: u8,
    },
    /// Request exceeds the sequencer's transfer buffer.
    #[error("transfer of {requested} bytes exceeds the {capacity}-byte buffer")]
    BufferTooSmall {
        /// Requested byte count.
        requested: usize,
        /// Buffer capacity.
        capacity: usize,
    },
    /// Test configuration was rejected.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    /// Stage called in the wrong order.
    #[error("stage expects {expected:?}, sequence is {actual:?}")]
    OutOfSequence {
        /// State the stage runs from.
        expected: SequencerState,
        /// Current state.
        actual: SequencerState,
    },
    /// An earlier stage already failed.
    #[error("sequence already failed: {0}")]
    Latched(Box<Self>),
}

impl FlashError {
    /// Returns the numeric status value for this failure.
    #[must_use]
    pub fn status(&self) -> u32 {
        match self {
            Self::DeviceNotFound(_) => XST_DEVICE_NOT_FOUND,
            Self::Latched(cause) => cause.status(),
            _ => XST_FAILURE,
        }
    }
}

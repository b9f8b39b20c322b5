//! Polled erase/write/read/verify sequence for a QSPI serial flash.

/// Error taxonomy and numeric status values.
pub mod error;
pub use error::{
    ConfigError, FlashError, IsfError, QspiError, XST_DEVICE_NOT_FOUND, XST_FAILURE, XST_SUCCESS,
};

/// Controller and flash-library contracts and command tags.
pub mod api;
pub use api::{
    ConfigTable, ConnectionMode, EraseCommand, FlashSelect, QspiConfig, QspiController,
    QspiOptions, ReadCommand, ReadParam, SerialFlash, WriteCommand, WriteParam, DUMMY_SIZE,
    SPI_PRESCALER,
};

/// Flash geometry, sector masks and erase planning.
pub mod geometry;
pub use geometry::{
    sector_erase_count, sector_mask, ErasePlan, FlashGeometry, SUPPORTED_SECTOR_SIZES,
};

/// Test-run parameters and derived buffer sizes.
pub mod config;
pub use config::{
    FlashTestConfig, DATA_OFFSET, FLASH_QSPI_SELECT, MAX_PAGE_SIZE, PAGE_COUNT, PAGE_SIZE,
    TEST_ADDRESS, TEST_OFFSET, UNIQUE_VALUE, XISF_CMD_SEND_EXTRA_BYTES,
};

/// Stage-ordered sequencer owning controller, library and buffers.
pub mod sequencer;
pub use sequencer::{FlashSequencer, SequencerState};

/// In-memory controller and NOR flash.
pub mod sim;
pub use sim::{FaultKind, FlashOp, SimConfigTable, SimFlash, SimQspi, ERASED};

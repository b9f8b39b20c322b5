//! Collaborator contracts: controller configuration table, QSPI controller
//! and serial-flash command library.

use bitflags::bitflags;

use crate::{FlashGeometry, IsfError, QspiError};

/// Number of dummy bytes issued before data on fast, dual and quad reads.
pub const DUMMY_SIZE: u8 = 1;

/// Bus prescaler handed to the library: divide the reference clock by 8.
pub const SPI_PRESCALER: u8 = 2;

/// How the controller reaches its flash devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionMode {
    /// One device on one bus.
    #[default]
    Single,
    /// Two devices sharing the lower bus as halves of one address space.
    Stacked,
    /// Two devices on separate buses, striped.
    Parallel,
}

/// Chip-select line addressed by the next transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlashSelect {
    /// Lower chip select on the lower bus.
    #[default]
    Lower,
    /// Upper chip select on the lower bus.
    Upper,
}

/// Controller configuration descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct QspiConfig {
    /// Device identifier the descriptor belongs to.
    pub device_id: u16,
    /// Register base address.
    pub base_address: u32,
    /// Reference clock in Hz.
    pub input_clock_hz: u32,
    /// Device topology.
    pub connection_mode: ConnectionMode,
}

bitflags! {
    /// Controller option bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QspiOptions: u32 {
        /// Clock idles high.
        const CLK_ACTIVE_LOW = 0x2;
        /// Data sampled on the second clock edge.
        const CLK_PHASE_1 = 0x4;
        /// Transfers start only on an explicit manual start.
        const MANUAL_START = 0x8;
    }
}

/// Erase command tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EraseCommand {
    /// Erase the sector containing the address.
    SectorErase,
    /// Erase the whole selected device.
    BulkErase,
}

/// Write command tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteCommand {
    /// Page program.
    Write,
}

/// Read command tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReadCommand {
    /// Plain single-line read, no dummy cycles.
    Read,
    /// Single-line fast read.
    FastRead,
    /// Dual-output fast read.
    DualOpFastRead,
    /// Quad-output fast read.
    #[default]
    QuadOpFastRead,
}

impl ReadCommand {
    /// Every read command, plain read first.
    pub const ALL: [Self; 4] = [
        Self::Read,
        Self::FastRead,
        Self::DualOpFastRead,
        Self::QuadOpFastRead,
    ];

    /// Dummy bytes the library must clock before data for this command.
    #[must_use]
    pub const fn dummy_bytes(self) -> u8 {
        match self {
            Self::Read => 0,
            Self::FastRead | Self::DualOpFastRead | Self::QuadOpFastRead => DUMMY_SIZE,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::FastRead => "fast_read",
            Self::DualOpFastRead => "dual_op_fast_read",
            Self::QuadOpFastRead => "quad_op_fast_read",
        }
    }

    /// Parses a stable lowercase name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }
}

/// Page program request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteParam<'a> {
    /// First flash address to program.
    pub address: u32,
    /// Bytes to program.
    pub data: &'a [u8],
}

/// Read request.
#[derive(Debug, PartialEq, Eq)]
pub struct ReadParam<'a> {
    /// First flash address to read.
    pub address: u32,
    /// Destination; its length is the byte count.
    pub buffer: &'a mut [u8],
    /// Dummy bytes clocked before data.
    pub dummy_bytes: u8,
}

/// Static controller configuration table.
pub trait ConfigTable {
    /// Returns the descriptor for `device_id`, if one exists.
    fn lookup_config(&self, device_id: u16) -> Option<QspiConfig>;
}

/// QSPI bus controller.
pub trait QspiController {
    /// Initializes the controller from a descriptor at `base_address`.
    ///
    /// # Errors
    ///
    /// Returns a [`QspiError`] when the controller cannot be brought up.
    fn cfg_initialize(&mut self, config: &QspiConfig, base_address: u32) -> Result<(), QspiError>;

    /// Applies controller options.
    ///
    /// # Errors
    ///
    /// Returns a [`QspiError`] when options cannot be changed.
    fn set_options(&mut self, options: QspiOptions) -> Result<(), QspiError>;

    /// Routes subsequent transfers to `select`.
    fn select_flash(&mut self, select: FlashSelect);

    /// Chip select currently routed.
    fn selected_flash(&self) -> FlashSelect;

    /// Device topology reported by the configuration.
    fn connection_mode(&self) -> ConnectionMode;
}

/// Serial-flash command library bound to a controller `C`.
///
/// Every operation blocks until the device reports completion.
pub trait SerialFlash<C: QspiController> {
    /// Configures the controller for library transfers.
    ///
    /// # Errors
    ///
    /// Returns an [`IsfError`] when the controller rejects the options.
    fn set_spi_configuration(
        &mut self,
        controller: &mut C,
        options: QspiOptions,
        prescaler: u8,
    ) -> Result<(), IsfError>;

    /// Binds the library to `controller` on `chip_select`, taking ownership
    /// of the command scratch buffer.
    ///
    /// # Errors
    ///
    /// Returns an [`IsfError`] when the device cannot be identified or the
    /// scratch buffer is too short.
    fn initialize(
        &mut self,
        controller: &mut C,
        chip_select: u8,
        scratch: Vec<u8>,
    ) -> Result<(), IsfError>;

    /// Geometry of the bound device.
    fn geometry(&self) -> FlashGeometry;

    /// Issues an erase command.
    ///
    /// # Errors
    ///
    /// Returns an [`IsfError`] when the command fails.
    fn erase(
        &mut self,
        controller: &mut C,
        command: EraseCommand,
        address: u32,
    ) -> Result<(), IsfError>;

    /// Issues a program command.
    ///
    /// # Errors
    ///
    /// Returns an [`IsfError`] when the command fails.
    fn write(
        &mut self,
        controller: &mut C,
        command: WriteCommand,
        param: WriteParam<'_>,
    ) -> Result<(), IsfError>;

    /// Issues a read command.
    ///
    /// # Errors
    ///
    /// Returns an [`IsfError`] when the command fails.
    fn read(
        &mut self,
        controller: &mut C,
        command: ReadCommand,
        param: ReadParam<'_>,
    ) -> Result<(), IsfError>;
}

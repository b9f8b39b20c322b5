//! In-memory controller and NOR flash used by tests and the example binary.

use std::collections::BTreeMap;

use crate::{
    ConfigTable, ConnectionMode, EraseCommand, FlashGeometry, FlashSelect, IsfError, QspiConfig,
    QspiController, QspiError, QspiOptions, ReadCommand, ReadParam, SerialFlash, WriteCommand,
    WriteParam,
};

/// Value of an erased flash byte.
pub const ERASED: u8 = 0xFF;

/// Register base of the first simulated controller.
pub const SIM_BASE_ADDRESS: u32 = 0xFF0F_0000;

/// Reference clock of the simulated controller.
pub const SIM_INPUT_CLOCK_HZ: u32 = 300_000_000;

/// Fixed list of controller descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimConfigTable {
    entries: Vec<QspiConfig>,
}

impl SimConfigTable {
    /// Table holding `entries`.
    #[must_use]
    pub const fn new(entries: Vec<QspiConfig>) -> Self {
        Self { entries }
    }

    /// Table with device 0 in `mode`.
    #[must_use]
    pub fn single(mode: ConnectionMode) -> Self {
        Self::new(vec![QspiConfig {
            device_id: 0,
            base_address: SIM_BASE_ADDRESS,
            input_clock_hz: SIM_INPUT_CLOCK_HZ,
            connection_mode: mode,
        }])
    }
}

impl ConfigTable for SimConfigTable {
    fn lookup_config(&self, device_id: u16) -> Option<QspiConfig> {
        self.entries
            .iter()
            .find(|entry| entry.device_id == device_id)
            .copied()
    }
}

/// Simulated QSPI controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimQspi {
    config: Option<QspiConfig>,
    options: QspiOptions,
    selected: FlashSelect,
    fail_init: bool,
}

impl SimQspi {
    /// Uninitialized controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller whose initialization always fails.
    #[must_use]
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    /// Whether `cfg_initialize` succeeded.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Options applied last.
    #[must_use]
    pub const fn options(&self) -> QspiOptions {
        self.options
    }
}

impl QspiController for SimQspi {
    fn cfg_initialize(&mut self, config: &QspiConfig, base_address: u32) -> Result<(), QspiError> {
        if self.fail_init {
            return Err(QspiError::Transfer);
        }
        self.config = Some(QspiConfig {
            base_address,
            ..*config
        });
        self.options = QspiOptions::empty();
        self.selected = FlashSelect::Lower;
        Ok(())
    }

    fn set_options(&mut self, options: QspiOptions) -> Result<(), QspiError> {
        if self.config.is_none() {
            return Err(QspiError::NotInitialized);
        }
        self.options = options;
        Ok(())
    }

    fn select_flash(&mut self, select: FlashSelect) {
        self.selected = select;
    }

    fn selected_flash(&self) -> FlashSelect {
        self.selected
    }

    fn connection_mode(&self) -> ConnectionMode {
        self.config
            .map_or(ConnectionMode::Single, |config| config.connection_mode)
    }
}

/// Command class targeted by an injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Next erase command.
    Erase,
    /// Next write command.
    Write,
    /// Next read command.
    Read,
}

/// Completed command recorded by [`SimFlash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    /// Erase command.
    Erase {
        /// Erase kind.
        command: EraseCommand,
        /// Address operand.
        address: u32,
        /// Chip select routed at the time.
        select: FlashSelect,
    },
    /// Page program.
    Write {
        /// First address.
        address: u32,
        /// Bytes programmed.
        len: usize,
    },
    /// Read.
    Read {
        /// Read kind.
        command: ReadCommand,
        /// First address.
        address: u32,
        /// Bytes read.
        len: usize,
        /// Dummy bytes clocked.
        dummy_bytes: u8,
    },
}

/// Sparse NOR flash: erased bytes read `0xFF` and programming can only
/// clear bits.
#[derive(Debug, Clone)]
pub struct SimFlash {
    geometry: FlashGeometry,
    sectors: BTreeMap<u32, Box<[u8]>>,
    bound: bool,
    chip_select: u8,
    scratch: Vec<u8>,
    prescaler: Option<u8>,
    journal: Vec<FlashOp>,
    fault: Option<FaultKind>,
    corrupt_read: Option<usize>,
}

impl SimFlash {
    /// Blank device with `geometry`. Sector and page sizes must be non-zero.
    #[must_use]
    pub const fn new(geometry: FlashGeometry) -> Self {
        Self {
            geometry,
            sectors: BTreeMap::new(),
            bound: false,
            chip_select: 0,
            scratch: Vec::new(),
            prescaler: None,
            journal: Vec::new(),
            fault: None,
            corrupt_read: None,
        }
    }

    /// 256 Mbit device: 512 sectors of 64 KiB, 256-byte pages.
    #[must_use]
    pub const fn n25q256() -> Self {
        Self::new(FlashGeometry {
            sector_size: 0x1_0000,
            num_sectors: 512,
            page_size: 256,
        })
    }

    /// Two 256 Mbit devices stacked into one address space.
    #[must_use]
    pub const fn n25q256_stacked() -> Self {
        Self::new(FlashGeometry {
            sector_size: 0x1_0000,
            num_sectors: 1024,
            page_size: 256,
        })
    }

    /// Fails the next command of `kind` with [`IsfError::CommandFailed`].
    pub const fn fail_next(&mut self, kind: FaultKind) {
        self.fault = Some(kind);
    }

    /// Inverts the byte at `offset` of every later read that covers it.
    pub const fn corrupt_reads_at(&mut self, offset: usize) {
        self.corrupt_read = Some(offset);
    }

    /// Stores `data` at `address` as raw cell contents, bypassing NOR
    /// programming rules.
    pub fn preload(&mut self, address: u32, data: &[u8]) {
        let mut cursor = address;
        for &byte in data {
            *self.cell_mut(cursor) = byte;
            cursor = cursor.wrapping_add(1);
        }
    }

    /// Cell contents at `address`.
    #[must_use]
    pub fn byte_at(&self, address: u32) -> u8 {
        let sector_size = self.geometry.sector_size;
        self.sectors
            .get(&(address / sector_size))
            .and_then(|cells| cells.get((address % sector_size) as usize))
            .copied()
            .unwrap_or(ERASED)
    }

    /// Commands completed so far.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn journal(&self) -> &[FlashOp] {
        &self.journal
    }

    /// Whether the library was bound to a controller.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.bound
    }

    /// Chip select passed at binding.
    #[must_use]
    pub const fn chip_select(&self) -> u8 {
        self.chip_select
    }

    /// Length of the scratch buffer taken at binding.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    /// Prescaler passed to the last successful configuration.
    #[must_use]
    pub const fn prescaler(&self) -> Option<u8> {
        self.prescaler
    }

    /// Sectors holding programmed data.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn programmed_sectors(&self) -> usize {
        self.sectors.len()
    }

    fn cell_mut(&mut self, address: u32) -> &mut u8 {
        let sector_size = self.geometry.sector_size;
        let cells = self
            .sectors
            .entry(address / sector_size)
            .or_insert_with(|| vec![ERASED; sector_size as usize].into_boxed_slice());
        &mut cells[(address % sector_size) as usize]
    }

    const fn check_bound(&self) -> Result<(), IsfError> {
        if self.bound {
            Ok(())
        } else {
            Err(IsfError::NotInitialized)
        }
    }

    fn check_range(&self, address: u32, len: usize) -> Result<(), IsfError> {
        let end = u64::from(address) + len as u64;
        if end > self.geometry.capacity() {
            return Err(IsfError::OutOfRange { address, len });
        }
        Ok(())
    }

    fn take_fault(&mut self, kind: FaultKind) -> Result<(), IsfError> {
        if self.fault == Some(kind) {
            self.fault = None;
            return Err(IsfError::CommandFailed);
        }
        Ok(())
    }
}

impl<C: QspiController> SerialFlash<C> for SimFlash {
    fn set_spi_configuration(
        &mut self,
        controller: &mut C,
        options: QspiOptions,
        prescaler: u8,
    ) -> Result<(), IsfError> {
        controller.set_options(options)?;
        self.prescaler = Some(prescaler);
        Ok(())
    }

    fn initialize(
        &mut self,
        _controller: &mut C,
        chip_select: u8,
        scratch: Vec<u8>,
    ) -> Result<(), IsfError> {
        let needed = self.geometry.scratch_len();
        if scratch.len() < needed {
            return Err(IsfError::ScratchTooSmall {
                needed,
                actual: scratch.len(),
            });
        }
        self.scratch = scratch;
        self.chip_select = chip_select;
        self.bound = true;
        Ok(())
    }

    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    fn erase(
        &mut self,
        controller: &mut C,
        command: EraseCommand,
        address: u32,
    ) -> Result<(), IsfError> {
        self.check_bound()?;
        self.take_fault(FaultKind::Erase)?;
        let select = controller.selected_flash();

        match command {
            EraseCommand::SectorErase => {
                self.check_range(address, 1)?;
                self.sectors.remove(&(address / self.geometry.sector_size));
            }
            EraseCommand::BulkErase if controller.connection_mode() == ConnectionMode::Stacked => {
                let half = self.geometry.num_sectors / 2;
                match select {
                    FlashSelect::Lower => self.sectors.retain(|&index, _| index >= half),
                    FlashSelect::Upper => self.sectors.retain(|&index, _| index < half),
                }
            }
            EraseCommand::BulkErase => self.sectors.clear(),
        }

        self.journal.push(FlashOp::Erase {
            command,
            address,
            select,
        });
        Ok(())
    }

    fn write(
        &mut self,
        _controller: &mut C,
        _command: WriteCommand,
        param: WriteParam<'_>,
    ) -> Result<(), IsfError> {
        self.check_bound()?;
        let len = param.data.len();
        if len > self.geometry.page_size as usize {
            return Err(IsfError::PageOverrun {
                len,
                page_size: self.geometry.page_size,
            });
        }
        self.check_range(param.address, len)?;
        self.take_fault(FaultKind::Write)?;

        let mut cursor = param.address;
        for &byte in param.data {
            *self.cell_mut(cursor) &= byte;
            cursor = cursor.wrapping_add(1);
        }

        self.journal.push(FlashOp::Write {
            address: param.address,
            len,
        });
        Ok(())
    }

    fn read(
        &mut self,
        _controller: &mut C,
        command: ReadCommand,
        param: ReadParam<'_>,
    ) -> Result<(), IsfError> {
        self.check_bound()?;
        let len = param.buffer.len();
        self.check_range(param.address, len)?;
        self.take_fault(FaultKind::Read)?;

        let mut cursor = param.address;
        for slot in param.buffer.iter_mut() {
            *slot = self.byte_at(cursor);
            cursor = cursor.wrapping_add(1);
        }
        if let Some(offset) = self.corrupt_read {
            if let Some(slot) = param.buffer.get_mut(offset) {
                *slot = !*slot;
            }
        }

        self.journal.push(FlashOp::Read {
            command,
            address: param.address,
            len,
            dummy_bytes: param.dummy_bytes,
        });
        Ok(())
    }
}

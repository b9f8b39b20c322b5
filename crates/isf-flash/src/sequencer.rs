//! Polled erase/write/read/verify pipeline over a QSPI serial flash.

use crate::{
    ConfigTable, EraseCommand, ErasePlan, FlashError, FlashSelect, FlashTestConfig, QspiConfig,
    QspiController, QspiOptions, ReadCommand, ReadParam, SerialFlash, WriteCommand, WriteParam,
    SPI_PRESCALER,
};

/// Pipeline stage reached by a [`FlashSequencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SequencerState {
    /// Nothing done yet.
    #[default]
    Unconfigured,
    /// Controller configuration found and applied.
    ControllerInitialized,
    /// Flash library bound to the controller.
    LibraryConfigured,
    /// Test region erased.
    Erased,
    /// At least one page written.
    Written,
    /// Region read back into the read buffer.
    ReadBack,
    /// Read-back data matched the pattern.
    Verified,
    /// A stage failed; the cause is kept by the sequencer.
    Failed,
}

/// Owns the controller, the flash library and the transfer buffers of one
/// test run, and enforces stage order.
///
/// The first failure latches: every later stage returns
/// [`FlashError::Latched`] with the original cause. Once verified, further
/// stage calls return [`FlashError::OutOfSequence`] and the run stays
/// [`SequencerState::Verified`].
#[derive(Debug)]
pub struct FlashSequencer<C, F> {
    config: FlashTestConfig,
    controller: C,
    flash: F,
    qspi_config: Option<QspiConfig>,
    state: SequencerState,
    failure: Option<FlashError>,
    write_buffer: Vec<u8>,
    read_buffer: Vec<u8>,
    bytes_read: usize,
}

impl<C, F> FlashSequencer<C, F>
where
    C: QspiController,
    F: SerialFlash<C>,
{
    /// Creates a sequencer with buffers sized for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: FlashTestConfig, controller: C, flash: F) -> Result<Self, FlashError> {
        config.validate()?;
        Ok(Self {
            write_buffer: vec![0; config.write_buffer_len()],
            read_buffer: vec![0; config.read_buffer_len()],
            config,
            controller,
            flash,
            qspi_config: None,
            state: SequencerState::Unconfigured,
            failure: None,
            bytes_read: 0,
        })
    }

    /// Run parameters.
    #[must_use]
    pub const fn config(&self) -> &FlashTestConfig {
        &self.config
    }

    /// Current stage.
    #[must_use]
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    /// Latched failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&FlashError> {
        self.failure.as_ref()
    }

    /// Controller descriptor found by [`Self::lookup_and_init`].
    #[must_use]
    pub const fn qspi_config(&self) -> Option<&QspiConfig> {
        self.qspi_config.as_ref()
    }

    /// Borrow the controller.
    #[must_use]
    pub const fn controller(&self) -> &C {
        &self.controller
    }

    /// Borrow the flash library.
    #[must_use]
    pub const fn flash(&self) -> &F {
        &self.flash
    }

    /// Mutably borrow the flash library.
    #[allow(clippy::missing_const_for_fn)]
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Bytes produced by the last read.
    #[must_use]
    pub fn read_data(&self) -> &[u8] {
        self.read_buffer.get(..self.bytes_read).unwrap_or_default()
    }

    /// Releases the controller and flash library.
    #[must_use]
    pub fn into_parts(self) -> (C, F) {
        (self.controller, self.flash)
    }

    /// Looks up the controller descriptor and initializes the controller.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::DeviceNotFound`] when `table` has no entry for
    /// the configured device and [`FlashError::InitFailed`] when the
    /// controller rejects the descriptor.
    pub fn lookup_and_init(&mut self, table: &impl ConfigTable) -> Result<(), FlashError> {
        self.stage(SequencerState::Unconfigured, None, |this| {
            let device_id = this.config.qspi_device_id;
            let qspi = table
                .lookup_config(device_id)
                .ok_or(FlashError::DeviceNotFound(device_id))?;
            this.controller
                .cfg_initialize(&qspi, qspi.base_address)
                .map_err(FlashError::InitFailed)?;
            log::debug!(
                "qspi device {device_id} at {:#010x}, {:?} connection",
                qspi.base_address,
                qspi.connection_mode
            );
            this.qspi_config = Some(qspi);
            Ok(())
        })?;
        self.state = SequencerState::ControllerInitialized;
        Ok(())
    }

    /// Configures the flash library and stages the pattern.
    ///
    /// The write buffer receives `unique_value + test_offset + i` for every
    /// byte of the test region; the read buffer is zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::LibraryInitFailed`] when the library cannot be
    /// configured or bound.
    pub fn configure_library(&mut self) -> Result<(), FlashError> {
        self.stage(SequencerState::ControllerInitialized, None, |this| {
            this.flash
                .set_spi_configuration(
                    &mut this.controller,
                    QspiOptions::MANUAL_START,
                    SPI_PRESCALER,
                )
                .map_err(FlashError::LibraryInitFailed)?;
            let scratch = vec![0; this.flash.geometry().scratch_len()];
            this.flash
                .initialize(&mut this.controller, this.config.chip_select, scratch)
                .map_err(FlashError::LibraryInitFailed)?;

            let config = this.config;
            for (index, byte) in this.write_buffer[..config.total_bytes()]
                .iter_mut()
                .enumerate()
            {
                *byte = config.expected_byte(index);
            }
            this.read_buffer.fill(0);
            this.bytes_read = 0;
            log::debug!("flash library configured: {:?}", this.flash.geometry());
            Ok(())
        })?;
        self.state = SequencerState::LibraryConfigured;
        Ok(())
    }

    /// Erases `byte_count` bytes at `address`.
    ///
    /// A region equal to the device capacity is bulk erased (each half of a
    /// stacked pair in turn); anything else is erased sector by sector.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::UnsupportedSectorSize`] for a geometry without
    /// a sector mask and [`FlashError::EraseFailed`] naming the address of
    /// the failing command.
    pub fn erase(&mut self, address: u32, byte_count: u32) -> Result<(), FlashError> {
        self.stage(SequencerState::LibraryConfigured, None, |this| {
            let geometry = this.flash.geometry();
            let mode = this.controller.connection_mode();
            let plan = ErasePlan::for_region(address, byte_count, &geometry, mode)?;
            log::debug!("erasing {byte_count} bytes at {address:#010x}: {plan:?}");

            match plan {
                ErasePlan::Bulk { stacked: false } => {
                    this.issue_erase(EraseCommand::BulkErase, address)?;
                }
                ErasePlan::Bulk { stacked: true } => {
                    this.controller.select_flash(FlashSelect::Lower);
                    this.issue_erase(EraseCommand::BulkErase, address)?;
                    this.controller.select_flash(FlashSelect::Upper);
                    this.issue_erase(EraseCommand::BulkErase, address)?;
                }
                ErasePlan::Sectors {
                    start,
                    count,
                    sector_size,
                } => {
                    let mut sector = start;
                    for _ in 0..count {
                        this.issue_erase(EraseCommand::SectorErase, sector)?;
                        sector = sector.wrapping_add(sector_size);
                    }
                }
            }
            Ok(())
        })?;
        self.state = SequencerState::Erased;
        Ok(())
    }

    /// Programs `byte_count` bytes at `address`.
    ///
    /// Data is taken from the staged pattern at the offset of `address`
    /// within the test region. The range is split on device page
    /// boundaries, one write command per device page. Pages may be written
    /// one call at a time.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::BufferTooSmall`] when the range falls outside
    /// the staged pattern and [`FlashError::WriteFailed`] naming the address
    /// of the failing command.
    pub fn write(&mut self, address: u32, byte_count: u32) -> Result<(), FlashError> {
        self.stage(SequencerState::Erased, Some(SequencerState::Written), |this| {
            let staged = this.config.total_bytes();
            let offset = address.wrapping_sub(this.config.test_address) as usize;
            let requested = byte_count as usize;
            let data = offset
                .checked_add(requested)
                .filter(|&end| end <= staged)
                .and_then(|end| this.write_buffer.get(offset..end))
                .ok_or_else(|| FlashError::BufferTooSmall {
                    requested,
                    capacity: staged.saturating_sub(offset),
                })?;

            let page_size = this.flash.geometry().page_size.max(1);
            let mut cursor = address;
            let mut rest = data;
            while !rest.is_empty() {
                let room = page_size - cursor % page_size;
                let (chunk, tail) = rest.split_at(rest.len().min(room as usize));
                this.flash
                    .write(
                        &mut this.controller,
                        WriteCommand::Write,
                        WriteParam {
                            address: cursor,
                            data: chunk,
                        },
                    )
                    .map_err(|source| FlashError::WriteFailed {
                        address: cursor,
                        source,
                    })?;
                cursor = cursor.wrapping_add(room);
                rest = tail;
            }
            log::debug!("wrote {byte_count} bytes at {address:#010x}");
            Ok(())
        })?;
        self.state = SequencerState::Written;
        Ok(())
    }

    /// Reads `byte_count` bytes at `address` into the read buffer.
    ///
    /// Every command except [`ReadCommand::Read`] clocks one dummy byte.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::BufferTooSmall`] when the read buffer is too
    /// short and [`FlashError::ReadFailed`] when the command fails.
    pub fn read(
        &mut self,
        address: u32,
        byte_count: u32,
        command: ReadCommand,
    ) -> Result<(), FlashError> {
        self.stage(SequencerState::Written, Some(SequencerState::ReadBack), |this| {
            let capacity = this.read_buffer.len();
            let len = byte_count as usize;
            let buffer = this
                .read_buffer
                .get_mut(..len)
                .ok_or(FlashError::BufferTooSmall {
                    requested: len,
                    capacity,
                })?;
            let param = ReadParam {
                address,
                buffer,
                dummy_bytes: command.dummy_bytes(),
            };
            this.flash
                .read(&mut this.controller, command, param)
                .map_err(|source| FlashError::ReadFailed { address, source })?;
            this.bytes_read = len;
            log::debug!("read {byte_count} bytes at {address:#010x} with {}", command.name());
            Ok(())
        })?;
        self.state = SequencerState::ReadBack;
        Ok(())
    }

    /// Compares the read buffer against the pattern over the test region.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::VerificationFailed`] at the first mismatch.
    pub fn verify(&mut self) -> Result<(), FlashError> {
        self.stage(SequencerState::ReadBack, None, |this| {
            let config = this.config;
            let mismatch = this.read_buffer[..config.total_bytes()]
                .iter()
                .enumerate()
                .find(|&(index, &actual)| actual != config.expected_byte(index));
            match mismatch {
                Some((offset, &actual)) => Err(FlashError::VerificationFailed {
                    offset,
                    expected: config.expected_byte(offset),
                    actual,
                }),
                None => Ok(()),
            }
        })?;
        self.state = SequencerState::Verified;
        log::info!("verified {} bytes", self.config.total_bytes());
        Ok(())
    }

    /// Runs every stage with the configured region, pages and read command.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn run(&mut self, table: &impl ConfigTable) -> Result<(), FlashError> {
        let config = self.config;
        let region = u32::try_from(config.total_bytes())
            .map_err(|_| FlashError::InvalidConfig(crate::ConfigError::RegionOverflow))?;

        self.lookup_and_init(table)?;
        self.configure_library()?;
        self.erase(config.test_address, region)?;
        let mut page_address = config.test_address;
        for _ in 0..config.page_count {
            self.write(page_address, config.page_size)?;
            page_address = page_address.wrapping_add(config.page_size);
        }
        self.read(config.test_address, region, config.read_command)?;
        self.verify()
    }

    fn stage(
        &mut self,
        expected: SequencerState,
        repeat: Option<SequencerState>,
        op: impl FnOnce(&mut Self) -> Result<(), FlashError>,
    ) -> Result<(), FlashError> {
        if let Some(cause) = &self.failure {
            return Err(FlashError::Latched(Box::new(cause.clone())));
        }
        if self.state != expected && Some(self.state) != repeat {
            let error = FlashError::OutOfSequence {
                expected,
                actual: self.state,
            };
            if self.state == SequencerState::Verified {
                return Err(error);
            }
            return Err(self.latch(error));
        }
        op(self).map_err(|error| self.latch(error))
    }

    fn latch(&mut self, error: FlashError) -> FlashError {
        log::error!("flash sequence failed in {:?}: {error}", self.state);
        self.state = SequencerState::Failed;
        self.failure = Some(error.clone());
        error
    }

    fn issue_erase(&mut self, command: EraseCommand, address: u32) -> Result<(), FlashError> {
        self.flash
            .erase(&mut self.controller, command, address)
            .map_err(|source| FlashError::EraseFailed { address, source })
    }
}

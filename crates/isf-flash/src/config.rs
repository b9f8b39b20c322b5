//! Test-run parameters and the buffer sizes derived from them.

use crate::{ConfigError, ReadCommand};

/// Largest page size the transfer buffers are sized for.
pub const MAX_PAGE_SIZE: u32 = 1024;
/// Command and address bytes that precede data in a transfer buffer.
pub const DATA_OFFSET: usize = 5;
/// Extra command bytes the library needs beyond one page of scratch.
pub const XISF_CMD_SEND_EXTRA_BYTES: usize = 4;
/// Chip-select mask of the flash on the controller.
pub const FLASH_QSPI_SELECT: u8 = 0x01;

/// Default flash address exercised by a run.
pub const TEST_ADDRESS: u32 = 0x100_0000;
/// Default pattern base.
pub const UNIQUE_VALUE: u8 = 0x08;
/// Default pattern offset.
pub const TEST_OFFSET: u8 = 7;
/// Default page size.
pub const PAGE_SIZE: u32 = 256;
/// Default number of pages written.
pub const PAGE_COUNT: u32 = 2;

/// Parameters of one erase/write/read/verify run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct FlashTestConfig {
    /// Controller identifier looked up in the configuration table.
    pub qspi_device_id: u16,
    /// First flash address of the test region.
    pub test_address: u32,
    /// Bytes per programmed page.
    pub page_size: u32,
    /// Pages programmed.
    pub page_count: u32,
    /// Pattern base value.
    pub unique_value: u8,
    /// Pattern offset added to the base.
    pub test_offset: u8,
    /// Chip select handed to the library.
    pub chip_select: u8,
    /// Command used for read-back.
    pub read_command: ReadCommand,
}

impl Default for FlashTestConfig {
    fn default() -> Self {
        Self {
            qspi_device_id: 0,
            test_address: TEST_ADDRESS,
            page_size: PAGE_SIZE,
            page_count: PAGE_COUNT,
            unique_value: UNIQUE_VALUE,
            test_offset: TEST_OFFSET,
            chip_select: FLASH_QSPI_SELECT,
            read_command: ReadCommand::default(),
        }
    }
}

impl FlashTestConfig {
    /// Checks the configuration against the buffer limits.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when no page is written, the page size is
    /// outside `1..=MAX_PAGE_SIZE`, or the region wraps the address space.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_count == 0 {
            return Err(ConfigError::ZeroPages);
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::PageSize(self.page_size));
        }
        let total = u64::from(self.page_size) * u64::from(self.page_count);
        if u64::from(self.test_address) + total > 1u64 << 32 {
            return Err(ConfigError::RegionOverflow);
        }
        Ok(())
    }

    /// Bytes written, read and verified.
    #[must_use]
    pub const fn total_bytes(&self) -> usize {
        self.page_size as usize * self.page_count as usize
    }

    /// Pattern byte expected at `index`: base plus offset plus index, modulo 256.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn expected_byte(&self, index: usize) -> u8 {
        self.unique_value
            .wrapping_add(self.test_offset)
            .wrapping_add(index as u8)
    }

    /// Length of the write staging buffer.
    #[must_use]
    pub const fn write_buffer_len(&self) -> usize {
        self.max_data_len() + DATA_OFFSET
    }

    /// Length of the read buffer, with room for command and dummy bytes on
    /// every line of an eight-line read.
    #[must_use]
    pub const fn read_buffer_len(&self) -> usize {
        self.max_data_len() + (DATA_OFFSET + crate::DUMMY_SIZE as usize) * 8
    }

    const fn max_data_len(&self) -> usize {
        let by_max = MAX_PAGE_SIZE as usize * self.page_count as usize;
        let total = self.total_bytes();
        if total > by_max {
            total
        } else {
            by_max
        }
    }
}

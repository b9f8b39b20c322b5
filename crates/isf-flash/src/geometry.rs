//! Flash geometry, sector masks and erase planning.

use crate::{ConnectionMode, FlashError, XISF_CMD_SEND_EXTRA_BYTES};

/// Sector sizes with a defined erase mask.
pub const SUPPORTED_SECTOR_SIZES: [u32; 4] = [0x1_0000, 0x2_0000, 0x4_0000, 0x8_0000];

/// Physical layout of a serial-flash device (or stacked pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FlashGeometry {
    /// Bytes per erase sector.
    pub sector_size: u32,
    /// Sectors across the whole addressable space.
    pub num_sectors: u32,
    /// Bytes per program page.
    pub page_size: u32,
}

impl FlashGeometry {
    /// Total capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.sector_size as u64 * self.num_sectors as u64
    }

    /// Length of the command scratch buffer the library needs: one device
    /// page plus the command bytes sent ahead of it.
    #[must_use]
    pub const fn scratch_len(&self) -> usize {
        self.page_size as usize + XISF_CMD_SEND_EXTRA_BYTES
    }
}

/// Returns the address mask selecting the sector base for `sector_size`.
///
/// # Errors
///
/// Returns [`FlashError::UnsupportedSectorSize`] for sizes outside
/// [`SUPPORTED_SECTOR_SIZES`].
pub const fn sector_mask(sector_size: u32) -> Result<u32, FlashError> {
    match sector_size {
        0x1_0000 => Ok(0xFFFF_0000),
        0x2_0000 => Ok(0xFFFE_0000),
        0x4_0000 => Ok(0xFFFC_0000),
        0x8_0000 => Ok(0xFFF8_0000),
        other => Err(FlashError::UnsupportedSectorSize(other)),
    }
}

/// Number of sector erases issued for `byte_count` bytes at `address`.
///
/// Starts from `byte_count / sector_size + 1` and adds one more sector when
/// the masked end of the region lands in the same sector as the masked end
/// of the naive span. Address arithmetic wraps at 32 bits like the bus does.
///
/// `sector_size` must be non-zero.
#[must_use]
pub const fn sector_erase_count(
    address: u32,
    byte_count: u32,
    sector_size: u32,
    mask: u32,
) -> u32 {
    let mut count = (byte_count / sector_size).wrapping_add(1);
    let region_end = address.wrapping_add(byte_count) & mask;
    let span_end = address.wrapping_add(count.wrapping_mul(sector_size)) & mask;
    if region_end == span_end {
        count = count.wrapping_add(1);
    }
    count
}

/// Erase commands needed to clear a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErasePlan {
    /// Bulk erase the device; stacked pairs are erased one half at a time.
    Bulk {
        /// Erase lower then upper device.
        stacked: bool,
    },
    /// Consecutive sector erases.
    Sectors {
        /// Address of the first erase.
        start: u32,
        /// Number of erases.
        count: u32,
        /// Address step between erases.
        sector_size: u32,
    },
}

impl ErasePlan {
    /// Plans the erase of `byte_count` bytes at `address`.
    ///
    /// A region covering the full capacity becomes a bulk erase.
    ///
    /// # Errors
    ///
    /// Returns [`FlashError::UnsupportedSectorSize`] when the geometry has
    /// no defined sector mask.
    pub fn for_region(
        address: u32,
        byte_count: u32,
        geometry: &FlashGeometry,
        mode: ConnectionMode,
    ) -> Result<Self, FlashError> {
        let mask = sector_mask(geometry.sector_size)?;

        if u64::from(byte_count) == geometry.capacity() {
            return Ok(Self::Bulk {
                stacked: mode == ConnectionMode::Stacked,
            });
        }

        Ok(Self::Sectors {
            start: address,
            count: sector_erase_count(address, byte_count, geometry.sector_size, mask),
            sector_size: geometry.sector_size,
        })
    }

    /// Number of erase commands this plan issues.
    #[must_use]
    pub const fn commands(&self) -> u32 {
        match *self {
            Self::Bulk { stacked: true } => 2,
            Self::Bulk { stacked: false } => 1,
            Self::Sectors { count, .. } => count,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{sector_erase_count, sector_mask, ErasePlan, FlashGeometry};
    use crate::{ConnectionMode, FlashError};

    const N25Q256: FlashGeometry = FlashGeometry {
        sector_size: 0x1_0000,
        num_sectors: 512,
        page_size: 256,
    };

    #[rstest]
    #[case(0x1_0000, 0xFFFF_0000)]
    #[case(0x2_0000, 0xFFFE_0000)]
    #[case(0x4_0000, 0xFFFC_0000)]
    #[case(0x8_0000, 0xFFF8_0000)]
    fn defined_sector_masks(#[case] sector_size: u32, #[case] mask: u32) {
        assert_eq!(sector_mask(sector_size), Ok(mask));
    }

    #[rstest]
    #[case(0)]
    #[case(256)]
    #[case(0x1000)]
    #[case(0x10_0000)]
    fn other_sector_sizes_are_rejected(#[case] sector_size: u32) {
        assert_eq!(
            sector_mask(sector_size),
            Err(FlashError::UnsupportedSectorSize(sector_size))
        );
    }

    #[test]
    fn small_sector_count_starts_one_past_the_quotient() {
        assert_eq!(sector_erase_count(0x1000, 512, 256, 0xFFFF_FF00), 3);
    }

    #[test]
    fn aligned_sub_sector_region_erases_one_sector() {
        assert_eq!(sector_erase_count(0x100_0000, 512, 0x1_0000, 0xFFFF_0000), 1);
    }

    #[test]
    fn region_crossing_a_boundary_gets_the_extra_sector() {
        // 0x100_8000..0x101_1000 touches two sectors although 0x9000 < 0x1_0000.
        assert_eq!(sector_erase_count(0x100_8000, 0x9000, 0x1_0000, 0xFFFF_0000), 2);
    }

    #[test]
    fn whole_sector_region_over_erases_by_one() {
        assert_eq!(sector_erase_count(0x100_0000, 0x1_0000, 0x1_0000, 0xFFFF_0000), 2);
    }

    #[test]
    fn unmasked_sizes_wrap_instead_of_overflowing() {
        assert_eq!(sector_erase_count(0, u32::MAX, 1, 0xFFFF_FFFF), 0);
        assert_eq!(sector_erase_count(0, u32::MAX, 1, 0), 1);
    }

    #[test]
    fn scratch_covers_one_device_page_plus_command_bytes() {
        assert_eq!(N25Q256.scratch_len(), 260);
        let small_pages = FlashGeometry {
            page_size: 64,
            ..N25Q256
        };
        assert_eq!(small_pages.scratch_len(), 68);
    }

    #[test]
    fn full_capacity_is_a_bulk_erase() {
        let capacity = u32::try_from(N25Q256.capacity()).expect("fits");
        let single = ErasePlan::for_region(0, capacity, &N25Q256, ConnectionMode::Single);
        let stacked = ErasePlan::for_region(0, capacity, &N25Q256, ConnectionMode::Stacked);
        let parallel = ErasePlan::for_region(0, capacity, &N25Q256, ConnectionMode::Parallel);

        assert_eq!(single, Ok(ErasePlan::Bulk { stacked: false }));
        assert_eq!(stacked, Ok(ErasePlan::Bulk { stacked: true }));
        assert_eq!(parallel, Ok(ErasePlan::Bulk { stacked: false }));
        assert_eq!(stacked.map(|plan| plan.commands()), Ok(2));
    }

    #[test]
    fn partial_region_is_a_sector_loop() {
        let plan = ErasePlan::for_region(0x100_0000, 512, &N25Q256, ConnectionMode::Stacked);
        assert_eq!(
            plan,
            Ok(ErasePlan::Sectors {
                start: 0x100_0000,
                count: 1,
                sector_size: 0x1_0000,
            })
        );
    }

    #[test]
    fn unsupported_geometry_is_rejected_before_planning() {
        let geometry = FlashGeometry {
            sector_size: 0x1000,
            ..N25Q256
        };
        assert_eq!(
            ErasePlan::for_region(0, 512, &geometry, ConnectionMode::Single),
            Err(FlashError::UnsupportedSectorSize(0x1000))
        );
    }

    proptest! {
        #[test]
        fn property_sector_plan_covers_the_region(
            shift in 0usize..4,
            sector_index in 0u32..256,
            offset in 0u32..0x1_0000,
            byte_count in 1u32..0x40_0000,
        ) {
            let sector_size = 0x1_0000u32 << shift;
            let mask = sector_mask(sector_size).expect("supported size");
            let address = sector_index * 0x1_0000 + offset;
            let count = sector_erase_count(address, byte_count, sector_size, mask);

            let first_sector = u64::from(address & mask);
            let last_byte = u64::from(address) + u64::from(byte_count) - 1;
            let last_sector = last_byte & u64::from(mask);
            let touched = (last_sector - first_sector) / u64::from(sector_size) + 1;

            prop_assert!(u64::from(count) >= touched);
            prop_assert!(u64::from(count) <= touched + 2);
        }
    }
}

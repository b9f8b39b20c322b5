#![no_main]

use isf_flash::{
    sector_erase_count, sector_mask, ConnectionMode, ErasePlan, FlashGeometry,
    SUPPORTED_SECTOR_SIZES,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 11 {
        return;
    }

    let address = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let byte_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let num_sectors = u32::from(u16::from_le_bytes([data[8], data[9]]));
    let sector_size = SUPPORTED_SECTOR_SIZES[usize::from(data[10] % 4)];
    let mode = match data[10] >> 6 {
        0 => ConnectionMode::Single,
        1 => ConnectionMode::Stacked,
        _ => ConnectionMode::Parallel,
    };

    let geometry = FlashGeometry {
        sector_size,
        num_sectors,
        page_size: 256,
    };
    let Ok(mask) = sector_mask(sector_size) else {
        panic!("supported sector size {sector_size:#x} has no mask");
    };

    let count = sector_erase_count(address, byte_count, sector_size, mask);
    assert!(count >= byte_count / sector_size + 1);
    assert!(count <= byte_count / sector_size + 2);

    match ErasePlan::for_region(address, byte_count, &geometry, mode) {
        Ok(ErasePlan::Bulk { stacked }) => {
            assert_eq!(u64::from(byte_count), geometry.capacity());
            assert_eq!(stacked, mode == ConnectionMode::Stacked);
        }
        Ok(ErasePlan::Sectors {
            start,
            count: planned,
            ..
        }) => {
            assert_eq!(start, address);
            assert_eq!(planned, count);
        }
        Err(error) => panic!("planning failed for a supported size: {error}"),
    }
});

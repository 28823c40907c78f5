// Licensed under the Apache-2.0 license

use crc::{Crc, CRC_32_ISO_HDLC, CRC_8_SMBUS};

// Reflected 0xEDB88320 table with 0xFFFFFFFF init and xorout.
const PLDM_CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

// Polynomial 0x07, zero init, no reflection, no xorout.
const PLDM_CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Integrity checksum appended to the final part of a GetPLDMVersion transfer.
pub fn crc32(data: &[u8]) -> u32 {
    PLDM_CRC32.checksum(data)
}

/// Integrity checksum appended to the final part of a multipart GetPDR transfer.
pub fn crc8(data: &[u8]) -> u8 {
    PLDM_CRC8.checksum(data)
}

/// CRC-32 over a list of ver32 values in wire order.
pub fn crc32_ver32_list(versions: &[u32]) -> u32 {
    let mut digest = PLDM_CRC32.digest();
    for version in versions {
        digest.update(&version.to_le_bytes());
    }
    digest.finalize()
}

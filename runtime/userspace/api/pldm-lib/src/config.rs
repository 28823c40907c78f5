// Licensed under the Apache-2.0 license

use crate::control_context::ProtocolCapability;
use embassy_sync::lazy_lock::LazyLock;
use pldm_common::protocol::base::{PldmControlCmd, PldmSupportedType};
use pldm_common::protocol::platform::PlatformCmd;

pub const PLDM_PROTOCOL_CAP_COUNT: usize = 2;

/// Largest PLDM response, header included, that the responder produces.
pub const MAX_PLDM_RESPONSE_SIZE: usize = 125;

/// Record bytes carried by one GetPDR response.
pub const MAX_PDR_CHUNK_SIZE: usize = MAX_PLDM_RESPONSE_SIZE - 12;

/// Versions returned by a single GetPLDMVersion response.
pub const MAX_VERSIONS_PER_RESPONSE: usize = 8;

/// Upper bound on the versions registered for one PLDM type.
pub const MAX_PROTOCOL_VERSIONS: usize = 16;

/// One GetPLDMVersion transfer slot per PLDM type (6-bit type field).
pub const VERSION_TRANSFER_SLOTS: usize = 64;

/// One GetPDR transfer slot per record. Also the repository capacity.
pub const PDR_TRANSFER_SLOTS: usize = 100;

pub static PLDM_PROTOCOL_CAPABILITIES: LazyLock<
    [ProtocolCapability<'static>; PLDM_PROTOCOL_CAP_COUNT],
> = LazyLock::new(|| {
    [
        ProtocolCapability {
            pldm_type: PldmSupportedType::Base,
            protocol_version: 0xF1F1F000, //"1.1.0"
            supported_commands: &[
                PldmControlCmd::SetTid as u8,
                PldmControlCmd::GetTid as u8,
                PldmControlCmd::GetPldmCommands as u8,
                PldmControlCmd::GetPldmVersion as u8,
                PldmControlCmd::GetPldmTypes as u8,
            ],
        },
        ProtocolCapability {
            pldm_type: PldmSupportedType::Platform,
            protocol_version: 0xF1F2F200, // "1.2.2"
            supported_commands: &[
                PlatformCmd::SetNumericSensorEnable as u8,
                PlatformCmd::GetSensorReading as u8,
                PlatformCmd::GetPdrRepositoryInfo as u8,
                PlatformCmd::GetPdr as u8,
            ],
        },
    ]
});

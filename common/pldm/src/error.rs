// Licensed under the Apache-2.0 license

#[derive(Debug, Clone, PartialEq)]
pub enum PldmError {
    InvalidData,
    InvalidLength,
    InvalidMsgType,
    InvalidProtocolVersion,
    UnsupportedCmd,
    UnsupportedPldmType,
    InvalidCompletionCode,
    InvalidTransferOpFlag,
    InvalidTransferRespFlag,

    InvalidPdrType,
    InvalidRepositoryState,
    InvalidSensorOperationalState,
    InvalidEventMessageEnable,
    InvalidSensorDataSize,
    InvalidSensorState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UtilError {
    InvalidMctpPayloadLength,
    InvalidMctpMsgType,
}

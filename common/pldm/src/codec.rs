// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PldmCodecError {
    BufferTooShort,
    Unsupported,
}

/// Serialization of PLDM messages to and from their wire representation.
///
/// Fixed-size packed messages get this for free through zerocopy. Messages that
/// carry a variable-length tail (version lists, PDR record chunks) implement it
/// by hand on top of their fixed part.
pub trait PldmCodec: core::fmt::Debug + Sized {
    /// Writes the message to the start of `buffer` and returns the number of bytes written.
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError>;

    /// Reads a message from the start of `buffer`. Trailing bytes are ignored.
    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError>;
}

impl<T> PldmCodec for T
where
    T: core::fmt::Debug + Sized + FromBytes + IntoBytes + Immutable,
{
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        self.write_to_prefix(buffer)
            .map_err(|_| PldmCodecError::BufferTooShort)?;
        Ok(core::mem::size_of::<T>())
    }

    fn decode(buffer: &[u8]) -> Result<Self, PldmCodecError> {
        let (msg, _rest) =
            Self::read_from_prefix(buffer).map_err(|_| PldmCodecError::BufferTooShort)?;
        Ok(msg)
    }
}

/// Copies `tail` into `buffer` at `offset`, returning the new end offset.
pub fn encode_tail(buffer: &mut [u8], offset: usize, tail: &[u8]) -> Result<usize, PldmCodecError> {
    let end = offset
        .checked_add(tail.len())
        .ok_or(PldmCodecError::BufferTooShort)?;
    buffer
        .get_mut(offset..end)
        .ok_or(PldmCodecError::BufferTooShort)?
        .copy_from_slice(tail);
    Ok(end)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode_tail() {
        let mut buffer = [0u8; 6];
        let end = encode_tail(&mut buffer, 2, &[1, 2, 3]).unwrap();
        assert_eq!(end, 5);
        assert_eq!(buffer, [0, 0, 1, 2, 3, 0]);
        assert_eq!(
            encode_tail(&mut buffer, 4, &[1, 2, 3]),
            Err(PldmCodecError::BufferTooShort)
        );
    }
}

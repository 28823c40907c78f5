// Licensed under the Apache-2.0 license

//! Pending-transfer bookkeeping for multipart GetPLDMVersion and GetPDR.
//!
//! Each transfer key (PLDM type or record handle) owns one slot. The handle
//! given to the requester packs the slot index with the slot's generation and a
//! fixed marker byte, so a handle from a transfer that has since been restarted
//! or finished no longer resolves.

/// Marker stored in a live slot and in the top byte of every issued handle.
pub const TRANSFER_SENTINEL: u8 = 0x93;

const SENTINEL_SHIFT: u32 = 24;
const GENERATION_SHIFT: u32 = 16;
const KEY_MASK: u32 = 0xFFFF;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct TransferSlot {
    initialized: u8,
    generation: u8,
    offset: usize,
}

impl TransferSlot {
    fn is_live(&self) -> bool {
        self.initialized == TRANSFER_SENTINEL
    }
}

pub struct TransferTable<const N: usize> {
    slots: [TransferSlot; N],
}

impl<const N: usize> Default for TransferTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TransferTable<N> {
    pub const fn new() -> Self {
        Self {
            slots: [TransferSlot {
                initialized: 0,
                generation: 0,
                offset: 0,
            }; N],
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Discards any transfer in progress for `key` and opens a new one at
    /// offset 0. Returns false if `key` has no slot.
    pub fn start(&mut self, key: usize) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.initialized = TRANSFER_SENTINEL;
                slot.generation = slot.generation.wrapping_add(1);
                slot.offset = 0;
                true
            }
            None => false,
        }
    }

    /// Maps a requester-supplied handle to `(key, offset)` if it names a live
    /// transfer of the current generation.
    pub fn resolve(&self, handle: u32) -> Option<(usize, usize)> {
        if (handle >> SENTINEL_SHIFT) as u8 != TRANSFER_SENTINEL {
            return None;
        }
        let key = (handle & KEY_MASK) as usize;
        let generation = (handle >> GENERATION_SHIFT) as u8;
        let slot = self.slots.get(key)?;
        (slot.is_live() && slot.generation == generation).then_some((key, slot.offset))
    }

    pub fn advance(&mut self, key: usize, offset: usize) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.offset = offset;
        }
    }

    pub fn finish(&mut self, key: usize) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.initialized = 0;
            slot.offset = 0;
        }
    }

    pub fn is_live(&self, key: usize) -> bool {
        self.slots.get(key).is_some_and(TransferSlot::is_live)
    }

    /// Handle naming the current generation of `key`'s slot. Never 0.
    pub fn handle(&self, key: usize) -> u32 {
        let generation = self.slots.get(key).map_or(0, |s| s.generation);
        ((TRANSFER_SENTINEL as u32) << SENTINEL_SHIFT)
            | ((generation as u32) << GENERATION_SHIFT)
            | (key as u32 & KEY_MASK)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_handle_resolves_while_live() {
        let mut table = TransferTable::<8>::new();
        assert!(table.start(3));
        let handle = table.handle(3);
        assert_ne!(handle, 0);
        assert_eq!(handle >> 24, 0x93);
        assert_eq!(table.resolve(handle), Some((3, 0)));

        table.advance(3, 113);
        assert_eq!(table.resolve(handle), Some((3, 113)));

        table.finish(3);
        assert!(!table.is_live(3));
        assert_eq!(table.resolve(handle), None);
    }

    #[test]
    fn test_restart_invalidates_old_handle() {
        let mut table = TransferTable::<8>::new();
        table.start(1);
        let stale = table.handle(1);
        table.advance(1, 40);

        table.start(1);
        assert_eq!(table.resolve(stale), None);
        assert_eq!(table.resolve(table.handle(1)), Some((1, 0)));
    }

    #[test]
    fn test_foreign_handles_rejected() {
        let mut table = TransferTable::<4>::new();
        table.start(0);
        assert_eq!(table.resolve(0), None);
        assert_eq!(table.resolve(0x0001_0000), None);
        assert_eq!(table.resolve(0x9301_0009), None);
        assert!(!table.start(4));
        assert_eq!(table.capacity(), 4);
    }
}

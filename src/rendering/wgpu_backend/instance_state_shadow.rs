use std::{collections::HashMap, ops::Range};

use crate::rendering::{
    backend::{BackendError, InstanceStateHandle},
    config::RenderConfig,
};

/// CPU copy of the instance state table plus the handle to offset bookkeeping.
///
/// Every mutation returns the byte ranges whose shadow contents must be written
/// to the GPU buffer. Regions are zeroed when a binding is created, destroyed or
/// moved away, so a slot never shows another binding's state.
#[derive(Debug)]
pub struct InstanceStateShadow {
    bytes: Vec<u8>,
    unit_size: u64,
    slot_size: u64,
    bindings: HashMap<InstanceStateHandle, u32>,
    occupancy: HashMap<u32, InstanceStateHandle>,
    next_handle: u64,
}

/// Byte ranges touched by a relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatedRanges {
    pub destination: Range<usize>,
    /// Part of the old region outside the destination, now zeroed. May be empty.
    pub vacated: Range<usize>,
}

impl InstanceStateShadow {
    pub fn new(config: &RenderConfig) -> Self {
        let size = config.binding_capacity() as u64 * config.binding_unit_size as u64;

        Self {
            bytes: vec![0; size as usize],
            unit_size: config.binding_unit_size as u64,
            slot_size: config.slot_size(),
            bindings: HashMap::new(),
            occupancy: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Size of the whole table in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    pub fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.bytes[range]
    }

    /// The slot-sized region starting at `binding_offset`, live or not.
    pub fn region_at(&self, binding_offset: u32) -> Option<&[u8]> {
        let range = self.byte_range(binding_offset).ok()?;
        Some(&self.bytes[range])
    }

    fn capacity_units(&self) -> u32 {
        (self.bytes.len() as u64 / self.unit_size) as u32
    }

    fn byte_range(&self, binding_offset: u32) -> Result<Range<usize>, BackendError> {
        let start = binding_offset as u64 * self.unit_size;
        let end = start + self.slot_size;

        if end > self.bytes.len() as u64 {
            return Err(BackendError::CapacityExceeded {
                offset: binding_offset,
                capacity: self.capacity_units(),
            });
        }

        Ok(start as usize..end as usize)
    }

    fn offset_of(&self, handle: InstanceStateHandle) -> Result<u32, BackendError> {
        self.bindings
            .get(&handle)
            .copied()
            .ok_or(BackendError::UnknownHandle(handle))
    }

    fn check_vacant(
        &self,
        binding_offset: u32,
        mover: Option<InstanceStateHandle>,
    ) -> Result<(), BackendError> {
        match self.occupancy.get(&binding_offset) {
            Some(&occupant) if Some(occupant) != mover => {
                Err(BackendError::BindingOffsetOccupied {
                    offset: binding_offset,
                    occupant,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn create(
        &mut self,
        binding_offset: u32,
    ) -> Result<(InstanceStateHandle, Range<usize>), BackendError> {
        let range = self.byte_range(binding_offset)?;
        self.check_vacant(binding_offset, None)?;

        let handle = InstanceStateHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        self.bindings.insert(handle, binding_offset);
        self.occupancy.insert(binding_offset, handle);
        self.bytes[range.clone()].fill(0);

        Ok((handle, range))
    }

    pub fn destroy(&mut self, handle: InstanceStateHandle) -> Result<Range<usize>, BackendError> {
        let offset = self.offset_of(handle)?;
        let range = self.byte_range(offset)?;

        self.bytes[range.clone()].fill(0);
        self.bindings.remove(&handle);
        self.occupancy.remove(&offset);

        Ok(range)
    }

    pub fn relocate(
        &mut self,
        handle: InstanceStateHandle,
        new_binding_offset: u32,
    ) -> Result<RelocatedRanges, BackendError> {
        let from = self.offset_of(handle)?;
        let source = self.byte_range(from)?;
        let destination = self.byte_range(new_binding_offset)?;
        self.check_vacant(new_binding_offset, Some(handle))?;

        self.bytes.copy_within(source.clone(), destination.start);

        let vacated = if destination.start < source.start {
            destination.end.max(source.start)..source.end
        } else {
            source.start..destination.start.min(source.end)
        };
        self.bytes[vacated.clone()].fill(0);

        self.occupancy.remove(&from);
        self.occupancy.insert(new_binding_offset, handle);
        self.bindings.insert(handle, new_binding_offset);

        Ok(RelocatedRanges {
            destination,
            vacated,
        })
    }

    /// Writes `bytes` at the start of the handle's slot and zeroes the rest of it.
    pub fn upload(
        &mut self,
        handle: InstanceStateHandle,
        bytes: &[u8],
    ) -> Result<Range<usize>, BackendError> {
        if bytes.len() as u64 > self.slot_size {
            return Err(BackendError::StateTooLarge {
                size: bytes.len(),
                capacity: self.slot_size as usize,
            });
        }

        let range = self.byte_range(self.offset_of(handle)?)?;
        let region = &mut self.bytes[range.clone()];
        region[..bytes.len()].copy_from_slice(bytes);
        region[bytes.len()..].fill(0);

        Ok(range)
    }

    /// Dynamic offset in bytes for binding the handle's slot.
    pub fn dynamic_offset(&self, handle: InstanceStateHandle) -> Result<u32, BackendError> {
        let offset = self.offset_of(handle)?;
        Ok((offset as u64 * self.unit_size) as u32)
    }

    pub fn live_bindings(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: usize = 16;

    fn shadow(binding_stride: u32) -> InstanceStateShadow {
        InstanceStateShadow::new(&RenderConfig {
            binding_stride,
            max_instance_slots: 8,
            binding_unit_size: UNIT as u32,
        })
    }

    #[test]
    fn test_relocated_state_is_readable_at_destination() {
        let mut shadow = shadow(1);
        let handle = shadow.create(3).unwrap().0;
        shadow.upload(handle, &[9; 8]).unwrap();

        let ranges = shadow.relocate(handle, 1).unwrap();

        assert_eq!(ranges.destination, UNIT..2 * UNIT);
        assert_eq!(ranges.vacated, 3 * UNIT..4 * UNIT);
        assert_eq!(&shadow.region_at(1).unwrap()[..8], &[9u8; 8]);
        assert_eq!(shadow.region_at(3).unwrap(), &[0u8; UNIT]);
        assert_eq!(shadow.dynamic_offset(handle), Ok(UNIT as u32));
    }

    #[test]
    fn test_slot_created_after_relocation_reads_zeros() {
        let mut shadow = shadow(1);
        let a = shadow.create(0).unwrap().0;
        let b = shadow.create(1).unwrap().0;
        shadow.upload(b, &[5; UNIT]).unwrap();

        shadow.destroy(a).unwrap();
        shadow.relocate(b, 0).unwrap();
        let (c, range) = shadow.create(1).unwrap();

        assert_eq!(range, UNIT..2 * UNIT);
        assert_eq!(shadow.bytes(range), &[0u8; UNIT]);
        assert_eq!(shadow.region_at(0).unwrap(), &[5u8; UNIT]);
        assert_eq!(shadow.offset_of(c), Ok(1));
    }

    #[test]
    fn test_create_clears_leftover_bytes() {
        let mut shadow = shadow(1);
        let first = shadow.create(2).unwrap().0;
        shadow.upload(first, &[7; UNIT]).unwrap();
        shadow.destroy(first).unwrap();
        assert_eq!(shadow.region_at(2).unwrap(), &[0u8; UNIT]);

        let (second, range) = shadow.create(2).unwrap();

        assert_ne!(first, second);
        assert_eq!(shadow.bytes(range), &[0u8; UNIT]);
    }

    #[test]
    fn test_overlapping_relocation_clears_only_uncovered_source() {
        let mut shadow = shadow(2);
        let handle = shadow.create(2).unwrap().0;
        shadow.upload(handle, &[1; 2 * UNIT]).unwrap();

        let ranges = shadow.relocate(handle, 1).unwrap();

        assert_eq!(ranges.destination, UNIT..3 * UNIT);
        assert_eq!(ranges.vacated, 3 * UNIT..4 * UNIT);
        assert_eq!(shadow.region_at(1).unwrap(), &[1u8; 2 * UNIT]);
        assert_eq!(&shadow.region_at(2).unwrap()[UNIT..], &[0u8; UNIT]);
    }

    #[test]
    fn test_relocation_onto_live_binding_changes_nothing() {
        let mut shadow = shadow(1);
        let low = shadow.create(0).unwrap().0;
        let high = shadow.create(1).unwrap().0;
        shadow.upload(low, &[2; 4]).unwrap();
        shadow.upload(high, &[3; 4]).unwrap();

        let err = shadow.relocate(high, 0).unwrap_err();

        assert_eq!(
            err,
            BackendError::BindingOffsetOccupied {
                offset: 0,
                occupant: low,
            }
        );
        assert_eq!(&shadow.region_at(0).unwrap()[..4], &[2u8; 4]);
        assert_eq!(&shadow.region_at(1).unwrap()[..4], &[3u8; 4]);
    }

    #[test]
    fn test_offsets_beyond_capacity_are_rejected() {
        let mut shadow = shadow(2);

        assert_eq!(
            shadow.create(15).unwrap_err(),
            BackendError::CapacityExceeded {
                offset: 15,
                capacity: 16,
            }
        );
        assert!(shadow.create(14).is_ok());
        assert_eq!(
            shadow.upload(InstanceStateHandle::from_raw(99), &[0; 4]),
            Err(BackendError::UnknownHandle(InstanceStateHandle::from_raw(99)))
        );
    }

    #[test]
    fn test_oversized_state_is_rejected() {
        let mut shadow = shadow(1);
        let handle = shadow.create(0).unwrap().0;

        assert_eq!(
            shadow.upload(handle, &[0; UNIT + 1]),
            Err(BackendError::StateTooLarge {
                size: UNIT + 1,
                capacity: UNIT,
            })
        );
    }
}

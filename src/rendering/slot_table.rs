use std::ops::Range;

/// A contiguous block of binding slots owned by one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRange {
    pub first: u32,
    pub count: u32,
}

impl SlotRange {
    pub fn new(first: u32, count: u32) -> Self {
        Self { first, count }
    }

    pub fn end(&self) -> u32 {
        self.first + self.count
    }

    pub fn contains(&self, slot: u32) -> bool {
        (self.first..self.end()).contains(&slot)
    }

    pub fn slots(&self) -> Range<u32> {
        self.first..self.end()
    }
}

/// A surviving owner whose slots moved down after a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation<K> {
    pub owner: K,
    pub from: SlotRange,
    pub to: SlotRange,
}

/// Result of [`SlotTable::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release<K> {
    pub released: SlotRange,
    /// Owners that moved, in ascending order of their original slots.
    pub relocations: Vec<Relocation<K>>,
}

/// Dense assignment of binding slots to owners.
///
/// The occupied slots always form `0..len()`; ranges are kept sorted by their
/// first slot, which is also the order relocations must be applied in.
#[derive(Debug, Clone)]
pub struct SlotTable<K> {
    ranges: Vec<(K, SlotRange)>,
}

impl<K> Default for SlotTable<K> {
    fn default() -> Self {
        Self { ranges: Vec::new() }
    }
}

impl<K: Copy + Eq> SlotTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `count` slots after the highest occupied one.
    pub fn allocate(&mut self, owner: K, count: u32) -> SlotRange {
        debug_assert!(
            self.range_of(owner).is_none(),
            "owner already holds a slot range"
        );

        let range = SlotRange::new(self.len(), count);
        self.ranges.push((owner, range));
        range
    }

    /// Frees the owner's slots and shifts every later range down to close the gap.
    ///
    /// Returns `None` if `owner` holds no slots.
    pub fn release(&mut self, owner: K) -> Option<Release<K>> {
        let position = self.ranges.iter().position(|(key, _)| *key == owner)?;
        let (_, released) = self.ranges.remove(position);

        let relocations = self.ranges[position..]
            .iter_mut()
            .map(|(key, range)| {
                let from = *range;
                range.first -= released.count;

                Relocation {
                    owner: *key,
                    from,
                    to: *range,
                }
            })
            .collect();

        debug_assert!(self.is_dense());

        Some(Release {
            released,
            relocations,
        })
    }

    pub fn range_of(&self, owner: K) -> Option<SlotRange> {
        self.ranges
            .iter()
            .find(|(key, _)| *key == owner)
            .map(|(_, range)| *range)
    }

    /// Owner of the given slot, if any.
    pub fn owner_of(&self, slot: u32) -> Option<K> {
        self.ranges
            .iter()
            .find(|(_, range)| range.contains(slot))
            .map(|(key, _)| *key)
    }

    /// Total number of occupied slots.
    pub fn len(&self) -> u32 {
        self.ranges.last().map_or(0, |(_, range)| range.end())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owner_count(&self) -> usize {
        self.ranges.len()
    }

    /// Ranges in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (K, SlotRange)> + '_ {
        self.ranges.iter().copied()
    }

    /// Every occupied slot index, ascending.
    pub fn occupied_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|(_, range)| range.slots())
    }

    /// Checks that the ranges tile `0..len()` without gaps or overlaps.
    pub fn is_dense(&self) -> bool {
        let mut next = 0;

        for (_, range) in &self.ranges {
            if range.first != next {
                return false;
            }
            next = range.end();
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_appends_contiguous_ranges() {
        let mut table = SlotTable::new();

        assert_eq!(table.allocate('a', 2), SlotRange::new(0, 2));
        assert_eq!(table.allocate('b', 3), SlotRange::new(2, 3));
        assert_eq!(table.allocate('c', 1), SlotRange::new(5, 1));

        assert_eq!(table.len(), 6);
        assert!(table.is_dense());
        assert_eq!(table.occupied_slots().collect::<Vec<_>>(), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_release_middle_shifts_later_owners() {
        let mut table = SlotTable::new();
        table.allocate('a', 2);
        table.allocate('b', 3);
        table.allocate('c', 1);

        let release = table.release('b').unwrap();

        assert_eq!(release.released, SlotRange::new(2, 3));
        assert_eq!(
            release.relocations,
            vec![Relocation {
                owner: 'c',
                from: SlotRange::new(5, 1),
                to: SlotRange::new(2, 1),
            }]
        );
        assert_eq!(table.range_of('a'), Some(SlotRange::new(0, 2)));
        assert_eq!(table.range_of('c'), Some(SlotRange::new(2, 1)));
        assert!(table.is_dense());
    }

    #[test]
    fn test_release_first_relocates_in_ascending_order() {
        let mut table = SlotTable::new();
        table.allocate(1, 1);
        table.allocate(2, 2);
        table.allocate(3, 4);

        let release = table.release(1).unwrap();
        let owners: Vec<_> = release.relocations.iter().map(|r| r.owner).collect();

        assert_eq!(owners, vec![2, 3]);
        assert_eq!(release.relocations[0].to, SlotRange::new(0, 2));
        assert_eq!(release.relocations[1].to, SlotRange::new(2, 4));
    }

    #[test]
    fn test_release_last_relocates_nothing() {
        let mut table = SlotTable::new();
        table.allocate('a', 2);
        table.allocate('b', 3);

        let release = table.release('b').unwrap();

        assert!(release.relocations.is_empty());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_release_unknown_owner() {
        let mut table: SlotTable<u32> = SlotTable::new();
        table.allocate(7, 1);

        assert!(table.release(8).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_allocate_after_release_reuses_tail() {
        let mut table = SlotTable::new();
        table.allocate('a', 2);
        table.allocate('b', 2);
        table.release('a');

        assert_eq!(table.allocate('c', 1), SlotRange::new(2, 1));
        assert_eq!(table.owner_of(0), Some('b'));
        assert_eq!(table.owner_of(2), Some('c'));
        assert_eq!(table.owner_of(3), None);
    }

    #[test]
    fn test_density_over_mixed_sequence() {
        let mut table = SlotTable::new();
        let counts = [3, 1, 4, 1, 5, 9, 2, 6];

        for (owner, count) in counts.iter().enumerate() {
            table.allocate(owner, *count);
        }

        for owner in [4, 0, 7, 2] {
            table.release(owner);
            assert!(table.is_dense());
        }

        let expected: u32 = [1, 1, 9, 2].iter().sum();
        assert_eq!(table.len(), expected);
        assert_eq!(table.owner_count(), 4);
    }
}

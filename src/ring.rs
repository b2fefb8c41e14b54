//! The index kernel shared by every deque in this crate.
//!
//! A [`Ring`] holds no elements. It tracks a power-of-two `capacity` and two
//! logical counters, `front` and `back`, and tells the caller which physical
//! slot of its storage to read or write. Storage can be owned by the caller,
//! as with [`Ring::init`] and [`Ring::expand`], or by a wrapper such as
//! [`CounterDeque`].
//!
//! Counters grow (and shrink) without bound using wrapping arithmetic. Since
//! every capacity is a power of two, it divides `2^usize::BITS`, so the slot of
//! a counter stays well defined even when the counter itself wraps around.
//!
//! [`CounterDeque`]: crate::CounterDeque

use std::alloc::Layout;
use std::iter::FusedIterator;

use crate::error::TryReserveError;

/// Capacity of the first allocation made by an expansion of an unallocated
/// (or single-slot) ring.
pub const MIN_EXPAND_CAPACITY: usize = 4;

/// Index state of a power-of-two ring buffer.
///
/// The live elements occupy the logical counters `back..front`; the element
/// at counter `c` lives in slot `c & (capacity - 1)`.
///
/// The push and pop methods do not check their preconditions outside of debug
/// builds: pushing into a full ring or popping from an empty one corrupts the
/// ring. Call [`expand`] (or one of its variants) before pushing into a full
/// ring.
///
/// # Example
///
/// ```
/// use counter_deque::Ring;
///
/// let mut ring = Ring::new();
/// let mut data: Box<[i32]> = ring.init(2);
///
/// for value in [1, 2, 3] {
///     if ring.is_full() {
///         data = ring.expand(data);
///     }
///     let counter = ring.push_back();
///     data[ring.slot(counter)] = value;
/// }
///
/// assert_eq!(ring.capacity(), 4);
/// let front = ring.pop_front();
/// assert_eq!(data[ring.slot(front)], 1);
/// ```
///
/// [`expand`]: Ring::expand
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Ring {
    capacity: usize,
    front: usize,
    back: usize,
}

impl Ring {
    /// Creates an empty ring with no capacity.
    pub const fn new() -> Self {
        Ring {
            capacity: 0,
            front: 0,
            back: 0,
        }
    }

    /// Creates an empty ring able to hold at least `requested` elements.
    ///
    /// The capacity is rounded up to a power of two; a request of 0 yields a
    /// ring with no capacity.
    ///
    /// # Panics
    ///
    /// Panics if the rounded capacity does not fit in `usize`.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::Ring;
    ///
    /// assert_eq!(Ring::with_capacity(0).capacity(), 0);
    /// assert_eq!(Ring::with_capacity(1).capacity(), 1);
    /// assert_eq!(Ring::with_capacity(5).capacity(), 8);
    /// ```
    pub fn with_capacity(requested: usize) -> Self {
        match Self::try_with_capacity(requested) {
            Ok(ring) => ring,
            Err(_) => panic!("capacity overflow"),
        }
    }

    /// Like [`with_capacity`], but reports an oversized request instead of
    /// panicking.
    ///
    /// [`with_capacity`]: Ring::with_capacity
    pub fn try_with_capacity(requested: usize) -> Result<Self, TryReserveError> {
        let capacity = if requested == 0 {
            0
        } else {
            requested
                .checked_next_power_of_two()
                .ok_or(TryReserveError::CapacityOverflow)?
        };

        Ok(Ring {
            capacity,
            front: 0,
            back: 0,
        })
    }

    /// Resets the ring to hold at least `requested` elements and returns a
    /// fresh storage block with one slot per element of capacity.
    ///
    /// Allocation failure aborts the process.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::Ring;
    ///
    /// let mut ring = Ring::new();
    /// let data: Box<[u8]> = ring.init(3);
    ///
    /// assert_eq!(ring.capacity(), 4);
    /// assert_eq!(data.len(), 4);
    /// assert!(ring.is_empty());
    /// ```
    pub fn init<T: Copy + Default>(&mut self, requested: usize) -> Box<[T]> {
        *self = Ring::with_capacity(requested);
        vec![T::default(); self.capacity].into_boxed_slice()
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.front.wrapping_sub(self.back)
    }

    /// Returns `true` if the ring holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.front == self.back
    }

    /// Returns `true` if no element can be pushed without expanding. A ring
    /// with no capacity is both empty and full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// The counter just past the front-most element.
    #[inline]
    pub fn front_counter(&self) -> usize {
        self.front
    }

    /// The counter of the back-most element, if any.
    #[inline]
    pub fn back_counter(&self) -> usize {
        self.back
    }

    /// Returns `true` if `counter` names a live element.
    #[inline]
    pub fn contains(&self, counter: usize) -> bool {
        counter.wrapping_sub(self.back) < self.len()
    }

    /// Maps a logical counter to its physical slot. Always 0 when the ring
    /// has no capacity.
    #[inline]
    pub fn slot(&self, counter: usize) -> usize {
        counter & self.capacity.saturating_sub(1)
    }

    /// Slot of the element `offset` positions behind the front; 0 is the
    /// front-most element.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not less than [`len`](Ring::len).
    pub fn front_slot(&self, offset: usize) -> usize {
        assert!(offset < self.len(), "offset out of bounds");
        self.slot(self.front.wrapping_sub(offset).wrapping_sub(1))
    }

    /// Slot of the element `offset` positions ahead of the back; 0 is the
    /// back-most element.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not less than [`len`](Ring::len).
    pub fn back_slot(&self, offset: usize) -> usize {
        assert!(offset < self.len(), "offset out of bounds");
        self.slot(self.back.wrapping_add(offset))
    }

    /// Claims a new element at the front and returns its counter. The ring
    /// must not be full.
    #[inline]
    pub fn push_front(&mut self) -> usize {
        debug_assert!(!self.is_full(), "push into a full ring");
        let counter = self.front;
        self.front = self.front.wrapping_add(1);
        counter
    }

    /// Releases the front-most element and returns its counter. The ring
    /// must not be empty.
    #[inline]
    pub fn pop_front(&mut self) -> usize {
        debug_assert!(!self.is_empty(), "pop from an empty ring");
        self.front = self.front.wrapping_sub(1);
        self.front
    }

    /// Claims a new element at the back and returns its counter. The ring
    /// must not be full.
    #[inline]
    pub fn push_back(&mut self) -> usize {
        debug_assert!(!self.is_full(), "push into a full ring");
        self.back = self.back.wrapping_sub(1);
        self.back
    }

    /// Releases the back-most element and returns its counter. The ring must
    /// not be empty.
    #[inline]
    pub fn pop_back(&mut self) -> usize {
        debug_assert!(!self.is_empty(), "pop from an empty ring");
        let counter = self.back;
        self.back = self.back.wrapping_add(1);
        counter
    }

    /// Forgets every element and rewinds both counters to 0. The capacity is
    /// kept.
    pub fn clear(&mut self) {
        self.front = 0;
        self.back = 0;
    }

    /// The capacity the next expansion will grow to: twice the current one,
    /// but at least [`MIN_EXPAND_CAPACITY`].
    pub fn next_capacity(&self) -> Result<usize, TryReserveError> {
        self.capacity
            .checked_mul(2)
            .map(|doubled| doubled.max(MIN_EXPAND_CAPACITY))
            .ok_or(TryReserveError::CapacityOverflow)
    }

    /// Walks the live elements as maximal runs that are contiguous both in
    /// the current storage and in a storage of `new_capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `new_capacity` is not a power of two or is smaller than the
    /// current capacity.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::{Ring, Run};
    ///
    /// let mut ring = Ring::with_capacity(4);
    /// ring.push_back();
    /// ring.push_front();
    /// ring.push_front();
    ///
    /// // counter -1 lives in the last slot, counters 0 and 1 wrap to the start
    /// let runs: Vec<Run> = ring.runs(8).collect();
    /// assert_eq!(
    ///     runs,
    ///     [Run { src: 3, dst: 7, len: 1 }, Run { src: 0, dst: 0, len: 2 }]
    /// );
    /// ```
    pub fn runs(&self, new_capacity: usize) -> Runs {
        assert!(
            new_capacity.is_power_of_two() && new_capacity >= self.capacity,
            "runs into a capacity of {new_capacity} from {}",
            self.capacity
        );

        Runs {
            idx: self.back,
            front: self.front,
            old_capacity: self.capacity,
            new_mask: new_capacity - 1,
        }
    }

    /// Doubles the capacity (to at least [`MIN_EXPAND_CAPACITY`]), moving the
    /// live elements of `storage` into a new block, and returns that block.
    ///
    /// Counters are unchanged: a counter that named a live element before the
    /// expansion names the same element afterwards. `storage` must be the
    /// block previously returned by [`init`] or `expand` for this ring.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity does not fit in `usize`. Allocation failure
    /// aborts the process.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::Ring;
    ///
    /// let mut ring = Ring::new();
    /// let mut data: Box<[char]> = ring.init(0);
    ///
    /// data = ring.expand(data);
    /// let a = ring.push_front();
    /// data[ring.slot(a)] = 'a';
    ///
    /// data = ring.expand(data);
    /// assert_eq!(ring.capacity(), 8);
    /// assert_eq!(data[ring.slot(a)], 'a');
    /// ```
    ///
    /// [`init`]: Ring::init
    pub fn expand<T: Copy + Default>(&mut self, storage: Box<[T]>) -> Box<[T]> {
        debug_assert_eq!(storage.len(), self.capacity, "stale storage");

        let new_capacity = match self.next_capacity() {
            Ok(new_capacity) => new_capacity,
            Err(_) => panic!("capacity overflow"),
        };
        let mut new_storage = vec![T::default(); new_capacity].into_boxed_slice();
        self.relocate(&storage, &mut new_storage);
        new_storage
    }

    /// Like [`expand`], but reports allocation failure instead of aborting.
    ///
    /// The old block is only borrowed: on error both the ring and `storage`
    /// are left as they were; on success the caller replaces `storage` with
    /// the returned block.
    ///
    /// [`expand`]: Ring::expand
    pub fn try_expand<T: Copy + Default>(
        &mut self,
        storage: &[T],
    ) -> Result<Box<[T]>, TryReserveError> {
        debug_assert_eq!(storage.len(), self.capacity, "stale storage");

        let new_capacity = self.next_capacity()?;
        let layout =
            Layout::array::<T>(new_capacity).map_err(|_| TryReserveError::CapacityOverflow)?;

        let mut new_storage = Vec::new();
        if new_storage.try_reserve_exact(new_capacity).is_err() {
            log::debug!("could not allocate {} bytes for a ring expansion", layout.size());
            return Err(TryReserveError::AllocError { layout });
        }
        new_storage.resize(new_capacity, T::default());

        let mut new_storage = new_storage.into_boxed_slice();
        self.relocate(storage, &mut new_storage);
        Ok(new_storage)
    }

    fn relocate<T: Copy>(&mut self, old: &[T], new: &mut [T]) {
        for Run { src, dst, len } in self.runs(new.len()) {
            new[dst..dst + len].copy_from_slice(&old[src..src + len]);
        }
        self.grow_to(new.len());
    }

    /// Adopts `new_capacity` once the caller has moved the live elements into
    /// storage of that size.
    #[cfg(test)]
    pub(crate) fn with_counters(capacity: usize, back: usize, front: usize) -> Self {
        Ring {
            capacity,
            front,
            back,
        }
    }

    pub(crate) fn grow_to(&mut self, new_capacity: usize) {
        log::trace!(
            "expanded ring from {} to {} slots with {} live elements",
            self.capacity,
            new_capacity,
            self.len()
        );
        self.capacity = new_capacity;
    }
}

/// A block of live elements moved in one piece by an expansion.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Run {
    /// First slot in the old storage.
    pub src: usize,
    /// First slot in the new storage.
    pub dst: usize,
    /// Number of elements.
    pub len: usize,
}

/// Iterator over the [`Run`]s of a ring, created by [`Ring::runs`].
///
/// Because the live range never exceeds the old capacity it wraps at most
/// once, so there are at most two runs.
#[derive(Clone, Debug)]
pub struct Runs {
    idx: usize,
    front: usize,
    old_capacity: usize,
    new_mask: usize,
}

impl Iterator for Runs {
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        if self.idx == self.front {
            return None;
        }

        // a non-empty live range implies old_capacity > 0
        let src = self.idx & (self.old_capacity - 1);
        let can_copy = self.old_capacity - src;
        let want_copy = self.front.wrapping_sub(self.idx);
        let len = can_copy.min(want_copy);

        let run = Run {
            src,
            dst: self.idx & self.new_mask,
            len,
        };
        self.idx = self.idx.wrapping_add(len);
        Some(run)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.idx == self.front {
            (0, Some(0))
        } else {
            (1, Some(2))
        }
    }
}

impl FusedIterator for Runs {}

#[cfg(test)]
mod tests {
    use super::{Ring, Run, MIN_EXPAND_CAPACITY};
    use crate::error::TryReserveError;

    fn push_front_growing(ring: &mut Ring, data: &mut Box<[i32]>, value: i32) {
        if ring.is_full() {
            *data = ring.expand(std::mem::take(data));
        }
        let counter = ring.push_front();
        data[ring.slot(counter)] = value;
    }

    fn push_back_growing(ring: &mut Ring, data: &mut Box<[i32]>, value: i32) {
        if ring.is_full() {
            *data = ring.expand(std::mem::take(data));
        }
        let counter = ring.push_back();
        data[ring.slot(counter)] = value;
    }

    #[test]
    fn init_rounds_smallest_request() {
        let mut ring = Ring::new();
        let data: Box<[u32]> = ring.init(1);

        assert_eq!(ring.capacity(), 1);
        assert_eq!(data.len(), 1);
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn init_zero_capacity() {
        let mut ring = Ring::new();
        let data: Box<[u64]> = ring.init(0);

        assert_eq!(ring.capacity(), 0);
        assert!(data.is_empty());
        assert!(ring.is_empty());
        assert!(ring.is_full());
    }

    #[test]
    fn init_resets_counters() {
        let mut ring = Ring::with_capacity(4);
        ring.push_back();
        ring.push_front();

        let _: Box<[u8]> = ring.init(16);

        assert_eq!(ring, Ring::with_capacity(16));
        assert_eq!((ring.front_counter(), ring.back_counter()), (0, 0));
    }

    #[test]
    fn with_capacity_rounds_to_power_of_two() {
        for (requested, expected) in [(0, 0), (1, 1), (2, 2), (3, 4), (4, 4), (5, 8), (1000, 1024)] {
            assert_eq!(Ring::with_capacity(requested).capacity(), expected, "{requested}");
        }
    }

    #[test]
    fn try_with_capacity_overflow() {
        let result = Ring::try_with_capacity(usize::MAX / 2 + 2);

        assert_eq!(result, Err(TryReserveError::CapacityOverflow));
    }

    #[test]
    fn empty_ring_queries() {
        let ring = Ring::with_capacity(8);

        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert_eq!(ring.is_full(), ring.capacity() == 0);
        assert!(!ring.contains(0));
    }

    #[test]
    fn slot_of_unallocated_ring() {
        let ring = Ring::new();

        assert_eq!(ring.slot(0), 0);
        assert_eq!(ring.slot(12345), 0);
    }

    #[test]
    fn push_pop_counters() {
        let mut ring = Ring::with_capacity(4);

        assert_eq!(ring.push_front(), 0);
        assert_eq!(ring.push_front(), 1);
        assert_eq!(ring.push_back(), usize::MAX);
        assert_eq!(ring.len(), 3);

        assert_eq!(ring.pop_front(), 1);
        assert_eq!(ring.pop_back(), usize::MAX);
        assert_eq!(ring.pop_back(), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn growth_floor() {
        let mut ring = Ring::new();
        let mut data: Box<[i32]> = ring.init(0);
        let mut capacities = vec![ring.capacity()];

        for value in 1..=3 {
            push_front_growing(&mut ring, &mut data, value);
            capacities.push(ring.capacity());
        }

        assert_eq!(capacities, [0, 4, 4, 4]);
    }

    #[test]
    fn expand_from_single_slot_jumps_to_floor() {
        let mut ring = Ring::new();
        let mut data: Box<[i32]> = ring.init(1);
        push_front_growing(&mut ring, &mut data, 7);

        data = ring.expand(data);

        assert_eq!(ring.capacity(), MIN_EXPAND_CAPACITY);
        assert_eq!(data[ring.front_slot(0)], 7);
    }

    #[test]
    fn wrapped_copy_keeps_order() {
        let mut ring = Ring::new();
        let mut data: Box<[i32]> = ring.init(4);

        push_back_growing(&mut ring, &mut data, 10);
        push_back_growing(&mut ring, &mut data, 20);
        let popped = ring.pop_back();
        assert_eq!(data[ring.slot(popped)], 20);
        for value in [30, 40, 50] {
            push_front_growing(&mut ring, &mut data, value);
        }
        // back-to-front: 10 in slot 3, then 30 40 50 wrapped into slots 0..3
        assert!(ring.is_full());
        assert_eq!(data[..], [30, 40, 50, 10]);

        data = ring.expand(data);
        assert_eq!(ring.capacity(), 8);

        let mut popped = Vec::new();
        while !ring.is_empty() {
            let counter = ring.pop_back();
            popped.push(data[ring.slot(counter)]);
        }
        assert_eq!(popped, [10, 30, 40, 50]);
    }

    #[test]
    fn counter_identity_across_expand() {
        let mut ring = Ring::new();
        let mut data: Box<[i32]> = ring.init(4);
        for value in [100, 101, 102, 103] {
            push_front_growing(&mut ring, &mut data, value);
        }
        assert_eq!((ring.back_counter(), ring.front_counter()), (0, 4));
        assert_eq!(ring.slot(2), 2);
        let before = data[ring.slot(2)];

        data = ring.expand(data);

        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.slot(2), 2);
        assert_eq!(data[ring.slot(2)], before);
    }

    #[test]
    fn counter_identity_across_counter_wrap() {
        let mut ring = Ring::new();
        let mut data: Box<[i32]> = ring.init(4);
        // push at the back so counters straddle usize::MAX / 0
        for value in 0..6 {
            push_back_growing(&mut ring, &mut data, value);
        }
        for value in 6..9 {
            push_front_growing(&mut ring, &mut data, value);
        }
        let recorded: Vec<(usize, i32)> = (0..ring.len())
            .map(|offset| {
                let counter = ring.back_counter().wrapping_add(offset);
                (counter, data[ring.slot(counter)])
            })
            .collect();

        data = ring.expand(data);

        for (counter, value) in recorded {
            assert!(ring.contains(counter));
            assert_eq!(data[ring.slot(counter)], value, "counter {counter}");
        }
    }

    #[test]
    fn offset_addressing() {
        let mut ring = Ring::new();
        let mut data: Box<[i32]> = ring.init(4);
        push_back_growing(&mut ring, &mut data, 1);
        push_back_growing(&mut ring, &mut data, 2);
        push_front_growing(&mut ring, &mut data, 3);

        assert_eq!(data[ring.front_slot(0)], 3);
        assert_eq!(data[ring.front_slot(1)], 1);
        assert_eq!(data[ring.front_slot(2)], 2);
        assert_eq!(data[ring.back_slot(0)], 2);
        assert_eq!(data[ring.back_slot(2)], 3);
    }

    #[test]
    #[should_panic(expected = "offset out of bounds")]
    fn front_slot_out_of_bounds() {
        let mut ring = Ring::with_capacity(4);
        ring.push_front();

        ring.front_slot(1);
    }

    #[test]
    #[should_panic(expected = "offset out of bounds")]
    fn back_slot_on_empty() {
        Ring::with_capacity(4).back_slot(0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "push into a full ring")]
    fn push_into_full_ring() {
        let mut ring = Ring::with_capacity(1);
        ring.push_back();

        ring.push_front();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "push into a full ring")]
    fn push_into_unallocated_ring() {
        Ring::new().push_back();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "pop from an empty ring")]
    fn pop_from_empty_ring() {
        Ring::with_capacity(4).pop_back();
    }

    #[test]
    fn runs_of_empty_ring() {
        assert_eq!(Ring::new().runs(4).count(), 0);
        assert_eq!(Ring::with_capacity(8).runs(16).count(), 0);
    }

    #[test]
    #[should_panic(expected = "runs into a capacity of 0 from 0")]
    fn runs_into_zero_capacity() {
        Ring::new().runs(0);
    }

    #[test]
    #[should_panic(expected = "runs into a capacity of 4 from 8")]
    fn runs_into_smaller_capacity() {
        Ring::with_capacity(8).runs(4);
    }

    #[test]
    fn runs_of_contiguous_range() {
        let mut ring = Ring::with_capacity(8);
        for _ in 0..5 {
            ring.push_front();
        }
        ring.pop_back();

        let runs: Vec<Run> = ring.runs(16).collect();

        assert_eq!(runs, [Run { src: 1, dst: 1, len: 4 }]);
    }

    #[test]
    fn runs_split_at_old_wrap() {
        let mut ring = Ring::with_capacity(8);
        for _ in 0..3 {
            ring.push_back();
        }
        for _ in 0..5 {
            ring.push_front();
        }

        let runs: Vec<Run> = ring.runs(16).collect();

        assert_eq!(
            runs,
            [Run { src: 5, dst: 13, len: 3 }, Run { src: 0, dst: 0, len: 5 }]
        );
        assert_eq!(runs.iter().map(|run| run.len).sum::<usize>(), ring.len());
    }

    #[test]
    fn expansion_copies_amortised() {
        let mut ring = Ring::new();
        let mut copied = 0;
        let pushes = 10_000;

        for _ in 0..pushes {
            if ring.is_full() {
                let new_capacity = ring.next_capacity().unwrap();
                copied += ring.runs(new_capacity).map(|run| run.len).sum::<usize>();
                ring.grow_to(new_capacity);
            }
            ring.push_back();
        }

        assert!(copied <= 2 * pushes, "copied {copied}");
    }

    #[test]
    fn try_expand_keeps_contents() {
        let mut ring = Ring::new();
        let mut data: Box<[i32]> = ring.init(2);
        push_back_growing(&mut ring, &mut data, 1);
        push_front_growing(&mut ring, &mut data, 2);

        let data = ring.try_expand(&data).unwrap();

        assert_eq!(ring.capacity(), 4);
        assert_eq!(data[ring.back_slot(0)], 1);
        assert_eq!(data[ring.front_slot(0)], 2);
    }

    #[test]
    fn next_capacity_overflow() {
        let ring = Ring::with_capacity(usize::MAX / 2 + 1);

        assert_eq!(ring.next_capacity(), Err(TryReserveError::CapacityOverflow));
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut ring = Ring::with_capacity(8);
        ring.push_back();
        ring.push_front();

        ring.clear();

        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 8);
        assert_eq!((ring.front_counter(), ring.back_counter()), (0, 0));
    }
}

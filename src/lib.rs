#![warn(missing_docs)]
#![doc(test(attr(deny(warnings))))]

//! A double-ended queue over a power-of-two ring buffer whose elements are
//! addressed by stable logical counters.
//!
//! # Counters
//!
//! Every element of a deque is named by a *counter*. Pushing at the front
//! hands out increasing counters, pushing at the back hands out decreasing
//! ones, and the live elements always occupy the counters `back..front`. The
//! element with counter `c` is stored in slot `c & (capacity - 1)`, so push
//! and pop never test for a wrap-around.
//!
//! A counter keeps naming the same element when the deque grows: expansion
//! moves each element to the slot its counter maps to under the new capacity.
//! Callers can therefore remember where an element lives and look it up later
//! with [`CounterDeque::get`].
//!
//! # Layers
//!
//! * [`CounterDeque`] owns its elements, grows on demand and offers fallible
//!   `try_*` variants of the allocating methods.
//! * [`Ring`] is the bare index kernel: it only computes counters and slots,
//!   leaving storage to the caller. Its push and pop methods check their
//!   preconditions in debug builds only.
//!
//! Capacity starts at 0 or the next power of two of a requested size, doubles
//! on each expansion with a floor of [`MIN_EXPAND_CAPACITY`], and is never
//! reduced.

use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr;

use buffer::Buffer;

pub use error::TryReserveError;
pub use ring::{Ring, Run, Runs, MIN_EXPAND_CAPACITY};

mod buffer;
mod error;
mod ring;

#[cfg(test)]
mod drop_tracker;

/// A double-ended queue implemented with a growable power-of-two ring buffer.
///
/// Elements are ordered by counter, from the back end to the front end.
/// A `CounterDeque` with a known list of items can be initialized from an
/// array, the first item getting counter 0:
///
/// ```
/// use counter_deque::CounterDeque;
///
/// let deque = CounterDeque::from([-1, 0, 1]);
/// assert_eq!(deque.get(0), Some(&-1));
/// assert_eq!(deque.front(0), Some(&1));
/// ```
pub struct CounterDeque<T> {
    buf: Buffer<T>,
    ring: Ring,
    _marker: PhantomData<T>,
}

impl<T> CounterDeque<T> {
    /// Creates an empty deque. No memory is allocated until the first push.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let deque: CounterDeque<u32> = CounterDeque::new();
    /// assert_eq!(deque.capacity(), 0);
    /// ```
    pub const fn new() -> Self {
        CounterDeque {
            buf: Buffer::new(),
            ring: Ring::new(),
            _marker: PhantomData,
        }
    }

    /// Creates an empty deque with room for at least `requested` elements.
    ///
    /// The capacity is rounded up to the next power of two.
    ///
    /// # Panics
    ///
    /// Panics if the capacity overflows. Allocation failure aborts the
    /// process.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let deque: CounterDeque<u32> = CounterDeque::with_capacity(10);
    /// assert_eq!(deque.capacity(), 16);
    /// assert!(deque.is_empty());
    /// ```
    pub fn with_capacity(requested: usize) -> Self {
        let ring = Ring::with_capacity(requested);
        CounterDeque {
            buf: Buffer::with_capacity(ring.capacity()),
            ring,
            _marker: PhantomData,
        }
    }

    /// Like [`with_capacity`], but returns an error instead of panicking or
    /// aborting.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::{CounterDeque, TryReserveError};
    ///
    /// let result = CounterDeque::<u64>::try_with_capacity(usize::MAX);
    /// assert_eq!(result.unwrap_err(), TryReserveError::CapacityOverflow);
    /// ```
    ///
    /// [`with_capacity`]: CounterDeque::with_capacity
    pub fn try_with_capacity(requested: usize) -> Result<Self, TryReserveError> {
        let ring = Ring::try_with_capacity(requested)?;
        Ok(CounterDeque {
            buf: Buffer::try_with_capacity(ring.capacity())?,
            ring,
            _marker: PhantomData,
        })
    }

    /// Number of elements the deque can hold before it has to expand.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of elements in the deque.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` if the deque holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns `true` if the next push will expand the deque.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// The counter just past the front-most element. The front-most element
    /// itself, if any, has counter `front_counter().wrapping_sub(1)`.
    #[inline]
    pub fn front_counter(&self) -> usize {
        self.ring.front_counter()
    }

    /// The counter of the back-most element, if any.
    #[inline]
    pub fn back_counter(&self) -> usize {
        self.ring.back_counter()
    }

    /// The physical slot `counter` maps to under the current capacity.
    #[inline]
    pub fn slot(&self, counter: usize) -> usize {
        self.ring.slot(counter)
    }

    /// The index state of the deque.
    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Returns the element named by `counter`, or `None` if no live element
    /// has that counter.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut deque = CounterDeque::new();
    /// deque.push_back('b');
    /// let b = deque.back_counter();
    /// for c in 'c'..='z' {
    ///     deque.push_front(c);
    /// }
    ///
    /// assert_eq!(deque.get(b), Some(&'b'));
    /// assert_eq!(deque.get(b.wrapping_sub(1)), None);
    /// ```
    pub fn get(&self, counter: usize) -> Option<&T> {
        if self.ring.contains(counter) {
            unsafe { Some(&*self.buf.slot_ptr(self.ring.slot(counter))) }
        } else {
            None
        }
    }

    /// Returns a mutable reference to the element named by `counter`, or
    /// `None` if no live element has that counter.
    pub fn get_mut(&mut self, counter: usize) -> Option<&mut T> {
        if self.ring.contains(counter) {
            unsafe { Some(&mut *self.buf.slot_ptr(self.ring.slot(counter))) }
        } else {
            None
        }
    }

    /// Provides a reference to the element `offset` positions behind the
    /// front, or `None` if there are not that many elements. An `offset` of 0
    /// is the front-most element.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut d = CounterDeque::new();
    /// assert_eq!(d.front(0), None);
    ///
    /// d.push_front(1);
    /// d.push_front(2);
    /// assert_eq!(d.front(0), Some(&2));
    /// assert_eq!(d.front(1), Some(&1));
    /// assert_eq!(d.front(2), None);
    /// ```
    pub fn front(&self, offset: usize) -> Option<&T> {
        if offset < self.len() {
            unsafe { Some(&*self.buf.slot_ptr(self.ring.front_slot(offset))) }
        } else {
            None
        }
    }

    /// Mutable version of [`front`](CounterDeque::front).
    pub fn front_mut(&mut self, offset: usize) -> Option<&mut T> {
        if offset < self.len() {
            unsafe { Some(&mut *self.buf.slot_ptr(self.ring.front_slot(offset))) }
        } else {
            None
        }
    }

    /// Provides a reference to the element `offset` positions ahead of the
    /// back, or `None` if there are not that many elements. An `offset` of 0
    /// is the back-most element.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut d = CounterDeque::new();
    /// assert_eq!(d.back(0), None);
    ///
    /// d.push_back(1);
    /// d.push_back(2);
    /// assert_eq!(d.back(0), Some(&2));
    /// assert_eq!(d.back(1), Some(&1));
    /// ```
    pub fn back(&self, offset: usize) -> Option<&T> {
        if offset < self.len() {
            unsafe { Some(&*self.buf.slot_ptr(self.ring.back_slot(offset))) }
        } else {
            None
        }
    }

    /// Mutable version of [`back`](CounterDeque::back).
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut d = CounterDeque::from([1, 2]);
    /// if let Some(x) = d.back_mut(0) {
    ///     *x = 9;
    /// }
    /// assert_eq!(d, [9, 2]);
    /// ```
    pub fn back_mut(&mut self, offset: usize) -> Option<&mut T> {
        if offset < self.len() {
            unsafe { Some(&mut *self.buf.slot_ptr(self.ring.back_slot(offset))) }
        } else {
            None
        }
    }

    /// Adds an element at the front, expanding the deque first if it is full,
    /// and returns a reference to it. The element's counter is
    /// `front_counter().wrapping_sub(1)` right after the push.
    ///
    /// # Panics
    ///
    /// Panics if the capacity overflows. Allocation failure aborts the
    /// process.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut d = CounterDeque::new();
    /// d.push_front(1);
    /// *d.push_front(2) += 10;
    /// assert_eq!(d.front(0), Some(&12));
    /// assert_eq!(d.capacity(), 4);
    /// ```
    pub fn push_front(&mut self, elem: T) -> &mut T {
        if self.is_full() {
            self.expand();
        }
        let counter = self.ring.push_front();
        unsafe { self.write(counter, elem) }
    }

    /// Adds an element at the back, expanding the deque first if it is full,
    /// and returns a reference to it. The element's counter is
    /// `back_counter()` right after the push.
    ///
    /// # Panics
    ///
    /// Panics if the capacity overflows. Allocation failure aborts the
    /// process.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut buf = CounterDeque::new();
    /// buf.push_back(1);
    /// buf.push_back(3);
    /// assert_eq!(3, *buf.back(0).unwrap());
    /// ```
    pub fn push_back(&mut self, elem: T) -> &mut T {
        if self.is_full() {
            self.expand();
        }
        let counter = self.ring.push_back();
        unsafe { self.write(counter, elem) }
    }

    /// Like [`push_front`], but returns an error if the deque is full and
    /// cannot expand. `elem` is dropped in that case and the deque is left
    /// unchanged.
    ///
    /// [`push_front`]: CounterDeque::push_front
    pub fn try_push_front(&mut self, elem: T) -> Result<&mut T, TryReserveError> {
        if self.is_full() {
            self.try_expand()?;
        }
        let counter = self.ring.push_front();
        Ok(unsafe { self.write(counter, elem) })
    }

    /// Like [`push_back`], but returns an error if the deque is full and
    /// cannot expand. `elem` is dropped in that case and the deque is left
    /// unchanged.
    ///
    /// [`push_back`]: CounterDeque::push_back
    pub fn try_push_back(&mut self, elem: T) -> Result<&mut T, TryReserveError> {
        if self.is_full() {
            self.try_expand()?;
        }
        let counter = self.ring.push_back();
        Ok(unsafe { self.write(counter, elem) })
    }

    /// Removes the front-most element and returns it, or `None` if the deque
    /// is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut d = CounterDeque::new();
    /// d.push_back(1);
    /// d.push_back(2);
    ///
    /// assert_eq!(d.pop_front(), Some(1));
    /// assert_eq!(d.pop_front(), Some(2));
    /// assert_eq!(d.pop_front(), None);
    /// ```
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            let counter = self.ring.pop_front();
            unsafe { Some(self.read(counter)) }
        }
    }

    /// Removes the back-most element and returns it, or `None` if the deque
    /// is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut buf = CounterDeque::new();
    /// assert_eq!(buf.pop_back(), None);
    /// buf.push_back(1);
    /// buf.push_back(3);
    /// assert_eq!(buf.pop_back(), Some(3));
    /// ```
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            let counter = self.ring.pop_back();
            unsafe { Some(self.read(counter)) }
        }
    }

    /// Doubles the capacity, with a floor of [`MIN_EXPAND_CAPACITY`].
    ///
    /// Every element keeps its counter. Elements are moved, not cloned or
    /// dropped.
    ///
    /// # Panics
    ///
    /// Panics if the capacity overflows. Allocation failure aborts the
    /// process.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut deque = CounterDeque::from(['a', 'b', 'c', 'd']);
    /// assert_eq!(deque.capacity(), 4);
    ///
    /// deque.expand();
    /// assert_eq!(deque.capacity(), 8);
    /// assert_eq!(deque.get(2), Some(&'c'));
    /// ```
    pub fn expand(&mut self) {
        let new_capacity = match self.ring.next_capacity() {
            Ok(new_capacity) => new_capacity,
            Err(_) => panic!("capacity overflow"),
        };
        self.relocate(Buffer::with_capacity(new_capacity));
    }

    /// Like [`expand`], but returns an error instead of panicking or
    /// aborting. On error the deque is left unchanged.
    ///
    /// [`expand`]: CounterDeque::expand
    pub fn try_expand(&mut self) -> Result<(), TryReserveError> {
        let new_capacity = self.ring.next_capacity()?;
        self.relocate(Self::try_allocate(new_capacity)?);
        Ok(())
    }

    fn try_allocate(new_capacity: usize) -> Result<Buffer<T>, TryReserveError> {
        Buffer::try_with_capacity(new_capacity).map_err(|err| {
            log::debug!("could not expand deque to {new_capacity} slots: {err}");
            err
        })
    }

    /// Makes room for at least `additional` more elements, expanding at most
    /// once.
    ///
    /// The new capacity is the larger of the regular expansion capacity and
    /// the next power of two that fits `len() + additional`.
    ///
    /// # Panics
    ///
    /// Panics if the capacity overflows. Allocation failure aborts the
    /// process.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut deque = CounterDeque::from([1]);
    /// deque.reserve(10);
    /// assert_eq!(deque.capacity(), 16);
    ///
    /// deque.reserve(3);
    /// assert_eq!(deque.capacity(), 16);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        match self.reserve_capacity(additional) {
            Ok(Some(new_capacity)) => self.relocate(Buffer::with_capacity(new_capacity)),
            Ok(None) => {}
            Err(_) => panic!("capacity overflow"),
        }
    }

    /// Like [`reserve`], but returns an error instead of panicking or
    /// aborting. On error the deque is left unchanged.
    ///
    /// [`reserve`]: CounterDeque::reserve
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        if let Some(new_capacity) = self.reserve_capacity(additional)? {
            self.relocate(Self::try_allocate(new_capacity)?);
        }
        Ok(())
    }

    fn reserve_capacity(&self, additional: usize) -> Result<Option<usize>, TryReserveError> {
        let needed = self
            .len()
            .checked_add(additional)
            .ok_or(TryReserveError::CapacityOverflow)?;
        if needed <= self.capacity() {
            return Ok(None);
        }

        let fitting = needed
            .checked_next_power_of_two()
            .ok_or(TryReserveError::CapacityOverflow)?;
        Ok(Some(fitting.max(self.ring.next_capacity()?)))
    }

    /// Shortens the deque, keeping the `len` back-most elements and dropping
    /// the rest from the front.
    ///
    /// If `len` is greater than the deque's current length, this has no
    /// effect.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut buf = CounterDeque::from([5, 10, 15]);
    /// buf.truncate_front(1);
    /// assert_eq!(buf, [5]);
    /// ```
    pub fn truncate_front(&mut self, len: usize) {
        while self.len() > len {
            self.pop_front();
        }
    }

    /// Shortens the deque, keeping the `len` front-most elements and dropping
    /// the rest from the back.
    ///
    /// If `len` is greater than the deque's current length, this has no
    /// effect.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut buf = CounterDeque::from([5, 10, 15]);
    /// buf.truncate_back(1);
    /// assert_eq!(buf, [15]);
    /// ```
    pub fn truncate_back(&mut self, len: usize) {
        while self.len() > len {
            self.pop_back();
        }
    }

    /// Removes all elements and rewinds the counters to 0. The capacity is
    /// kept.
    ///
    /// # Example
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let mut deque = CounterDeque::new();
    /// deque.push_back(1);
    /// deque.clear();
    /// assert!(deque.is_empty());
    /// assert_eq!(deque.capacity(), 4);
    /// ```
    pub fn clear(&mut self) {
        self.truncate_back(0);
        self.ring.clear();
    }

    /// Moves the live elements into `new_buf` and adopts it, freeing the old
    /// buffer.
    fn relocate(&mut self, new_buf: Buffer<T>) {
        for Run { src, dst, len } in self.ring.runs(new_buf.cap) {
            unsafe {
                ptr::copy_nonoverlapping(self.buf.slot_ptr(src), new_buf.slot_ptr(dst), len);
            }
        }
        self.ring.grow_to(new_buf.cap);
        self.buf = new_buf;
    }

    /// # Safety
    ///
    /// `counter` must have just been claimed from the ring.
    unsafe fn write(&mut self, counter: usize, elem: T) -> &mut T {
        let slot = self.buf.slot_ptr(self.ring.slot(counter));
        ptr::write(slot, elem);
        &mut *slot
    }

    /// # Safety
    ///
    /// `counter` must have just been released by the ring.
    unsafe fn read(&mut self, counter: usize) -> T {
        ptr::read(self.buf.slot_ptr(self.ring.slot(counter)))
    }

    /// Live elements by offset from the back.
    fn elements(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len()).filter_map(move |offset| self.back(offset))
    }
}

impl<T> Default for CounterDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for CounterDeque<T> {
    fn drop(&mut self) {
        while self.pop_back().is_some() {}
    }
}

impl<T: Debug> Debug for CounterDeque<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.elements()).finish()
    }
}

impl<T: Clone> Clone for CounterDeque<T> {
    /// Clones the elements into a deque of the same capacity. Counters are
    /// preserved, so a counter valid in `self` names the same element in the
    /// clone.
    fn clone(&self) -> Self {
        let buf = Buffer::with_capacity(self.capacity());
        for offset in 0..self.len() {
            let slot = self.ring.back_slot(offset);
            unsafe {
                ptr::write(buf.slot_ptr(slot), (*self.buf.slot_ptr(slot)).clone());
            }
        }

        CounterDeque {
            buf,
            ring: self.ring,
            _marker: PhantomData,
        }
    }
}

macro_rules! impl_partial_eq {
    ([$($n:tt)*] $rhs:ty) => {
        impl<T, U, $($n)*> PartialEq<$rhs> for CounterDeque<T>
        where
            T: PartialEq<U>,
        {
            fn eq(&self, other: & $rhs) -> bool {
                self.len() == other.len() && self.elements().zip(other.iter()).all(|(a, b)| a == b)
            }
        }
    };
}

impl_partial_eq!([const N: usize] [U; N]);
impl_partial_eq!([const N: usize] &[U; N]);
impl_partial_eq!([] & [U]);
impl_partial_eq!([] Vec<U>);

impl<T, U> PartialEq<CounterDeque<U>> for CounterDeque<T>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &CounterDeque<U>) -> bool {
        self.len() == other.len() && self.elements().zip(other.elements()).all(|(a, b)| a == b)
    }
}

impl<T: Eq> Eq for CounterDeque<T> {}

impl<T: Hash> Hash for CounterDeque<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for elem in self.elements() {
            elem.hash(state);
        }
    }
}

impl<T, const N: usize> From<[T; N]> for CounterDeque<T> {
    /// Converts a `[T; N]` into a `CounterDeque<T>`. The item at index `i`
    /// gets counter `i`.
    ///
    /// ```
    /// use counter_deque::CounterDeque;
    ///
    /// let deq = CounterDeque::from([1, 2, 3, 4]);
    /// assert_eq!(deq, [1, 2, 3, 4]);
    /// assert_eq!(deq.get(3), Some(&4));
    /// ```
    fn from(value: [T; N]) -> Self {
        Self::from_iter(value)
    }
}

impl<T> From<Vec<T>> for CounterDeque<T> {
    /// Turn a [`Vec<T>`] into a [`CounterDeque<T>`]. The item at index `i`
    /// gets counter `i`.
    fn from(value: Vec<T>) -> Self {
        Self::from_iter(value)
    }
}

impl<T> FromIterator<T> for CounterDeque<T> {
    /// Pushes every item at the front, so the first item gets counter 0 and
    /// ends up back-most.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut deque = Self::with_capacity(iter.size_hint().0);
        deque.extend(iter);
        deque
    }
}

impl<T> Extend<T> for CounterDeque<T> {
    /// Pushes every item at the front.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for elem in iter {
            self.push_front(elem);
        }
    }
}

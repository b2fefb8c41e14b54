use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// Records the values of [`Tracked`] wrappers as they are dropped.
pub struct DropTracker<T> {
    dropped: Rc<RefCell<Vec<T>>>,
}

impl<T: Clone> DropTracker<T> {
    pub fn new() -> Self {
        DropTracker {
            dropped: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn wrap(&self, value: T) -> Tracked<T> {
        Tracked {
            value,
            dropped: Rc::clone(&self.dropped),
        }
    }

    pub fn wrap_iter<'a, I: IntoIterator<Item = T>>(
        &'a self,
        values: I,
    ) -> impl Iterator<Item = Tracked<T>> + 'a
    where
        I::IntoIter: 'a,
    {
        values.into_iter().map(move |value| self.wrap(value))
    }

    /// Values dropped so far, in drop order. Clears the record.
    pub fn take(&self) -> Vec<T> {
        self.dropped.borrow_mut().drain(..).collect()
    }

    /// Runs `f` and returns the values dropped while it ran.
    pub fn track<F: FnOnce() -> R, R>(&self, f: F) -> (Vec<T>, R) {
        self.take();
        let result = f();
        (self.take(), result)
    }
}

pub struct Tracked<T: Clone> {
    value: T,
    dropped: Rc<RefCell<Vec<T>>>,
}

impl<T: Clone> Tracked<T> {
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Tracked {
            value: self.value.clone(),
            dropped: Rc::clone(&self.dropped),
        }
    }
}

impl<T: Clone + PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Clone + Debug> Debug for Tracked<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: Clone> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.dropped.borrow_mut().push(self.value.clone());
    }
}

use std::alloc::Layout;
use std::fmt::{self, Display, Formatter};

/// The error returned by the fallible allocation methods of [`CounterDeque`]
/// and [`Ring`].
///
/// [`CounterDeque`]: crate::CounterDeque
/// [`Ring`]: crate::Ring
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TryReserveError {
    /// The requested capacity is not representable: either no power of two
    /// large enough fits in `usize`, or the storage would exceed `isize::MAX`
    /// bytes.
    CapacityOverflow,

    /// The allocator refused to provide a block with this layout.
    AllocError {
        /// The layout of the block that could not be allocated.
        layout: Layout,
    },
}

impl Display for TryReserveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")?;
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str(" because the computed capacity exceeded the deque's maximum")
            }
            TryReserveError::AllocError { layout } => write!(
                f,
                " because the allocator could not provide {} bytes",
                layout.size()
            ),
        }
    }
}

impl std::error::Error for TryReserveError {}

//! Bump arena backing the buffers of composite graph nodes.
//!
//! Composite nodes (matrix solves, determinants, dot products) need to keep
//! primal matrices and operand-slot arrays alive until the reverse sweep. They
//! do not own that memory: they hold [`Span`]s into the arena of the tape they
//! were recorded on. Spans are `Copy` and run no destructor. Memory is only
//! ever released as a whole, by [`Arena::reset`].

use std::fmt;
use std::marker::PhantomData;

/// Index of a node slot (value + adjoint) on a tape.
pub type Slot = u32;

/// A contiguous run of `T`s inside an [`Arena`] pool.
///
/// Carries no lifetime: it is a plain offset pair that is only meaningful for
/// the arena (and epoch) that produced it.
pub struct Span<T> {
    start: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Span<T> {
    /// Span of length zero.
    pub const EMPTY: Span<T> = Span {
        start: 0,
        len: 0,
        _marker: PhantomData,
    };

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

impl<T> Clone for Span<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Span<T> {}

impl<T> fmt::Debug for Span<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({}..{})", self.start, self.start + self.len)
    }
}

/// Monotonic allocator with one pool per element type.
///
/// Allocation failure aborts the process (the pools are `Vec`s); there is no
/// recoverable out-of-memory path.
#[derive(Debug, Default)]
pub struct Arena {
    values: Vec<f64>,
    slots: Vec<Slot>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the value pool (in `f64`s) and the slot pool (in indices).
    pub fn with_capacity(values: usize, slots: usize) -> Self {
        Arena {
            values: Vec::with_capacity(values),
            slots: Vec::with_capacity(slots),
        }
    }

    /// Copy `data` into the value pool.
    pub fn alloc_values(&mut self, data: &[f64]) -> Span<f64> {
        let start = self.values.len();
        self.values.extend_from_slice(data);
        Self::span(start, data.len())
    }

    /// Append every item of `data` to the value pool.
    pub fn alloc_values_iter(&mut self, data: impl IntoIterator<Item = f64>) -> Span<f64> {
        let start = self.values.len();
        self.values.extend(data);
        Self::span(start, self.values.len() - start)
    }

    /// Append every item of `data` to the slot pool.
    pub fn alloc_slots(&mut self, data: impl IntoIterator<Item = Slot>) -> Span<Slot> {
        let start = self.slots.len();
        self.slots.extend(data);
        Self::span(start, self.slots.len() - start)
    }

    #[inline]
    pub fn values(&self, span: Span<f64>) -> &[f64] {
        &self.values[span.range()]
    }

    #[inline]
    pub fn slots(&self, span: Span<Slot>) -> &[Slot] {
        &self.slots[span.range()]
    }

    /// Bytes currently handed out across all pools.
    pub fn bytes_used(&self) -> usize {
        self.values.len() * std::mem::size_of::<f64>()
            + self.slots.len() * std::mem::size_of::<Slot>()
    }

    /// Invalidate every span handed out so far. Capacity is kept for reuse.
    pub fn reset(&mut self) {
        self.values.clear();
        self.slots.clear();
    }

    fn span<T>(start: usize, len: usize) -> Span<T> {
        let start = u32::try_from(start).unwrap_or_else(|_| arena_overflow());
        let len = u32::try_from(len).unwrap_or_else(|_| arena_overflow());
        Span {
            start,
            len,
            _marker: PhantomData,
        }
    }
}

#[cold]
fn arena_overflow() -> ! {
    panic!("arena exhausted: more than u32::MAX elements in one epoch")
}

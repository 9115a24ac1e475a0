//! Bump-pointer arenas
//!
//! An [`Arena`] hands out memory by advancing an offset. Nothing is freed
//! individually: [`Arena::reset`] reclaims every allocation at once and
//! [`Arena::destroy`] (or dropping the arena) returns the backing reservation.
//!
//! A growable arena never relocates: when the current block is full it
//! reserves an additional block, so earlier pointers stay valid until reset.

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::{self, NonNull};

use bytemuck::Zeroable;
use thiserror::Error;

use crate::contract;

/// Alignment of every backing block.
pub const BLOCK_ALIGN: usize = 16;

/// Written over reclaimed memory when `poison_on_reset` is set.
pub const POISON_PATTERN: u8 = 0xCD;

/// Written into the padding that follows each allocation when `guard_padding` is set.
pub const GUARD_PATTERN: u8 = 0xFD;

/// Bytes of guard padding per allocation.
pub const GUARD_SIZE: usize = 16;

/// Smallest block a growable arena reserves when it runs out of room.
const MIN_GROWTH: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("arena out of memory: requested {requested} bytes, {remaining} remaining")]
    OutOfMemory { requested: usize, remaining: usize },

    #[error("invalid allocation layout: size {size}, align {align}")]
    InvalidLayout { size: usize, align: usize },

    #[error("could not reserve {capacity} bytes of backing memory")]
    ReservationFailed { capacity: usize },
}

/// Behavioral switches fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFlags {
    /// Follow each allocation with [`GUARD_SIZE`] bytes of [`GUARD_PATTERN`].
    pub guard_padding: bool,
    /// Overwrite reclaimed memory with [`POISON_PATTERN`] on reset.
    pub poison_on_reset: bool,
    /// Reserve an additional block instead of failing when full.
    pub growable: bool,
}

impl ArenaFlags {
    pub fn growable() -> Self {
        Self {
            growable: true,
            ..Self::default()
        }
    }
}

impl Default for ArenaFlags {
    fn default() -> Self {
        Self {
            guard_padding: false,
            poison_on_reset: cfg!(debug_assertions),
            growable: false,
        }
    }
}

/// One contiguous reservation.
struct Block {
    base: NonNull<u8>,
    capacity: usize,
    offset: usize,
}

impl Block {
    fn reserve(capacity: usize) -> Result<Self, ArenaError> {
        if capacity == 0 {
            return Ok(Self {
                base: NonNull::dangling(),
                capacity: 0,
                offset: 0,
            });
        }

        let layout = Layout::from_size_align(capacity, BLOCK_ALIGN)
            .map_err(|_| ArenaError::ReservationFailed { capacity })?;
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        let base = NonNull::new(ptr).ok_or(ArenaError::ReservationFailed { capacity })?;

        Ok(Self {
            base,
            capacity,
            offset: 0,
        })
    }

    /// Offsets `(start, end)` of a `size`-byte allocation placed at the
    /// current offset, or `None` if it does not fit.
    fn fit(&self, size: usize, align: usize) -> Option<(usize, usize)> {
        let base = self.base.as_ptr() as usize;
        let cursor = base.checked_add(self.offset)?;
        let aligned = cursor.checked_add(align - 1)? & !(align - 1);
        let start = aligned - base;
        let end = start.checked_add(size)?;
        (end <= self.capacity).then_some((start, end))
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    fn poison(&mut self) {
        if self.offset > 0 {
            // SAFETY: bytes 0..offset lie inside this reservation.
            unsafe { ptr::write_bytes(self.base.as_ptr(), POISON_PATTERN, self.offset) };
        }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if self.capacity > 0 {
            // SAFETY: reserved in `Block::reserve` with exactly this layout.
            unsafe {
                alloc::dealloc(
                    self.base.as_ptr(),
                    Layout::from_size_align_unchecked(self.capacity, BLOCK_ALIGN),
                );
            }
        }
    }
}

/// A bump allocator with bulk reclamation.
///
/// Allocations are valid until the next [`reset`](Arena::reset) or until the
/// arena is destroyed. Values placed in the arena are never dropped.
pub struct Arena {
    /// Never empty; only growable arenas hold more than one block.
    blocks: Vec<Block>,
    flags: ArenaFlags,
    /// `(block, offset)` of every guard region. Only populated with `guard_padding`.
    guards: Vec<(usize, usize)>,
}

impl Arena {
    /// Reserve `capacity` bytes up front.
    pub fn create(capacity: usize, flags: ArenaFlags) -> Result<Self, ArenaError> {
        let block = Block::reserve(capacity)?;
        tracing::debug!(capacity, ?flags, "arena created");
        Ok(Self {
            blocks: vec![block],
            flags,
            guards: Vec::new(),
        })
    }

    /// Bump-allocate `size` bytes aligned to `align`.
    ///
    /// `size` is rounded up to a multiple of `align`. Zero-size requests
    /// succeed with a well-aligned pointer that must not be dereferenced.
    /// A failed request leaves the arena untouched.
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ArenaError> {
        if !align.is_power_of_two() {
            return Err(ArenaError::InvalidLayout { size, align });
        }
        let rounded = size
            .checked_add(align - 1)
            .map(|s| s & !(align - 1))
            .ok_or(ArenaError::InvalidLayout { size, align })?;
        if rounded == 0 {
            return Ok(dangling(align));
        }

        let guard = if self.flags.guard_padding { GUARD_SIZE } else { 0 };
        let footprint = rounded
            .checked_add(guard)
            .ok_or(ArenaError::InvalidLayout { size, align })?;

        let current = self.blocks.len() - 1;
        let (index, (start, end)) = match self.blocks[current].fit(footprint, align) {
            Some(span) => (current, span),
            None if self.flags.growable => {
                let index = self.grow(footprint, align)?;
                let span = self.blocks[index]
                    .fit(footprint, align)
                    .ok_or(ArenaError::OutOfMemory {
                        requested: rounded,
                        remaining: self.blocks[index].remaining(),
                    })?;
                (index, span)
            }
            None => {
                return Err(ArenaError::OutOfMemory {
                    requested: rounded,
                    remaining: self.blocks[current].remaining(),
                })
            }
        };

        let block = &mut self.blocks[index];
        block.offset = end;
        // SAFETY: start..end lies inside the block's reservation.
        let ptr = unsafe { block.base.as_ptr().add(start) };
        if guard > 0 {
            // SAFETY: the guard region is the tail of start..end.
            unsafe { ptr::write_bytes(ptr.add(rounded), GUARD_PATTERN, guard) };
            self.guards.push((index, start + rounded));
        }

        // SAFETY: derived from a non-null block base.
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    /// Allocate according to `layout`.
    #[inline]
    pub fn allocate_layout(&mut self, layout: Layout) -> Result<NonNull<u8>, ArenaError> {
        self.allocate(layout.size(), layout.align())
    }

    /// Move `value` into the arena. It will never be dropped.
    pub fn alloc_value<T>(&mut self, value: T) -> Result<NonNull<T>, ArenaError> {
        let ptr = self
            .allocate(mem::size_of::<T>(), mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: fresh, aligned and large enough for one T.
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Allocate `len` zeroed elements.
    pub fn alloc_slice_zeroed<T: Zeroable>(
        &mut self,
        len: usize,
    ) -> Result<NonNull<[T]>, ArenaError> {
        let layout = Layout::array::<T>(len).map_err(|_| ArenaError::InvalidLayout {
            size: len.saturating_mul(mem::size_of::<T>()),
            align: mem::align_of::<T>(),
        })?;
        let ptr = self.allocate_layout(layout)?.cast::<T>();
        // SAFETY: fresh allocation of `len` elements; all-zero is a valid T.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, len) };
        Ok(NonNull::slice_from_raw_parts(ptr, len))
    }

    /// Copy `src` into the arena.
    pub fn alloc_slice_copy<T: Copy>(&mut self, src: &[T]) -> Result<NonNull<[T]>, ArenaError> {
        let layout = Layout::for_value(src);
        let ptr = self.allocate_layout(layout)?.cast::<T>();
        // SAFETY: fresh allocation sized for `src`; regions cannot overlap.
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len()) };
        Ok(NonNull::slice_from_raw_parts(ptr, src.len()))
    }

    /// Reclaim every allocation. All previously returned pointers become invalid.
    pub fn reset(&mut self) {
        let corrupted = self.check_guards();
        if corrupted > 0 {
            contract::violation(format_args!(
                "{corrupted} arena guard region(s) overwritten before reset"
            ));
        }
        self.guards.clear();

        self.blocks.truncate(1);
        let block = &mut self.blocks[0];
        if self.flags.poison_on_reset {
            block.poison();
        }
        block.offset = 0;
    }

    /// Release the backing reservation.
    pub fn destroy(self) {
        tracing::debug!(capacity = self.capacity(), "arena destroyed");
    }

    /// Number of guard regions whose pattern has been overwritten.
    pub fn check_guards(&self) -> usize {
        self.guards
            .iter()
            .filter(|&&(block, offset)| {
                let base = self.blocks[block].base.as_ptr();
                // SAFETY: guard regions were written inside the block and are
                // only forgotten on reset.
                let guard = unsafe { std::slice::from_raw_parts(base.add(offset), GUARD_SIZE) };
                guard.iter().any(|&b| b != GUARD_PATTERN)
            })
            .count()
    }

    /// Whether `ptr` points into memory reserved by this arena.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        self.blocks.iter().any(|block| {
            let base = block.base.as_ptr() as usize;
            block.capacity > 0 && addr >= base && addr < base + block.capacity
        })
    }

    /// Offset into the block currently being bumped.
    #[inline]
    pub fn offset(&self) -> usize {
        self.blocks[self.blocks.len() - 1].offset
    }

    /// Bytes consumed across all blocks, including alignment and guard padding.
    pub fn used(&self) -> usize {
        self.blocks.iter().map(|b| b.offset).sum()
    }

    /// Bytes reserved across all blocks.
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(|b| b.capacity).sum()
    }

    /// Bytes left in the block currently being bumped.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.blocks[self.blocks.len() - 1].remaining()
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn flags(&self) -> ArenaFlags {
        self.flags
    }

    fn grow(&mut self, footprint: usize, align: usize) -> Result<usize, ArenaError> {
        let needed = footprint
            .checked_add(align)
            .ok_or(ArenaError::ReservationFailed { capacity: footprint })?;
        let capacity = self.blocks[0].capacity.max(needed).max(MIN_GROWTH);
        let block = Block::reserve(capacity)?;
        self.blocks.push(block);
        tracing::debug!(capacity, blocks = self.blocks.len(), "arena grew");
        Ok(self.blocks.len() - 1)
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("used", &self.used())
            .field("capacity", &self.capacity())
            .field("blocks", &self.blocks.len())
            .field("flags", &self.flags)
            .finish()
    }
}

fn dangling(align: usize) -> NonNull<u8> {
    NonNull::new(ptr::null_mut::<u8>().wrapping_add(align)).unwrap_or(NonNull::dangling())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plain() -> ArenaFlags {
        ArenaFlags {
            guard_padding: false,
            poison_on_reset: false,
            growable: false,
        }
    }

    #[test]
    fn test_failed_allocation_has_no_side_effect() {
        let capacity = 1024;
        let mut arena = Arena::create(capacity, plain()).unwrap();

        arena.allocate(capacity / 2, 1).unwrap();
        let err = arena.allocate(capacity / 2 + 1, 1).unwrap_err();

        assert_eq!(
            err,
            ArenaError::OutOfMemory {
                requested: capacity / 2 + 1,
                remaining: capacity / 2,
            }
        );
        assert_eq!(arena.offset(), capacity / 2);
    }

    #[test]
    fn test_size_rounds_up_to_alignment() {
        let mut arena = Arena::create(256, plain()).unwrap();

        let a = arena.allocate(3, 8).unwrap();
        assert_eq!(a.as_ptr() as usize % 8, 0);
        assert_eq!(arena.offset(), 8);

        let b = arena.allocate(1, 8).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 8);
        assert_eq!(arena.offset(), 16);
    }

    #[test]
    fn test_zero_size_allocation() {
        let mut arena = Arena::create(64, plain()).unwrap();
        arena.allocate(4, 4).unwrap();

        let ptr = arena.allocate(0, 32).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 32, 0);
        assert_eq!(arena.offset(), 4);

        let mut empty = Arena::create(0, plain()).unwrap();
        assert!(empty.allocate(0, 1).is_ok());
        assert!(empty.allocate(1, 1).is_err());
    }

    #[test]
    fn test_rejects_non_power_of_two_alignment() {
        let mut arena = Arena::create(64, plain()).unwrap();
        assert_eq!(
            arena.allocate(8, 3),
            Err(ArenaError::InvalidLayout { size: 8, align: 3 })
        );
        assert_eq!(arena.offset(), 0);
    }

    #[test]
    fn test_reset_reuses_memory() {
        let mut arena = Arena::create(1024, plain()).unwrap();

        let first = arena.alloc_value(7u64).unwrap();
        arena.reset();
        assert_eq!(arena.offset(), 0);

        let second = arena.alloc_value(9u64).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_poisons_reclaimed_memory() {
        let flags = ArenaFlags {
            poison_on_reset: true,
            ..plain()
        };
        let mut arena = Arena::create(64, flags).unwrap();

        let bytes = arena.alloc_slice_copy(&[0x11u8; 8]).unwrap();
        arena.reset();

        // The reservation is still owned by the arena, so reading it is sound.
        let after = unsafe { bytes.as_ref() };
        assert!(after.iter().all(|&b| b == POISON_PATTERN));
    }

    #[test]
    fn test_growable_arena_keeps_earlier_allocations() {
        let flags = ArenaFlags {
            growable: true,
            ..plain()
        };
        let mut arena = Arena::create(64, flags).unwrap();

        let first = arena.alloc_slice_copy(&[1u8; 48]).unwrap();
        let second = arena.alloc_slice_copy(&[2u8; 48]).unwrap();

        assert_eq!(arena.block_count(), 2);
        assert!(unsafe { first.as_ref() }.iter().all(|&b| b == 1));
        assert!(unsafe { second.as_ref() }.iter().all(|&b| b == 2));
        assert!(arena.contains(first.cast::<u8>().as_ptr()));

        arena.reset();
        assert_eq!(arena.block_count(), 1);
        assert_eq!(arena.capacity(), 64);
    }

    #[test]
    fn test_guard_padding_detects_overrun() {
        let flags = ArenaFlags {
            guard_padding: true,
            ..plain()
        };
        let mut arena = Arena::create(256, flags).unwrap();

        let ptr = arena.allocate(8, 8).unwrap();
        assert_eq!(arena.check_guards(), 0);

        // One byte past the end lands in the guard region.
        unsafe { ptr.as_ptr().add(8).write(0) };
        assert_eq!(arena.check_guards(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "guard region")]
    fn test_reset_with_corrupted_guard_is_violation() {
        let flags = ArenaFlags {
            guard_padding: true,
            ..plain()
        };
        let mut arena = Arena::create(256, flags).unwrap();
        let ptr = arena.allocate(4, 4).unwrap();
        unsafe { ptr.as_ptr().add(4).write(0) };
        arena.reset();
    }

    #[test]
    fn test_alloc_slice_zeroed() {
        let mut arena = Arena::create(256, plain()).unwrap();
        let slice = arena.alloc_slice_zeroed::<u32>(16).unwrap();
        let slice = unsafe { slice.as_ref() };
        assert_eq!(slice.len(), 16);
        assert!(slice.iter().all(|&v| v == 0));
        assert_eq!(slice.as_ptr() as usize % mem::align_of::<u32>(), 0);
    }

    proptest! {
        #[test]
        fn prop_allocations_never_overlap(
            requests in proptest::collection::vec((0usize..200, 0u32..6), 1..64)
        ) {
            let capacity = 4096;
            let mut arena = Arena::create(capacity, plain()).unwrap();
            let mut spans: Vec<(usize, usize)> = Vec::new();

            for (size, align_pow) in requests {
                let align = 1usize << align_pow;
                let before = arena.offset();
                match arena.allocate(size, align) {
                    Ok(ptr) => {
                        let start = ptr.as_ptr() as usize;
                        prop_assert_eq!(start % align, 0);
                        if size > 0 {
                            prop_assert!(arena.contains(ptr.as_ptr()));
                            let end = start + size;
                            for &(s, e) in &spans {
                                prop_assert!(end <= s || start >= e);
                            }
                            spans.push((start, end));
                        }
                    }
                    Err(_) => prop_assert_eq!(arena.offset(), before),
                }
                prop_assert!(arena.offset() <= capacity);
            }
        }
    }
}

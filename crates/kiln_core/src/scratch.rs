//! Scratch arena stack
//!
//! A fixed pool of pre-reserved arenas for transient, nested allocation.
//! [`ScratchStack::begin`] claims a free slot and returns a [`Scratch`] guard;
//! dropping the guard (or calling [`Scratch::end`]) resets the slot and frees it.
//!
//! Allocations borrow the guard, so the borrow checker already rejects use of a
//! scratch allocation after its release. What it cannot see are the ordering
//! rules between guards: a guard opened with
//! [`begin_with_dependency`](ScratchStack::begin_with_dependency) must be
//! released before any of its parents. Those are checked at release time and
//! reported through [`contract::violation`].
//!
//! The pool is single-threaded (`!Sync`); create one per thread of control.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Write as _};

use bytemuck::Zeroable;
use smallvec::SmallVec;
use thiserror::Error;

use crate::arena::{Arena, ArenaError, ArenaFlags};
use crate::contract;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScratchError {
    #[error("scratch pool exhausted: all {slots} slots are open")]
    Exhausted { slots: usize },
}

/// Unique per-stack identifier of one `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScratchId(u64);

impl fmt::Display for ScratchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct OpenHandle {
    id: ScratchId,
    parents: SmallVec<[ScratchId; 4]>,
}

struct Slot {
    arena: RefCell<Arena>,
    open: RefCell<Option<OpenHandle>>,
}

/// Pool of `K` scratch arenas.
pub struct ScratchStack {
    slots: Box<[Slot]>,
    slot_capacity: usize,
    next_id: Cell<u64>,
}

impl ScratchStack {
    /// Reserve `slot_count` arenas of `slot_capacity` bytes each.
    ///
    /// Scratch arenas never grow; a full slot fails the allocation instead.
    pub fn new(slot_count: usize, slot_capacity: usize) -> Result<Self, ArenaError> {
        let flags = ArenaFlags {
            growable: false,
            ..ArenaFlags::default()
        };
        let slots = (0..slot_count)
            .map(|_| {
                Ok(Slot {
                    arena: RefCell::new(Arena::create(slot_capacity, flags)?),
                    open: RefCell::new(None),
                })
            })
            .collect::<Result<Vec<_>, ArenaError>>()?
            .into_boxed_slice();

        tracing::debug!(slot_count, slot_capacity, "scratch pool reserved");
        Ok(Self {
            slots,
            slot_capacity,
            next_id: Cell::new(1),
        })
    }

    /// Claim a free slot. Pool exhaustion is fatal: it means a guard leaked
    /// or nesting went deeper than the pool was sized for.
    #[track_caller]
    pub fn begin(&self) -> Scratch<'_> {
        self.begin_with_dependency(&[])
    }

    /// Like [`begin`](Self::begin), recording that the new guard must be
    /// released before every guard in `parents`.
    #[track_caller]
    pub fn begin_with_dependency(&self, parents: &[&Scratch<'_>]) -> Scratch<'_> {
        match self.try_begin_with_dependency(parents) {
            Ok(scratch) => scratch,
            Err(err) => {
                tracing::error!(%err, "scratch nesting too deep or a handle leaked");
                panic!("{err}");
            }
        }
    }

    pub fn try_begin(&self) -> Result<Scratch<'_>, ScratchError> {
        self.try_begin_with_dependency(&[])
    }

    pub fn try_begin_with_dependency(
        &self,
        parents: &[&Scratch<'_>],
    ) -> Result<Scratch<'_>, ScratchError> {
        for parent in parents {
            if !std::ptr::eq(parent.stack, self) {
                contract::violation(format_args!(
                    "scratch {} used as a dependency of a different pool",
                    parent.id
                ));
            }
        }

        let slot = self
            .slots
            .iter()
            .position(|slot| slot.open.borrow().is_none())
            .ok_or(ScratchError::Exhausted {
                slots: self.slots.len(),
            })?;

        let id = ScratchId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        *self.slots[slot].open.borrow_mut() = Some(OpenHandle {
            id,
            parents: parents.iter().map(|p| p.id).collect(),
        });

        Ok(Scratch {
            stack: self,
            slot,
            id,
        })
    }

    /// Number of currently open guards.
    pub fn open_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.open.borrow().is_some())
            .count()
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    fn release(&self, slot: usize, id: ScratchId) {
        let Some(entry) = self.slots.get(slot) else {
            contract::violation(format_args!("scratch {id} refers to missing slot {slot}"));
            return;
        };

        let holder = entry.open.borrow().as_ref().map(|handle| handle.id);
        match holder {
            Some(current) if current == id => *entry.open.borrow_mut() = None,
            Some(current) => {
                contract::violation(format_args!(
                    "scratch {id} released out of order: slot {slot} is held by {current}"
                ));
                return;
            }
            None => {
                contract::violation(format_args!("scratch {id} released twice"));
                return;
            }
        }

        entry.arena.borrow_mut().reset();

        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            contract::violation(format_args!(
                "scratch {id} released while dependent handle(s) {dependents:?} are still open"
            ));
        }
    }

    fn dependents_of(&self, id: ScratchId) -> SmallVec<[ScratchId; 4]> {
        self.slots
            .iter()
            .filter_map(|slot| {
                slot.open
                    .borrow()
                    .as_ref()
                    .filter(|handle| handle.parents.contains(&id))
                    .map(|handle| handle.id)
            })
            .collect()
    }
}

impl fmt::Debug for ScratchStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchStack")
            .field("slots", &self.slots.len())
            .field("slot_capacity", &self.slot_capacity)
            .field("open", &self.open_count())
            .finish()
    }
}

/// An open scratch region. Everything allocated through it is reclaimed when
/// the guard is dropped.
pub struct Scratch<'s> {
    stack: &'s ScratchStack,
    slot: usize,
    id: ScratchId,
}

#[allow(clippy::mut_from_ref)]
impl Scratch<'_> {
    /// Release the slot. Equivalent to dropping the guard.
    pub fn end(self) {}

    #[inline]
    pub fn id(&self) -> ScratchId {
        self.id
    }

    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Bytes consumed in this guard's slot.
    pub fn used(&self) -> usize {
        self.stack.slots[self.slot].arena.borrow().used()
    }

    pub fn alloc<T>(&self, value: T) -> Result<&mut T, ArenaError> {
        let ptr = self.arena().borrow_mut().alloc_value(value)?;
        // SAFETY: fresh allocation that lives until this guard is released,
        // which cannot happen while `self` is borrowed.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    pub fn alloc_slice_zeroed<T: Zeroable>(&self, len: usize) -> Result<&mut [T], ArenaError> {
        let ptr = self.arena().borrow_mut().alloc_slice_zeroed::<T>(len)?;
        // SAFETY: as in `alloc`.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> Result<&mut [T], ArenaError> {
        let ptr = self.arena().borrow_mut().alloc_slice_copy(src)?;
        // SAFETY: as in `alloc`.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    pub fn alloc_str(&self, s: &str) -> Result<&mut str, ArenaError> {
        let bytes = self.alloc_slice_copy(s.as_bytes())?;
        // SAFETY: copied from a valid str.
        Ok(unsafe { std::str::from_utf8_unchecked_mut(bytes) })
    }

    /// Format into scratch memory without touching the global heap.
    pub fn format(&self, args: fmt::Arguments<'_>) -> Result<&str, ArenaError> {
        if let Some(s) = args.as_str() {
            return self.alloc_str(s).map(|s| &*s);
        }

        let mut counter = ByteCounter(0);
        // Counting never fails; a failing Display impl just yields a shorter count.
        let _ = counter.write_fmt(args);

        let buf = self.alloc_slice_zeroed::<u8>(counter.0)?;
        let mut writer = SliceWriter { buf, len: 0 };
        // Truncates if a Display impl writes more on the second pass.
        let _ = writer.write_fmt(args);

        let SliceWriter { buf, len } = writer;
        let written: &[u8] = &buf[..len];
        // SAFETY: only whole `str` pieces are copied in.
        Ok(unsafe { std::str::from_utf8_unchecked(written) })
    }

    fn arena(&self) -> &RefCell<Arena> {
        &self.stack.slots[self.slot].arena
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        self.stack.release(self.slot, self.id);
    }
}

impl fmt::Debug for Scratch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scratch")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .finish()
    }
}

struct ByteCounter(usize);

impl fmt::Write for ByteCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool() -> ScratchStack {
        ScratchStack::new(4, 4096).unwrap()
    }

    #[test]
    fn test_nested_guards_use_distinct_slots() {
        let stack = pool();
        let a = stack.begin();
        let b = stack.begin();
        assert_ne!(a.slot(), b.slot());
        assert_eq!(stack.open_count(), 2);

        b.end();
        a.end();
        assert_eq!(stack.open_count(), 0);
    }

    #[test]
    fn test_end_resets_slot() {
        let stack = pool();
        let slot = {
            let scratch = stack.begin();
            scratch.alloc_slice_copy(&[1u32; 32]).unwrap();
            assert!(scratch.used() >= 128);
            scratch.slot()
        };

        let again = stack.begin();
        assert_eq!(again.slot(), slot);
        assert_eq!(again.used(), 0);
    }

    #[test]
    fn test_try_begin_reports_exhaustion() {
        let stack = ScratchStack::new(2, 64).unwrap();
        let _a = stack.begin();
        let _b = stack.begin();
        assert_eq!(
            stack.try_begin().unwrap_err(),
            ScratchError::Exhausted { slots: 2 }
        );
    }

    #[test]
    #[should_panic(expected = "scratch pool exhausted")]
    fn test_begin_on_exhausted_pool_is_fatal() {
        let stack = ScratchStack::new(1, 64).unwrap();
        let _a = stack.begin();
        let _b = stack.begin();
    }

    #[test]
    fn test_dependent_released_before_parent() {
        let stack = pool();
        let a = stack.begin();
        let b = stack.begin_with_dependency(&[&a]);
        b.end();
        a.end();
        assert_eq!(stack.open_count(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "dependent handle")]
    fn test_releasing_parent_before_dependent_is_violation() {
        let stack = pool();
        let a = stack.begin();
        let _b = stack.begin_with_dependency(&[&a]);
        a.end();
    }

    #[test]
    fn test_scratch_allocation_exceeding_slot_fails() {
        let stack = ScratchStack::new(1, 64).unwrap();
        let scratch = stack.begin();
        assert!(matches!(
            scratch.alloc_slice_zeroed::<u8>(65),
            Err(ArenaError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_format_writes_into_scratch() {
        let stack = pool();
        let scratch = stack.begin();
        let text = scratch.format(format_args!("frame {} of {}", 3, "kiln")).unwrap();
        assert_eq!(text, "frame 3 of kiln");
        assert!(scratch.used() >= text.len());

        let literal = scratch.format(format_args!("plain")).unwrap();
        assert_eq!(literal, "plain");
    }

    /// Open one guard per level, fill an allocation, recurse, then verify the
    /// allocation survived every deeper open/close.
    fn nest(stack: &ScratchStack, plan: &[(u8, usize)]) -> Result<(), TestCaseError> {
        let Some((&(fill, siblings), rest)) = plan.split_first() else {
            return Ok(());
        };

        let scratch = stack.begin();
        let mine = scratch.alloc_slice_copy(&[fill; 48]).unwrap();
        for _ in 0..siblings {
            nest(stack, rest)?;
            prop_assert!(mine.iter().all(|&b| b == fill));
            let extra = scratch.alloc(fill as u64).unwrap();
            prop_assert_eq!(*extra, fill as u64);
        }
        prop_assert!(mine.iter().all(|&b| b == fill));
        scratch.end();
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_lifo_nesting_never_corrupts_open_allocations(
            plan in proptest::collection::vec((any::<u8>(), 1usize..3), 1..=4)
        ) {
            let stack = pool();
            nest(&stack, &plan)?;
            prop_assert_eq!(stack.open_count(), 0);
        }
    }
}

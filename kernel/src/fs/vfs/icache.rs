//! Inode Cache
//!
//! A fixed pool of in-core inode slots. Cached slots live in exactly one hash
//! bucket keyed by `(device, number)`; free slots sit on a LIFO stack.
//!
//! Two kinds of state are kept apart:
//!
//! - Slot bookkeeping (reference count, flags, identity, bucket membership)
//!   lives in one table behind a `spin::Mutex`. Every structural change
//!   happens under that mutex.
//! - The payload (`InodeData`) is guarded by the per-slot LOCKED flag. A
//!   caller that sets LOCKED owns the payload until it clears it again.
//!
//! Blocking on a locked slot snapshots the slot's wait channel while the
//! table mutex is held, so an unlock racing with the decision to sleep is
//! never lost. Wakeups are broadcast and losers go back to sleep.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use spin::Mutex;

use super::inode::{InodeData, InodeFlags, InodeId};
use crate::drivers::DevId;
use crate::sync::{Sleeper, WaitChannel};

/// Index of a slot in the cache
pub type SlotId = usize;

/// Outcome of a lookup that may reserve a slot for loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Cached; returned locked with one more reference
    Hit(SlotId),
    /// Not cached; a slot is hashed at the key, locked, and not yet VALID
    Reserved(SlotId),
    /// Not cached and no free slot
    Exhausted,
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotState {
    count: u32,
    flags: InodeFlags,
    id: InodeId,
    hashed: bool,
}

struct Table {
    slots: Vec<SlotState>,
    buckets: Vec<Vec<SlotId>>,
    free: Vec<SlotId>,
}

impl Table {
    fn bucket(&self, id: InodeId) -> usize {
        (id.dev.raw() ^ id.num) as usize % self.buckets.len()
    }

    fn find(&self, id: InodeId) -> Option<SlotId> {
        self.buckets[self.bucket(id)]
            .iter()
            .copied()
            .find(|&s| self.slots[s].id == id)
    }

    fn hash(&mut self, slot: SlotId, id: InodeId) {
        let b = self.bucket(id);
        self.slots[slot].id = id;
        self.slots[slot].hashed = true;
        self.buckets[b].push(slot);
    }

    fn unhash(&mut self, slot: SlotId) {
        if !self.slots[slot].hashed {
            return;
        }
        let b = self.bucket(self.slots[slot].id);
        self.buckets[b].retain(|&s| s != slot);
        self.slots[slot].hashed = false;
    }

    /// Pop a free slot and hand it out locked with one reference
    fn take_free(&mut self) -> Option<SlotId> {
        let slot = self.free.pop()?;
        let state = &mut self.slots[slot];
        debug_assert_eq!(state.count, 0);
        state.count = 1;
        state.flags = InodeFlags::LOCKED;
        state.id = InodeId::default();
        Some(slot)
    }
}

struct Slot {
    data: UnsafeCell<InodeData>,
    chan: WaitChannel,
}

/// The in-core inode table
pub struct InodeCache {
    table: Mutex<Table>,
    slots: Box<[Slot]>,
    sleeper: Arc<dyn Sleeper>,
}

// SAFETY: a slot's payload is only reached through `data`, whose callers hold
// the slot's LOCKED flag. Everything else sits behind `table`.
unsafe impl Sync for InodeCache {}

impl InodeCache {
    /// Create a cache with `nslots` slots hashed into `nbuckets` buckets
    pub fn new(nslots: usize, nbuckets: usize, sleeper: Arc<dyn Sleeper>) -> Self {
        assert!(nslots > 0 && nbuckets > 0, "inode cache needs slots and buckets");

        let slots = (0..nslots)
            .map(|_| Slot {
                data: UnsafeCell::new(InodeData::default()),
                chan: WaitChannel::new(),
            })
            .collect();

        let mut buckets = Vec::with_capacity(nbuckets);
        buckets.resize_with(nbuckets, Vec::new);

        log_info!("ICACHE", "{} inode slots, {} hash buckets", nslots, nbuckets);

        Self {
            table: Mutex::new(Table {
                slots: alloc::vec![SlotState::default(); nslots],
                buckets,
                // Slot 0 is handed out first
                free: (0..nslots).rev().collect(),
            }),
            slots,
            sleeper,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.table.lock().free.len()
    }

    /// Block until `slot`'s wait channel fires past `ticket`
    fn wait(&self, slot: SlotId, ticket: u64) {
        self.sleeper.sleep(&self.slots[slot].chan, ticket);
    }

    fn wake(&self, slot: SlotId) {
        let chan = &self.slots[slot].chan;
        chan.wake_all();
        self.sleeper.wakeup(chan);
    }

    /// Pop a free slot, returned locked with one reference and a blank payload
    ///
    /// Returns `None` when every slot is in use. The slot is not hashed.
    pub fn acquire_free_slot(&self) -> Option<SlotId> {
        let slot = self.table.lock().take_free();
        match slot {
            Some(slot) => {
                // SAFETY: the slot was just handed out locked.
                unsafe { *self.data(slot) = InodeData::default() };
                Some(slot)
            }
            None => {
                log_warn!("ICACHE", "inode table overflow");
                None
            }
        }
    }

    /// Hash an acquired slot at `id`
    ///
    /// The slot must be locked by the caller and not yet hashed.
    pub fn insert(&self, slot: SlotId, id: InodeId) {
        let mut table = self.table.lock();
        debug_assert!(!table.slots[slot].hashed);
        debug_assert!(table.slots[slot].flags.contains(InodeFlags::LOCKED));
        table.hash(slot, id);
    }

    /// Take `slot` out of its hash bucket
    pub fn remove(&self, slot: SlotId) {
        self.table.lock().unhash(slot);
    }

    /// Find a cached inode
    ///
    /// On a hit the slot comes back locked with one more reference. A locked
    /// match puts the caller to sleep, after which the whole scan restarts.
    pub fn lookup(&self, id: InodeId) -> Option<SlotId> {
        loop {
            let mut table = self.table.lock();
            let slot = table.find(id)?;

            let state = &mut table.slots[slot];
            if state.flags.contains(InodeFlags::LOCKED) {
                let ticket = self.slots[slot].chan.ticket();
                drop(table);
                self.wait(slot, ticket);
                continue;
            }

            state.count += 1;
            state.flags.insert(InodeFlags::LOCKED);
            return Some(slot);
        }
    }

    /// Find a cached inode, or reserve a slot for loading it
    ///
    /// A reserved slot is hashed at `id` and locked, so concurrent lookups of
    /// the same key wait for the load instead of starting a second one. The
    /// loader either sets VALID and unlocks, or calls [`InodeCache::discard`].
    pub fn lookup_or_reserve(&self, id: InodeId) -> Lookup {
        loop {
            let mut table = self.table.lock();

            let Some(slot) = table.find(id) else {
                let Some(slot) = table.take_free() else {
                    drop(table);
                    log_warn!("ICACHE", "inode table overflow");
                    return Lookup::Exhausted;
                };
                table.hash(slot, id);
                drop(table);

                // SAFETY: the slot was just handed out locked.
                unsafe { *self.data(slot) = InodeData::empty(id.dev, id.num) };
                return Lookup::Reserved(slot);
            };

            let state = &mut table.slots[slot];
            if state.flags.contains(InodeFlags::LOCKED) {
                let ticket = self.slots[slot].chan.ticket();
                drop(table);
                self.wait(slot, ticket);
                continue;
            }

            state.count += 1;
            state.flags.insert(InodeFlags::LOCKED);
            return Lookup::Hit(slot);
        }
    }

    /// Give back a locked slot whose load failed
    pub fn discard(&self, slot: SlotId) {
        {
            let mut table = self.table.lock();
            table.unhash(slot);
            let state = &mut table.slots[slot];
            state.count = 0;
            state.flags = InodeFlags::empty();
            table.free.push(slot);
        }
        self.wake(slot);
    }

    /// Add a reference to a slot the caller already references
    pub fn add_ref(&self, slot: SlotId) {
        let mut table = self.table.lock();
        debug_assert!(table.slots[slot].count > 0);
        table.slots[slot].count += 1;
    }

    /// Set the reference count of a freshly acquired slot
    pub(crate) fn set_count(&self, slot: SlotId, count: u32) {
        self.table.lock().slots[slot].count = count;
    }

    /// Drop one reference; returns `true` when the count reached zero
    ///
    /// # Panics
    /// Panics if the count is already zero.
    pub fn drop_ref(&self, slot: SlotId) -> bool {
        let mut table = self.table.lock();
        let state = &mut table.slots[slot];
        if state.count == 0 {
            let id = state.id;
            drop(table);
            kpanic!("ICACHE", "freeing inode twice ({})", id);
        }
        state.count -= 1;
        state.count == 0
    }

    /// Return an unreferenced, locked slot to the free list
    ///
    /// Unhashes it, clears every flag (LOCKED included) and wakes waiters.
    pub fn recycle(&self, slot: SlotId) {
        {
            let mut table = self.table.lock();
            debug_assert_eq!(table.slots[slot].count, 0);
            table.unhash(slot);
            table.slots[slot].flags = InodeFlags::empty();
            table.free.push(slot);
        }
        self.wake(slot);
    }

    /// Take `slot`'s content lock
    ///
    /// The caller must hold a reference. Sleeps while another holder has it.
    pub fn lock(&self, slot: SlotId) {
        loop {
            let mut table = self.table.lock();
            let state = &mut table.slots[slot];
            if !state.flags.contains(InodeFlags::LOCKED) {
                state.flags.insert(InodeFlags::LOCKED);
                return;
            }
            let ticket = self.slots[slot].chan.ticket();
            drop(table);
            self.wait(slot, ticket);
        }
    }

    /// Release `slot`'s content lock and wake every waiter
    pub fn unlock(&self, slot: SlotId) {
        self.table.lock().slots[slot].flags.remove(InodeFlags::LOCKED);
        self.wake(slot);
    }

    /// Pin a cached, valid, non-pipe slot with an extra reference
    ///
    /// Used by sync, which walks slots it holds no reference to.
    pub(crate) fn pin_valid(&self, slot: SlotId) -> bool {
        let mut table = self.table.lock();
        let state = &mut table.slots[slot];
        if state.count == 0
            || !state.flags.contains(InodeFlags::VALID)
            || state.flags.contains(InodeFlags::PIPE)
        {
            return false;
        }
        state.count += 1;
        true
    }

    pub fn flags(&self, slot: SlotId) -> InodeFlags {
        self.table.lock().slots[slot].flags
    }

    pub fn set_flags(&self, slot: SlotId, flags: InodeFlags) {
        self.table.lock().slots[slot].flags.insert(flags);
    }

    pub fn clear_flags(&self, slot: SlotId, flags: InodeFlags) {
        self.table.lock().slots[slot].flags.remove(flags);
    }

    pub fn count(&self, slot: SlotId) -> u32 {
        self.table.lock().slots[slot].count
    }

    pub fn id(&self, slot: SlotId) -> InodeId {
        self.table.lock().slots[slot].id
    }

    /// Slot currently hashed at `id`, if any
    pub fn cached(&self, id: InodeId) -> Option<SlotId> {
        self.table.lock().find(id)
    }

    /// Is any referenced inode of `dev` in the cache?
    pub fn in_use_on(&self, dev: DevId) -> bool {
        let table = self.table.lock();
        table
            .slots
            .iter()
            .any(|s| s.hashed && s.count > 0 && s.id.dev == dev)
    }

    /// Payload of `slot`
    ///
    /// # Safety
    /// The caller must hold `slot`'s LOCKED flag for as long as the returned
    /// reference lives, and must not create a second reference through it.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn data(&self, slot: SlotId) -> &mut InodeData {
        &mut *self.slots[slot].data.get()
    }
}

//! Outgoing link slots of one delegate.
//!
//! Readers (deliveries from any thread) load the slot vector and one cell
//! without locking. Only the owning control loop writes, through
//! [`SlotAllocator`]. Slots are never removed; a vacated slot holds `None`
//! until the allocator hands its index out again.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::link::Link;
use crate::node::LinkId;

pub(crate) struct LinkSlots {
    cells: ArcSwap<Vec<Arc<ArcSwapOption<Link>>>>,
}

impl LinkSlots {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: ArcSwap::from_pointee(Vec::with_capacity(capacity)),
        }
    }

    /// Number of slots ever allocated, vacant ones included.
    pub(crate) fn len(&self) -> usize {
        self.cells.load().len()
    }

    pub(crate) fn get(&self, link_id: LinkId) -> Option<Arc<Link>> {
        self.cells.load().get(link_id).and_then(|cell| cell.load_full())
    }

    pub(crate) fn active(&self) -> usize {
        self.cells
            .load()
            .iter()
            .filter(|cell| cell.load().is_some())
            .count()
    }

    fn store(&self, link_id: LinkId, link: Option<Arc<Link>>) -> bool {
        match self.cells.load().get(link_id) {
            Some(cell) => {
                cell.store(link);
                true
            },
            None => false,
        }
    }

    fn push(&self, link: Arc<Link>) -> LinkId {
        let current = self.cells.load_full();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::new(ArcSwapOption::new(Some(link))));
        let link_id = next.len() - 1;
        self.cells.store(Arc::new(next));
        link_id
    }
}

/// Write side of [`LinkSlots`], owned by the control loop.
#[derive(Debug, Default)]
pub(crate) struct SlotAllocator {
    free: Vec<LinkId>,
}

impl SlotAllocator {
    /// Places `link` in a vacant slot, or appends a new one.
    pub(crate) fn attach(&mut self, slots: &LinkSlots, link: Arc<Link>) -> LinkId {
        while let Some(link_id) = self.free.pop() {
            if slots.store(link_id, Some(Arc::clone(&link))) {
                return link_id;
            }
        }
        slots.push(link)
    }

    /// Vacates the slot holding `link` and returns its index.
    pub(crate) fn detach(&mut self, slots: &LinkSlots, link: &Arc<Link>) -> Option<LinkId> {
        let cells = slots.cells.load();
        let link_id = cells.iter().position(|cell| {
            let current = cell.load();
            matches!(&*current, Some(held) if Arc::ptr_eq(held, link))
        })?;
        cells[link_id].store(None);
        self.free.push(link_id);
        Some(link_id)
    }

    /// Vacates every slot; returns how many held a link.
    pub(crate) fn clear(&mut self, slots: &LinkSlots) -> usize {
        let cells = slots.cells.load();
        let mut cleared = 0;
        for (link_id, cell) in cells.iter().enumerate() {
            if cell.swap(None).is_some() {
                self.free.push(link_id);
                cleared += 1;
            }
        }
        cleared
    }
}

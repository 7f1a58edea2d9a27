//! The system page table.
//!
//! spec.md's C5 calls for a flat virtual-to-physical page map with
//! sequential frame allocation and no eviction — frames, once handed out,
//! are permanent for the life of the simulation. This is deliberately far
//! simpler than a real multi-level walker: there's exactly one shared
//! table, guarded by one mutex, and a lookup that misses always succeeds by
//! allocating the next frame rather than faulting.
//!
//! Each process has its own virtual address space, so the map is keyed on
//! `(owner_process, vpn)`: two processes touching the same virtual page
//! never alias to the same frame (spec.md §4.3's process-scoped matching
//! applies to the page table's geometry exactly like a data bank's).

use std::collections::HashMap;
use std::sync::Mutex;

/// The system-wide page table.
#[derive(Debug)]
pub struct PageTable {
    page_size: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<(u32, u64), u64>,
    next_frame: u64,
}

impl PageTable {
    /// Creates an empty page table for the given page size.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Translates `vaddr` issued by `owner_process` to a physical address,
    /// allocating a fresh frame on first touch of that process's page.
    /// Never fails: frame space is treated as unbounded (spec.md's
    /// Non-goals exclude DRAM capacity modeling).
    ///
    /// # Panics
    ///
    /// Panics if the table's mutex is poisoned.
    pub fn translate(&self, owner_process: u32, vaddr: u64) -> u64 {
        let page_bits = self.page_size.trailing_zeros();
        let vpn = vaddr >> page_bits;
        let offset = vaddr & (self.page_size as u64 - 1);

        let mut inner = self.inner.lock().expect("page table mutex poisoned");
        let frame = self.allocate_if_new(&mut inner, owner_process, vpn);
        (frame << page_bits) | offset
    }

    fn allocate_if_new(&self, inner: &mut Inner, owner_process: u32, vpn: u64) -> u64 {
        if let Some(&frame) = inner.map.get(&(owner_process, vpn)) {
            return frame;
        }
        let frame = inner.next_frame;
        inner.next_frame += 1;
        inner.map.insert((owner_process, vpn), frame);
        frame
    }

    /// Number of distinct pages that have been mapped so far, across every
    /// process.
    ///
    /// # Panics
    ///
    /// Panics if the table's mutex is poisoned.
    #[must_use]
    pub fn mapped_pages(&self) -> usize {
        self.inner.lock().expect("page table mutex poisoned").map.len()
    }

    /// Every `(owning process, virtual page number, frame number)` mapping
    /// installed so far, sorted by `(owner_process, vpn)`, for the report's
    /// page-table dump.
    ///
    /// # Panics
    ///
    /// Panics if the table's mutex is poisoned.
    #[must_use]
    pub fn dump(&self) -> Vec<(u32, u64, u64)> {
        let inner = self.inner.lock().expect("page table mutex poisoned");
        let mut entries: Vec<(u32, u64, u64)> = inner
            .map
            .iter()
            .map(|(&(owner_process, vpn), &frame)| (owner_process, vpn, frame))
            .collect();
        entries.sort_unstable();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::PageTable;

    #[test]
    fn same_page_always_maps_to_the_same_frame() {
        let pt = PageTable::new(4096);
        let a = pt.translate(1, 0x1000);
        let b = pt.translate(1, 0x1000 + 0x20);
        assert_eq!(a & !0xFFF, b & !0xFFF);
    }

    #[test]
    fn offset_within_page_is_preserved() {
        let pt = PageTable::new(4096);
        let phys = pt.translate(1, 0x1000 + 0x20);
        assert_eq!(phys & 0xFFF, 0x20);
    }

    #[test]
    fn distinct_pages_get_distinct_frames() {
        let pt = PageTable::new(4096);
        let a = pt.translate(1, 0x1000);
        let b = pt.translate(1, 0x2000);
        assert_ne!(a & !0xFFF, b & !0xFFF);
        assert_eq!(pt.mapped_pages(), 2);
    }

    #[test]
    fn two_processes_touching_the_same_page_get_distinct_frames() {
        let pt = PageTable::new(4096);
        let a = pt.translate(1, 0x1000);
        let b = pt.translate(2, 0x1000);
        assert_ne!(a & !0xFFF, b & !0xFFF);
        assert_eq!(pt.mapped_pages(), 2);
    }

    #[test]
    fn dump_lists_every_mapping_sorted_by_owner_then_vpn() {
        let pt = PageTable::new(4096);
        pt.translate(1, 0x2000);
        pt.translate(1, 0x1000);
        pt.translate(2, 0x1000);
        assert_eq!(pt.dump(), vec![(1, 1, 1), (1, 2, 0), (2, 1, 2)]);
    }
}

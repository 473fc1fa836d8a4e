//! Search Page (SPEC_FULL §3 "Search Page", §4.D).
//!
//! A fixed-size window into one region carrying the last-seen bytes plus a
//! per-element validity bitmap. Grounded on `original_source/cl_search_new.c`'s
//! `cl_search_page_t` (start, data, validity, first_match/last_match), kept
//! here as a plain owned struct rather than an intrusive doubly-linked node
//! — see SPEC_FULL §9 decision (b).

use crate::bitmap::ValidityBitmap;
use crate::memory::Endianness;

pub struct SearchPage {
    pub start: u64,
    pub value_size: usize,
    pub endianness: Endianness,
    /// Bytes as of the most recent successful step.
    pub data: Vec<u8>,
    /// Bytes as they stood immediately before the most recent step (equal
    /// to `data` for a page that has only ever been through its first
    /// step). This is what `previous_value` in `iterate`/`snapshot_window`
    /// is read from — distinct from `data`, which is the "previous"
    /// baseline a *following* step compares against.
    pub previous_data: Vec<u8>,
    pub validity: ValidityBitmap,
    pub first_match: usize,
    pub last_match: usize,
    pub matches: usize,
}

impl SearchPage {
    pub fn new(
        start: u64,
        value_size: usize,
        endianness: Endianness,
        data: Vec<u8>,
        validity: ValidityBitmap,
    ) -> Self {
        let mut page = SearchPage {
            start,
            value_size,
            endianness,
            previous_data: data.clone(),
            data,
            validity,
            first_match: 0,
            last_match: 0,
            matches: 0,
        };
        page.recompute_bounds();
        page
    }

    pub fn element_count(&self) -> usize {
        self.data.len() / self.value_size
    }

    pub fn element_addr(&self, index: usize) -> u64 {
        self.start + (index * self.value_size) as u64
    }

    pub fn element_bytes(&self, index: usize) -> &[u8] {
        let off = index * self.value_size;
        &self.data[off..off + self.value_size]
    }

    pub fn previous_element_bytes(&self, index: usize) -> &[u8] {
        let off = index * self.value_size;
        &self.previous_data[off..off + self.value_size]
    }

    /// Commits a freshly read buffer as the new `data`, moving the old
    /// `data` into `previous_data`.
    pub fn commit(&mut self, fresh: Vec<u8>) {
        self.previous_data = std::mem::replace(&mut self.data, fresh);
    }

    /// Recomputes `first_match`/`last_match`/`matches` from the validity
    /// bitmap. Returns the new match count; `0` means the page should be
    /// freed by the caller.
    pub fn recompute_bounds(&mut self) -> usize {
        self.matches = self.validity.popcount();
        if self.matches > 0 {
            self.first_match = self.validity.scan_first().unwrap();
            self.last_match = self.validity.scan_last().unwrap();
        } else {
            self.first_match = 0;
            self.last_match = 0;
        }
        self.matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_follow_validity_popcount() {
        let mut bm = ValidityBitmap::new_all_clear(8);
        bm.set(2, true);
        bm.set(5, true);
        let page = SearchPage::new(0x1000, 4, Endianness::Little, vec![0u8; 32], bm);
        assert_eq!(page.matches, 2);
        assert_eq!(page.first_match, 2);
        assert_eq!(page.last_match, 5);
    }

    #[test]
    fn empty_validity_yields_zero_matches() {
        let bm = ValidityBitmap::new_all_clear(4);
        let page = SearchPage::new(0x2000, 4, Endianness::Little, vec![0u8; 16], bm);
        assert_eq!(page.matches, 0);
    }
}

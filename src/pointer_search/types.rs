//! Pointer-Search Result (SPEC_FULL §3 "Pointer-Search Result", §4.E).
//!
//! Grounded on `pointer_scan/types.rs`'s `PointerChain`/`PointerChainStep`
//! naming for "a chain is a base plus a sequence of offsets", but shaped to
//! match `original_source/cl_search.c`'s flat `cl_pointerresult_t` — a fixed
//! `offsets` array per result rather than a module-relative BFS tree. The
//! teacher's BFS-v2 implicit-tree machinery (`PointerDir`, `ChainInfo`,
//! `MapQueue`) is not reused here; see DESIGN.md.

use crate::counter::Counter;

/// One discovered candidate chain: `address_initial` holds the outermost
/// pointer; dereferencing it and adding `offsets[0]`, then repeating for
/// each subsequent offset, reaches `address_final`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerResult {
    pub address_initial: u64,
    /// `offsets[0]` is the outermost level's additive displacement.
    pub offsets: Vec<i64>,
    pub address_final: u64,
    pub value_current: Counter,
    pub value_previous: Counter,
}

impl PointerResult {
    pub fn passes(&self) -> usize {
        self.offsets.len()
    }
}

//! Pointer Search Engine (SPEC_FULL §4.E).
//!
//! Grounded on `original_source/cl_search.c` (`cl_pointersearch_init`,
//! `add_pass`, `cl_pointersearch_step`, `resolve_pointerresult`) for the
//! exact multi-pass discovery and resolution algorithm, including the
//! `exact_only`/terminal-empty-state corrections pinned in SPEC_FULL §9.
//! The teacher's BFS-v2 implicit-tree scanner (`mapqueue_v2.rs`,
//! `pointer_scan/manager.rs`) is not reused; see DESIGN.md.

use log::{debug, info, warn};

use crate::counter::{Counter, ValueKind};
use crate::error::{Result, SearchEngineError};
use crate::memory::{MemoryAccessor, MemoryRegistry, Region};
use crate::pointer_search::types::PointerResult;
use crate::types::Comparison;

fn validate_init_args(value_kind: ValueKind, value_width: usize, passes: u8, max_results: usize) -> Result<()> {
    if passes == 0 {
        return Err(SearchEngineError::InvalidConfiguration("passes must be >= 1".to_string()));
    }
    if max_results == 0 {
        return Err(SearchEngineError::InvalidConfiguration("max_results must be >= 1".to_string()));
    }
    if ![2, 4, 8].contains(&value_width) {
        return Err(SearchEngineError::InvalidConfiguration(format!(
            "value_width must be 2, 4, or 8 bytes, got {value_width}"
        )));
    }
    if value_kind == ValueKind::Float && value_width != 4 && value_width != 8 {
        return Err(SearchEngineError::InvalidConfiguration(
            "float values must be 4 or 8 bytes wide".to_string(),
        ));
    }
    Ok(())
}

/// Mirrors `compare_to_value`/`compare_to_value_float` (qualified, an
/// argument supplied) and `compare_to_nothing`/`compare_to_nothing_float`
/// (unqualified, no argument) from `cl_search.c`.
fn evaluate(comparison: Comparison, previous: Counter, current: Counter, argument: Option<Counter>) -> bool {
    match argument {
        Some(arg) => match comparison {
            Comparison::Equal => current.equal_floor_aware(&arg),
            Comparison::NotEqual => current.not_equal(&arg),
            Comparison::Greater => current.greater(&arg),
            Comparison::Less => current.lesser(&arg),
            Comparison::Increased => current.equal(&previous.wrapping_add(arg.as_i64().unwrap_or(0))),
            Comparison::Decreased => previous.equal(&current.wrapping_add(arg.as_i64().unwrap_or(0))),
            Comparison::AboveAddress | Comparison::BelowAddress => false,
        },
        None => match comparison {
            Comparison::Equal => current.equal(&previous),
            Comparison::NotEqual => current.not_equal(&previous),
            Comparison::Greater | Comparison::Increased => current.greater(&previous),
            Comparison::Less | Comparison::Decreased => current.lesser(&previous),
            Comparison::AboveAddress | Comparison::BelowAddress => false,
        },
    }
}

/// Multi-pass pointer-chain discovery engine. Owns one contiguous result
/// set, reallocated (shrunk) after each pass or step (SPEC_FULL §5).
pub struct PointerSearchEngine {
    results: Vec<PointerResult>,
    value_kind: ValueKind,
    value_width: usize,
    passes: u8,
    range: u64,
    comparison: Comparison,
    /// Set once any pass or step yields zero results; subsequent passes
    /// and steps become no-ops (SPEC_FULL §9, `add_pass` defect correction).
    empty: bool,
    /// Set when a pass stopped early because it hit `max_results`.
    truncated: bool,
}

impl PointerSearchEngine {
    /// Runs the initial one-pass scan against `target_addr`, then applies
    /// `passes - 1` additional narrowing passes.
    pub fn init(
        registry: &dyn MemoryRegistry,
        target_addr: u64,
        value_kind: ValueKind,
        value_width: usize,
        passes: u8,
        range: u64,
        max_results: usize,
    ) -> Result<Self> {
        validate_init_args(value_kind, value_width, passes, max_results)?;

        let accessor = MemoryAccessor::new(registry);
        let value_previous = accessor
            .read(None, target_addr, 0, value_width)
            .map(|bits| Counter::from_width_bits(bits, value_kind, value_width))
            .map_err(|_| {
                SearchEngineError::InvalidArgument(format!("address {target_addr:#x} is unreadable for a pointer search"))
            })?;

        let mut engine = PointerSearchEngine {
            results: Vec::new(),
            value_kind,
            value_width,
            passes: 1,
            range,
            comparison: Comparison::Equal,
            empty: false,
            truncated: false,
        };

        let exact_only = registry.regions().len() != 1;
        let (results, truncated) = scan_first_pass(&accessor, registry.regions(), target_addr, range, max_results, exact_only);
        engine.truncated = truncated;
        engine.results = results
            .into_iter()
            .map(|(address_initial, offset)| PointerResult {
                address_initial,
                offsets: vec![offset],
                address_final: target_addr,
                value_current: value_previous,
                value_previous,
            })
            .collect();

        if engine.results.is_empty() {
            engine.empty = true;
            info!("pointer search for {target_addr:#x} found no candidates in the first pass");
        }

        for _ in 1..passes {
            engine.add_pass(&accessor, registry.regions(), max_results);
        }

        info!(
            "pointer search for {target_addr:#x} completed {} pass(es) with {} results",
            engine.passes,
            engine.results.len()
        );
        Ok(engine)
    }

    pub fn results(&self) -> &[PointerResult] {
        &self.results
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_empty_state(&self) -> bool {
        self.empty
    }

    pub fn set_comparison(&mut self, comparison: Comparison) {
        self.comparison = comparison;
    }

    fn add_pass(&mut self, accessor: &MemoryAccessor, regions: &[Region], max_results: usize) {
        if self.empty {
            return;
        }
        self.passes += 1;
        let mut new_results = Vec::with_capacity(self.results.len());
        let mut truncated = false;

        'outer: for prev in &self.results {
            let target = prev.address_initial;
            for region in regions {
                if region.size < region.pointer_length as u64 {
                    continue;
                }
                let mut j = 0u64;
                while j < region.size {
                    let Ok(value) = accessor.read_pointer(region, region.base_guest + j) else {
                        j += region.pointer_length as u64;
                        continue;
                    };
                    if value <= target && value >= target.saturating_sub(self.range) {
                        let mut offsets = Vec::with_capacity(prev.offsets.len() + 1);
                        offsets.push((target - value) as i64);
                        offsets.extend_from_slice(&prev.offsets);
                        new_results.push(PointerResult {
                            address_initial: region.base_guest + j,
                            offsets,
                            address_final: prev.address_final,
                            value_current: prev.value_current,
                            value_previous: prev.value_previous,
                        });
                        if new_results.len() == max_results {
                            warn!("pointer search pass reached maximum result count of {max_results}");
                            truncated = true;
                            break 'outer;
                        }
                    }
                    j += region.pointer_length as u64;
                }
            }
        }

        self.truncated = truncated;
        if new_results.is_empty() {
            self.empty = true;
            info!("pointer search pass {} yielded no results, entering terminal empty state", self.passes);
        }
        self.results = new_results;
    }

    /// Resolves every result's chain, reads its final value, and keeps only
    /// the survivors of `comparison`/`argument`. Returns the surviving
    /// count.
    pub fn step(&mut self, registry: &dyn MemoryRegistry, argument: Option<Counter>) -> usize {
        if self.empty {
            return 0;
        }
        let accessor = MemoryAccessor::new(registry);
        let mut surviving = Vec::with_capacity(self.results.len());
        let mut valid_pointers = 0usize;

        for result in std::mem::take(&mut self.results) {
            let Some(address) = resolve_chain(&accessor, result.address_initial, &result.offsets) else {
                continue;
            };
            let Ok(bits) = accessor.read(None, address, 0, self.value_width) else {
                continue;
            };
            valid_pointers += 1;
            let current = Counter::from_width_bits(bits, self.value_kind, self.value_width);
            let passed = evaluate(self.comparison, result.value_previous, current, argument);
            if passed {
                surviving.push(PointerResult {
                    address_initial: result.address_initial,
                    offsets: result.offsets,
                    address_final: address,
                    value_current: current,
                    value_previous: current,
                });
            }
        }

        debug!(
            "pointer search step: {} matches across {} valid pointers",
            surviving.len(),
            valid_pointers
        );
        self.results = surviving;
        if self.results.is_empty() {
            self.empty = true;
        }
        self.results.len()
    }

    /// Resolves one result's chain without touching engine state (SPEC_FULL
    /// §4.G `resolve_pointer_chain`), so a UI can re-derive a fresh address
    /// between steps without calling `update` on the whole result set.
    pub fn resolve(&self, registry: &dyn MemoryRegistry, result: &PointerResult) -> Option<u64> {
        let accessor = MemoryAccessor::new(registry);
        resolve_chain(&accessor, result.address_initial, &result.offsets)
    }

    /// Refreshes `address_final`/`value_current` for every live result
    /// without filtering (SPEC_FULL §4.E `update`, §8 "pointer idempotence").
    pub fn update(&mut self, registry: &dyn MemoryRegistry) {
        let accessor = MemoryAccessor::new(registry);
        for result in &mut self.results {
            let Some(address) = resolve_chain(&accessor, result.address_initial, &result.offsets) else {
                continue;
            };
            result.address_final = address;
            if let Ok(bits) = accessor.read(None, address, 0, self.value_width) {
                result.value_current = Counter::from_width_bits(bits, self.value_kind, self.value_width);
            }
        }
    }
}

/// Resolution algorithm (SPEC_FULL §4.E): walks the chain, dereferencing at
/// each level and adding that level's offset. `None` means an intermediate
/// region lookup or read failed.
fn resolve_chain(accessor: &MemoryAccessor, address_initial: u64, offsets: &[i64]) -> Option<u64> {
    let mut addr = address_initial;
    for &offset in offsets {
        let region = accessor.find_region(addr)?;
        let ptr = accessor.read_pointer(region, addr).ok()?;
        addr = (ptr as i64).wrapping_add(offset) as u64;
    }
    Some(addr)
}

/// First-pass discovery scan (SPEC_FULL §4.E). Returns `(address_initial,
/// offset)` pairs plus whether the scan was truncated by `max_results`.
fn scan_first_pass(
    accessor: &MemoryAccessor,
    regions: &[Region],
    target_addr: u64,
    range: u64,
    max_results: usize,
    exact_only: bool,
) -> (Vec<(u64, i64)>, bool) {
    let mut out = Vec::new();
    let mut truncated = false;

    'outer: for region in regions {
        if region.size < region.pointer_length as u64 {
            continue;
        }
        let target = if exact_only { region.base_guest + target_addr } else { target_addr };
        let mut j = 0u64;
        while j < region.size {
            let Ok(value) = accessor.read_pointer(region, region.base_guest + j) else {
                j += region.pointer_length as u64;
                continue;
            };
            if value <= target && value >= target.saturating_sub(range) {
                out.push((region.base_guest + j, (target - value) as i64));
                if out.len() == max_results {
                    warn!("pointer search for {target_addr:#x} reached maximum result count of {max_results}");
                    truncated = true;
                    break 'outer;
                }
            }
            j += region.pointer_length as u64;
        }
    }
    (out, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::{MockMemoryRegistry, MockRegion};
    use crate::memory::Endianness;

    #[test]
    fn one_pass_finds_direct_pointer() {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x1000, 0x40, 4, Endianness::Little));
        r.write_u32(0x1008, 0x1234); // the tracked value at the target
        r.write_u32(0x1020, 0x1004); // a pointer 4 bytes short of target
        let engine = PointerSearchEngine::init(&mem, 0x1008, ValueKind::Int, 4, 1, 0x10, 16).unwrap();
        assert_eq!(engine.results().len(), 1);
        let result = &engine.results()[0];
        assert_eq!(result.address_initial, 0x1020);
        assert_eq!(result.offsets, vec![0x04]);
    }

    #[test]
    fn truncates_at_max_results() {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x1000, 0x1000, 4, Endianness::Little));
        r.write_u32(0x1008, 0x1234);
        for i in 0..100u64 {
            r.write_u32(0x1100 + i * 4, 0x1008);
        }
        let engine = PointerSearchEngine::init(&mem, 0x1008, ValueKind::Int, 4, 1, 0, 10).unwrap();
        assert_eq!(engine.results().len(), 10);
        assert!(engine.truncated());
    }

    #[test]
    fn unreadable_target_fails_init() {
        let mem = MockMemoryRegistry::new();
        assert!(PointerSearchEngine::init(&mem, 0xdead, ValueKind::Int, 4, 1, 0x10, 16).is_err());
    }

    #[test]
    fn step_resolves_chain_and_filters_by_comparison() {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x1000, 0x40, 4, Endianness::Little));
        r.write_u32(0x1008, 10);
        r.write_u32(0x1020, 0x1004);
        let mut engine = PointerSearchEngine::init(&mem, 0x1008, ValueKind::Int, 4, 1, 0x10, 16).unwrap();
        engine.set_comparison(Comparison::Greater);
        r.write_u32(0x1008, 20);
        let matches = engine.step(&mem, Some(Counter::I32(15)));
        assert_eq!(matches, 1);
    }

    #[test]
    fn update_refreshes_without_filtering() {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x1000, 0x40, 4, Endianness::Little));
        r.write_u32(0x1008, 10);
        r.write_u32(0x1020, 0x1004);
        let mut engine = PointerSearchEngine::init(&mem, 0x1008, ValueKind::Int, 4, 1, 0x10, 16).unwrap();
        r.write_u32(0x1008, 99);
        engine.update(&mem);
        assert_eq!(engine.results()[0].value_current, Counter::I32(99));
        let before = engine.results().to_vec();
        engine.update(&mem);
        assert_eq!(engine.results(), before.as_slice());
    }
}

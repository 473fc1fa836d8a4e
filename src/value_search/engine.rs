//! Value Search Engine (SPEC_FULL §4.D).
//!
//! Grounded on `search/engine/single_search.rs`'s paged chunk walk
//! (`search_region_single`, `search_in_chunks_with_status`) and
//! `original_source/cl_search_new.c`'s `cl_search_step_first`/`cl_search_step`
//! for the page-list bookkeeping, run sequentially rather than across a
//! `rayon` pool (SPEC_FULL §5).

use log::{debug, info, warn};

use crate::bitmap::ValidityBitmap;
use crate::counter::{Counter, ValueKind};
use crate::error::{Result, SearchEngineError};
use crate::memory::{MemoryAccessor, MemoryRegistry};
use crate::types::{Comparison, ValueSource};
use crate::value_search::page::SearchPage;

pub struct ValueSearchEngine {
    pages: Vec<SearchPage>,
    value_kind: ValueKind,
    value_size: usize,
    page_size: usize,
    steps: u64,
}

fn validate_kind_size(kind: ValueKind, size: usize) -> Result<()> {
    if ![1, 2, 4, 8].contains(&size) {
        return Err(SearchEngineError::InvalidConfiguration(format!(
            "value_size must be 1, 2, 4, or 8 bytes, got {size}"
        )));
    }
    if kind == ValueKind::Float && size != 4 && size != 8 {
        return Err(SearchEngineError::InvalidConfiguration(
            "float values must be 4 or 8 bytes wide".to_string(),
        ));
    }
    Ok(())
}

/// Evaluates one element's comparison. `previous` is the page's last
/// committed bytes (ignored for Immediate sources except in the qualified
/// delta case, where it still supplies the baseline).
fn evaluate(
    comparison: Comparison,
    current: Counter,
    previous: Counter,
    source: ValueSource,
    argument: Option<Counter>,
) -> bool {
    let as_addr = |c: &Counter| c.as_i64().unwrap_or(0) as u64;
    match source {
        ValueSource::ImmediateInt | ValueSource::ImmediateFloat => {
            let arg = match argument {
                Some(a) => a,
                None => return false,
            };
            match comparison {
                Comparison::Equal => current.equal_floor_aware(&arg),
                Comparison::NotEqual => current.not_equal(&arg),
                Comparison::Greater => current.greater(&arg),
                Comparison::Less => current.lesser(&arg),
                Comparison::Increased => current.equal(&previous.wrapping_add(arg.as_i64().unwrap_or(0))),
                Comparison::Decreased => previous.equal(&current.wrapping_add(arg.as_i64().unwrap_or(0))),
                Comparison::AboveAddress => as_addr(&current) > as_addr(&arg),
                Comparison::BelowAddress => as_addr(&current) < as_addr(&arg),
            }
        }
        ValueSource::PreviousSnapshot | ValueSource::CurrentRam => {
            let reference = if source == ValueSource::PreviousSnapshot {
                previous
            } else {
                current
            };
            match comparison {
                Comparison::Equal => current.equal(&reference),
                Comparison::NotEqual => current.not_equal(&reference),
                Comparison::Greater => current.greater(&reference),
                Comparison::Less => current.lesser(&reference),
                Comparison::Increased => current.greater(&reference),
                Comparison::Decreased => current.lesser(&reference),
                Comparison::AboveAddress => as_addr(&current) > as_addr(&reference),
                Comparison::BelowAddress => as_addr(&current) < as_addr(&reference),
            }
        }
    }
}

impl ValueSearchEngine {
    pub fn new(page_size: usize) -> Self {
        ValueSearchEngine {
            pages: Vec::new(),
            value_kind: ValueKind::Int,
            value_size: 4,
            page_size,
            steps: 0,
        }
    }

    pub fn reset(&mut self, value_kind: ValueKind, value_size: usize) -> Result<()> {
        validate_kind_size(value_kind, value_size)?;
        self.pages.clear();
        self.value_kind = value_kind;
        self.value_size = value_size;
        self.steps = 0;
        Ok(())
    }

    pub fn matches(&self) -> usize {
        self.pages.iter().map(|p| p.matches).sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Exposes the live page list for introspection (property tests,
    /// diagnostics). Never mutated through this reference.
    pub fn pages(&self) -> &[SearchPage] {
        &self.pages
    }

    pub fn step_value(
        &mut self,
        registry: &dyn MemoryRegistry,
        comparison: Comparison,
        source: ValueSource,
        argument: Option<Counter>,
    ) -> usize {
        let matches = if self.steps == 0 {
            self.first_step(registry, comparison, source, argument)
        } else {
            self.subsequent_step(registry, comparison, source, argument)
        };
        self.steps += 1;
        debug!("value search step {} found {} matches", self.steps, matches);
        matches
    }

    pub fn step_ascii(&mut self, registry: &dyn MemoryRegistry, text: &[u8]) -> usize {
        let matches = if self.steps == 0 {
            self.first_step_ascii(registry, text)
        } else {
            self.subsequent_step_ascii(registry, text)
        };
        self.steps += 1;
        debug!("ascii step {} found {} matches", self.steps, matches);
        matches
    }

    /// Ascending `(address, previous, current)` triples over every live
    /// candidate, restartable at any time.
    pub fn iterate(&self) -> Vec<(u64, Counter, Counter)> {
        let mut out = Vec::with_capacity(self.matches());
        for page in &self.pages {
            for i in page.first_match..=page.last_match {
                if !page.validity.get(i) {
                    continue;
                }
                let current = Counter::from_bytes(page.element_bytes(i), self.value_kind, page.endianness);
                let previous = Counter::from_bytes(page.previous_element_bytes(i), self.value_kind, page.endianness);
                out.push((page.element_addr(i), previous, current));
            }
        }
        out
    }

    /// Read-only windowed view for a viewport renderer (SPEC_FULL §4.G):
    /// re-reads live memory for `curr` but never touches page validity or
    /// `data`/`previous_data`, so it can be called between steps without
    /// perturbing the next step's baseline.
    pub fn snapshot_window(
        &self,
        registry: &dyn MemoryRegistry,
        first_index: usize,
        count: usize,
    ) -> Vec<(u64, Counter, Counter)> {
        let accessor = MemoryAccessor::new(registry);
        let mut out = Vec::with_capacity(count);
        let mut seen = 0usize;
        'pages: for page in &self.pages {
            for i in page.first_match..=page.last_match {
                if !page.validity.get(i) {
                    continue;
                }
                if seen < first_index {
                    seen += 1;
                    continue;
                }
                if out.len() == count {
                    break 'pages;
                }
                let addr = page.element_addr(i);
                let previous = Counter::from_bytes(page.element_bytes(i), self.value_kind, page.endianness);
                let current = match accessor.read(None, addr, 0, self.value_size) {
                    Ok(bits) => Counter::from_width_bits(bits, self.value_kind, self.value_size),
                    Err(_) => previous,
                };
                out.push((addr, previous, current));
            }
        }
        out
    }

    fn first_step(
        &mut self,
        registry: &dyn MemoryRegistry,
        comparison: Comparison,
        source: ValueSource,
        argument: Option<Counter>,
    ) -> usize {
        self.pages.clear();
        let accessor = MemoryAccessor::new(registry);
        for region in registry.regions() {
            let mut pos = region.base_guest;
            while pos < region.end() {
                let window_len = self.page_size.min((region.end() - pos) as usize);
                let mut buf = vec![0u8; window_len];
                if accessor.read_bulk(region, pos, &mut buf).is_err() {
                    warn!("unreadable window at {pos:#x}, skipping");
                    pos += window_len as u64;
                    continue;
                }
                let element_count = window_len / self.value_size;
                let mut validity = ValidityBitmap::new_all_clear(element_count);
                for i in 0..element_count {
                    let off = i * self.value_size;
                    let bytes = &buf[off..off + self.value_size];
                    let current = Counter::from_bytes(bytes, self.value_kind, region.endianness);
                    let passed = match source {
                        ValueSource::PreviousSnapshot => true,
                        _ => evaluate(comparison, current, current, source, argument),
                    };
                    validity.set(i, passed);
                }
                if validity.popcount() > 0 {
                    self.pages.push(SearchPage::new(pos, self.value_size, region.endianness, buf, validity));
                }
                pos += window_len as u64;
            }
        }
        if self.pages.is_empty() {
            info!("value search first step found no candidates");
        } else {
            info!("value search first step produced {} pages", self.pages.len());
        }
        self.matches()
    }

    fn subsequent_step(
        &mut self,
        registry: &dyn MemoryRegistry,
        comparison: Comparison,
        source: ValueSource,
        argument: Option<Counter>,
    ) -> usize {
        let accessor = MemoryAccessor::new(registry);
        let mut surviving = Vec::with_capacity(self.pages.len());
        for mut page in std::mem::take(&mut self.pages) {
            let Some(region) = accessor.find_region(page.start) else {
                warn!("page at {:#x} lost its region, freeing", page.start);
                continue;
            };
            let mut scratch = vec![0u8; page.data.len()];
            if accessor.read_bulk(region, page.start, &mut scratch).is_err() {
                warn!("page at {:#x} became unreadable, freeing", page.start);
                continue;
            }
            for i in page.first_match..=page.last_match {
                if !page.validity.get(i) {
                    continue;
                }
                let off = i * self.value_size;
                let current = Counter::from_bytes(&scratch[off..off + self.value_size], self.value_kind, page.endianness);
                let previous = Counter::from_bytes(page.element_bytes(i), self.value_kind, page.endianness);
                if !evaluate(comparison, current, previous, source, argument) {
                    page.validity.set(i, false);
                }
            }
            if page.recompute_bounds() > 0 {
                page.commit(scratch);
                surviving.push(page);
            }
        }
        self.pages = surviving;
        self.matches()
    }

    fn first_step_ascii(&mut self, registry: &dyn MemoryRegistry, text: &[u8]) -> usize {
        self.pages.clear();
        let accessor = MemoryAccessor::new(registry);
        for region in registry.regions() {
            let mut pos = region.base_guest;
            while pos < region.end() {
                let window_len = self.page_size.min((region.end() - pos) as usize);
                let mut buf = vec![0u8; window_len];
                if accessor.read_bulk(region, pos, &mut buf).is_err() {
                    pos += window_len as u64;
                    continue;
                }
                let element_count = window_len / self.value_size;
                let mut validity = ValidityBitmap::new_all_clear(element_count);
                for i in 0..element_count {
                    let off = i * self.value_size;
                    let passed = off + text.len() <= buf.len() && &buf[off..off + text.len()] == text;
                    validity.set(i, passed);
                }
                if validity.popcount() > 0 {
                    self.pages.push(SearchPage::new(pos, self.value_size, region.endianness, buf, validity));
                }
                pos += window_len as u64;
            }
        }
        self.matches()
    }

    fn subsequent_step_ascii(&mut self, registry: &dyn MemoryRegistry, text: &[u8]) -> usize {
        let accessor = MemoryAccessor::new(registry);
        let mut surviving = Vec::with_capacity(self.pages.len());
        for mut page in std::mem::take(&mut self.pages) {
            let Some(region) = accessor.find_region(page.start) else {
                continue;
            };
            let mut scratch = vec![0u8; page.data.len()];
            if accessor.read_bulk(region, page.start, &mut scratch).is_err() {
                continue;
            }
            for i in page.first_match..=page.last_match {
                if !page.validity.get(i) {
                    continue;
                }
                let off = i * self.value_size;
                let passed = off + text.len() <= scratch.len() && &scratch[off..off + text.len()] == text;
                if !passed {
                    page.validity.set(i, false);
                }
            }
            if page.recompute_bounds() > 0 {
                page.commit(scratch);
                surviving.push(page);
            }
        }
        self.pages = surviving;
        self.matches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::{MockMemoryRegistry, MockRegion};
    use crate::memory::Endianness;

    fn region_with_dwords(values: &[u32]) -> MockMemoryRegistry {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x1000, 0x10, 4, Endianness::Little));
        for (i, v) in values.iter().enumerate() {
            r.write_u32(0x1000 + (i as u64) * 4, *v);
        }
        mem
    }

    #[test]
    fn first_step_greater_than_immediate() {
        let mem = region_with_dwords(&[1, 2, 3, 4]);
        let mut engine = ValueSearchEngine::new(4096);
        engine.reset(ValueKind::Int, 4).unwrap();
        let matches = engine.step_value(&mem, Comparison::Greater, ValueSource::ImmediateInt, Some(Counter::I32(2)));
        assert_eq!(matches, 2);
        let results = engine.iterate();
        let addrs: Vec<u64> = results.iter().map(|(a, _, _)| *a).collect();
        assert_eq!(addrs, vec![0x1008, 0x100C]);
    }

    #[test]
    fn not_equal_is_exact_even_when_floor_aware_equal_would_also_pass() {
        // Both Equal and NotEqual can be true at once for a fractional
        // current value against a whole-number argument: Equal compares
        // floor(3.5)==3, NotEqual compares 3.5!=3 exactly. NotEqual must
        // not be implemented as the negation of floor-aware equality.
        let current = Counter::F64(3.5);
        let arg = Counter::F64(3.0);
        assert!(current.equal_floor_aware(&arg));
        assert!(evaluate(
            Comparison::NotEqual,
            current,
            current,
            ValueSource::ImmediateFloat,
            Some(arg),
        ));
    }

    #[test]
    fn equal_previous_snapshot_survives_unchanged_values() {
        let mem = region_with_dwords(&[1, 2, 3, 4]);
        let mut engine = ValueSearchEngine::new(4096);
        engine.reset(ValueKind::Int, 4).unwrap();
        engine.step_value(&mem, Comparison::Equal, ValueSource::PreviousSnapshot, None);
        let matches = engine.step_value(&mem, Comparison::Equal, ValueSource::PreviousSnapshot, None);
        assert_eq!(matches, 4);
    }

    #[test]
    fn unqualified_decreased_tracks_drop() {
        let mem = region_with_dwords(&[1, 2, 3, 4]);
        let mut engine = ValueSearchEngine::new(4096);
        engine.reset(ValueKind::Int, 4).unwrap();
        engine.step_value(&mem, Comparison::Equal, ValueSource::PreviousSnapshot, None);
        // mutate: second element drops from 2 to 1
        mem_write(&mem, 0x1004, 1);
        let matches = engine.step_value(&mem, Comparison::Decreased, ValueSource::PreviousSnapshot, None);
        assert_eq!(matches, 1);
        let results = engine.iterate();
        assert_eq!(results[0].0, 0x1004);
        assert_eq!(results[0].1, Counter::I32(2));
        assert_eq!(results[0].2, Counter::I32(1));
    }

    fn mem_write(mem: &MockMemoryRegistry, addr: u64, value: u32) {
        use crate::memory::MemoryRegistry;
        let accessor = MemoryAccessor::new(mem);
        let region = accessor.find_region(addr).unwrap();
        accessor.write(Some(region), addr, 4, value as u64).unwrap();
    }

    #[test]
    fn ascii_step_finds_substring() {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x2000, 0x20, 4, Endianness::Little));
        r.write_bytes(0x2007, b"HELLO");
        let mut engine = ValueSearchEngine::new(4096);
        engine.reset(ValueKind::Int, 1).unwrap();
        let matches = engine.step_ascii(&mem, b"HELLO");
        assert_eq!(matches, 1);
        assert_eq!(engine.iterate()[0].0, 0x2007);
    }

    #[test]
    fn snapshot_window_reflects_live_memory_without_mutating_pages() {
        let mem = region_with_dwords(&[1, 2, 3, 4]);
        let mut engine = ValueSearchEngine::new(4096);
        engine.reset(ValueKind::Int, 4).unwrap();
        engine.step_value(&mem, Comparison::Greater, ValueSource::ImmediateInt, Some(Counter::I32(0)));
        assert_eq!(engine.matches(), 4);
        mem_write(&mem, 0x1000, 99);
        let window = engine.snapshot_window(&mem, 0, 2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0], (0x1000, Counter::I32(1), Counter::I32(99)));
        // a second call sees the same live value again; nothing was committed.
        let window_again = engine.snapshot_window(&mem, 0, 1);
        assert_eq!(window_again[0].2, Counter::I32(99));
        assert_eq!(engine.matches(), 4);
    }

    #[test]
    fn reset_rejects_invalid_float_width() {
        let mut engine = ValueSearchEngine::new(4096);
        assert!(engine.reset(ValueKind::Float, 1).is_err());
    }
}

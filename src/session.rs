//! Search Session facade (SPEC_FULL §4.F).
//!
//! Grounded on `search/engine/manager.rs`'s `SearchEngineManager` for the
//! facade/dispatch shape (configure, then step, then read results), but
//! without the teacher's `RwLock<SearchEngineManager>` global singleton or
//! async task spawning — SPEC_FULL §5/§9 mandate explicit per-call context
//! and no process-wide state.

use log::info;

use crate::counter::{Counter, ValueKind};
use crate::error::{Result, SearchEngineError};
use crate::memory::MemoryRegistry;
use crate::types::{Comparison, ValueSource};
use crate::value_search::ValueSearchEngine;

const DEFAULT_PAGE_SIZE: usize = 4096;

fn validate_page_size(page_size: usize, value_size: usize) -> Result<()> {
    if page_size == 0 || !page_size.is_power_of_two() {
        return Err(SearchEngineError::InvalidConfiguration(format!(
            "page_size must be a power of two, got {page_size}"
        )));
    }
    if page_size % value_size != 0 {
        return Err(SearchEngineError::InvalidConfiguration(format!(
            "page_size {page_size} must be a multiple of value_size {value_size}"
        )));
    }
    Ok(())
}

/// Owns the Value Search Engine plus the comparison/source configuration
/// the UI sets once and reuses across steps.
pub struct SearchSession {
    engine: ValueSearchEngine,
    comparison: Comparison,
    source: ValueSource,
    value_kind: ValueKind,
    value_size: usize,
    initialized: bool,
}

impl SearchSession {
    pub fn new() -> Self {
        SearchSession {
            engine: ValueSearchEngine::new(DEFAULT_PAGE_SIZE),
            comparison: Comparison::Equal,
            source: ValueSource::ImmediateInt,
            value_kind: ValueKind::Int,
            value_size: 4,
            initialized: false,
        }
    }

    /// Drops all pages and re-establishes the session's value kind/size
    /// (SPEC_FULL §4.D `reset`).
    pub fn reset(&mut self, value_kind: ValueKind, value_size: usize) -> Result<()> {
        self.engine.reset(value_kind, value_size)?;
        self.value_kind = value_kind;
        self.value_size = value_size;
        self.initialized = true;
        info!("search session reset: kind={value_kind:?}, size={value_size}");
        Ok(())
    }

    /// Sets the comparison/source/page_size the next `step_*` call will use
    /// (SPEC_FULL §4.F, §4.J). Validated eagerly; never mutates engine state
    /// on failure.
    pub fn configure(&mut self, comparison: Comparison, source: ValueSource, value_size: usize, page_size: usize) -> Result<()> {
        validate_page_size(page_size, value_size)?;
        self.comparison = comparison;
        self.source = source;
        self.engine = ValueSearchEngine::new(page_size);
        self.value_size = value_size;
        self.initialized = false;
        Ok(())
    }

    pub fn step_value(&mut self, registry: &dyn MemoryRegistry, value: Option<Counter>) -> Result<usize> {
        if !self.initialized {
            return Err(SearchEngineError::NotInitialized);
        }
        Ok(self.engine.step_value(registry, self.comparison, self.source, value))
    }

    pub fn step_ascii(&mut self, registry: &dyn MemoryRegistry, text: &[u8]) -> Result<usize> {
        if !self.initialized {
            return Err(SearchEngineError::NotInitialized);
        }
        Ok(self.engine.step_ascii(registry, text))
    }

    pub fn iterate(&self) -> Vec<(u64, Counter, Counter)> {
        self.engine.iterate()
    }

    /// Read-only viewport window (SPEC_FULL §4.G); see
    /// [`ValueSearchEngine::snapshot_window`].
    pub fn snapshot_window(&self, registry: &dyn MemoryRegistry, first_index: usize, count: usize) -> Vec<(u64, Counter, Counter)> {
        self.engine.snapshot_window(registry, first_index, count)
    }

    pub fn matches(&self) -> usize {
        self.engine.matches()
    }

    pub fn page_count(&self) -> usize {
        self.engine.page_count()
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

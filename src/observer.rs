//! Observer/Refresh API (SPEC_FULL §4.G).
//!
//! Grounded on `original_source/editor/cle_result_table_normal.cpp`'s
//! `rebuild()` (a capped, windowed repaint of the results table driven by a
//! UI timer) and `cle_result_table_pointer.cpp`'s per-row offset rendering,
//! which never mutate the underlying search state — only read it. This
//! module is a thin, stateless facade: the actual read-only logic lives on
//! [`crate::value_search::ValueSearchEngine::snapshot_window`] and
//! [`crate::pointer_search::PointerSearchEngine::resolve`]; these free
//! functions exist so a host can poll both engines through one call shape
//! without reaching into engine internals.

use crate::counter::Counter;
use crate::memory::MemoryRegistry;
use crate::pointer_search::{PointerResult, PointerSearchEngine};
use crate::session::SearchSession;

/// Viewport read for a value search result table: `count` rows starting at
/// `first_index` into the live match list, each re-read from current
/// memory. Never touches page state — safe to call on a timer between
/// steps (SPEC_FULL §4.G).
pub fn snapshot_window(
    session: &SearchSession,
    registry: &dyn MemoryRegistry,
    first_index: usize,
    count: usize,
) -> Vec<(u64, Counter, Counter)> {
    session.snapshot_window(registry, first_index, count)
}

/// Resolves one pointer-search result's current address without mutating
/// the engine's result set, so a UI can redraw a single row (or repaint on
/// a timer) without forcing a full `update()` pass over every result.
pub fn resolve_pointer_chain(engine: &PointerSearchEngine, registry: &dyn MemoryRegistry, result: &PointerResult) -> Option<u64> {
    engine.resolve(registry, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::ValueKind;
    use crate::memory::testing::{MockMemoryRegistry, MockRegion};
    use crate::memory::Endianness;
    use crate::types::{Comparison, ValueSource};

    #[test]
    fn snapshot_window_matches_session_passthrough() {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x1000, 0x10, 4, Endianness::Little));
        for (i, v) in [5u32, 6, 7, 8].iter().enumerate() {
            r.write_u32(0x1000 + (i as u64) * 4, *v);
        }
        let mut session = SearchSession::new();
        session.configure(Comparison::Greater, ValueSource::ImmediateInt, 4, 4096).unwrap();
        session.reset(ValueKind::Int, 4).unwrap();
        session.step_value(&mem, Some(Counter::I32(0))).unwrap();
        let window = snapshot_window(&session, &mem, 1, 2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].0, 0x1004);
    }

    #[test]
    fn resolve_pointer_chain_tracks_moved_target() {
        let mut mem = MockMemoryRegistry::new();
        let r = mem.add_region(MockRegion::new(0x1000, 0x40, 4, Endianness::Little));
        r.write_u32(0x1008, 0x1234);
        r.write_u32(0x1020, 0x1004);
        let engine = PointerSearchEngine::init(&mem, 0x1008, ValueKind::Int, 4, 1, 0x10, 16).unwrap();
        let result = &engine.results()[0];
        let resolved = resolve_pointer_chain(&engine, &mem, result);
        assert_eq!(resolved, Some(0x1008));
    }
}

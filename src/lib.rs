//! Live memory-inspection engine for an emulated guest process: a Value
//! Search Engine (paged incremental memory scan with a per-element validity
//! bitmap) and a Pointer Search Engine (multi-pass pointer-chain
//! discovery), fronted by a Search Session facade and a read-only
//! Observer/Refresh API.
//!
//! # Architecture
//!
//! - `counter`: typed value representation and comparison primitives
//! - `bitmap`: packed per-element validity tracking
//! - `memory`: the Memory Region Accessor and the `MemoryRegistry` the host
//!   implements
//! - `types`: shared `Comparison`/`ValueSource` configuration enums
//! - `error`: the surfaced `SearchEngineError` taxonomy
//! - `value_search`: the Value Search Engine and its pages
//! - `pointer_search`: the Pointer Search Engine and its results
//! - `session`: the Search Session facade
//! - `observer`: the Observer/Refresh API

pub mod bitmap;
pub mod counter;
pub mod error;
pub mod memory;
pub mod observer;
pub mod pointer_search;
pub mod session;
pub mod types;
pub mod value_search;

pub use bitmap::ValidityBitmap;
pub use counter::{Counter, ValueKind};
pub use error::{Result, SearchEngineError};
pub use memory::{Endianness, MemoryAccessor, MemoryRegistry, Region};
pub use pointer_search::{PointerResult, PointerSearchEngine};
pub use session::SearchSession;
pub use types::{Comparison, ValueSource};
pub use value_search::{SearchPage, ValueSearchEngine};

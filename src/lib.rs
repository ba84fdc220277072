pub mod core;
pub mod schema;
pub mod memory;
pub mod storage;
pub mod parallel;
pub mod collection;
pub mod rowset;

pub use crate::collection::row_collection::RowCollection;
pub use crate::collection::uniq::{DedupOutcome, DuplicateReport};
pub use crate::core::config::{CollectionConfig, CollectionEnv, ExecutorConfig};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::stats::CollectionStats;
pub use crate::memory::oracle::{MemoryOracle, MemoryTracker, SystemMemory, Unbounded};
pub use crate::parallel::executor::SortExecutor;
pub use crate::rowset::iter::{KeyIter, RowIter};
pub use crate::rowset::row_set::RowSet;
pub use crate::rowset::shared::SharedRowSet;
pub use crate::schema::column::{Column, ColumnEncoding};
pub use crate::schema::order::{Base64Order, ByteOrder, NaturalOrder};
pub use crate::schema::row::{Entry, RowSchema};

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                              ROWDEX ARCHITECTURE                             │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── SCHEMA LAYER ────────────────────────────────┐
│  ┌────────────────────────┐  ┌──────────────────────┐  ┌──────────────────┐  │
│  │ struct RowSchema       │  │ trait ByteOrder      │  │ struct Entry     │  │
│  │ • columns: Vec<Column> │  │ • compare()          │  │ • schema: Arc<>  │  │
│  │ • record_width         │  │ • signature()        │  │ • bytes: Vec<u8> │  │
│  │ • primary_key          │  │ • compile_key()      │  │ • key()          │  │
│  │ • order: Arc<dyn>      │  │ NaturalOrder "nd"    │  │ • cardinal()     │  │
│  └────────────────────────┘  │ Base64Order  "b6"    │  └──────────────────┘  │
│                              └──────────────────────┘                        │
└──────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────── COLLECTION LAYER ──────────────────────────────┐
│  ┌──────────────────────────────────┐   ┌─────────────────────────────────┐  │
│  │ struct RowCollection             │   │ struct RowSet                   │  │
│  │ • arena: RecordArena             │   │ • rows: RowCollection           │  │
│  │ • count / sort_bound             │   │ • find() / get() / put()        │  │
│  │ • env: CollectionEnv             │   │ • remove() / delete_all()       │  │
│  │ • append() / set() / remove_at() │   │ • merge() -> RowSet             │  │
│  │ • sort() / dedup_in_place()      │   │ • rows() / keys() iterators     │  │
│  │ • export() / import_from()       │   └─────────────────────────────────┘  │
│  └──────────────────────────────────┘   SharedRowSet = Arc<RwLock<RowSet>>   │
└──────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────── RESOURCE LAYER ────────────────────────────────┐
│  ┌────────────────────────┐  ┌──────────────────────┐  ┌──────────────────┐  │
│  │ struct SortExecutor    │  │ trait MemoryOracle   │  │ CollectionConfig │  │
│  │ • pool: rayon pool     │  │ • available()        │  │ • grow_factor    │  │
│  │ • run() / shutdown()   │  │ • under_pressure()   │  │ • isort_limit    │  │
│  └────────────────────────┘  │ Unbounded            │  │ • *_threshold    │  │
│                              │ MemoryTracker        │  │ • resort_limit   │  │
│                              │ SystemMemory         │  │ • dedup_budget   │  │
│                              └──────────────────────┘  └──────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────┘

  RowSet ──derefs──> RowCollection ──owns──> RecordArena
     │                     │
     │                     ├──sorts_with──> quicksort ──fans_out──> SortExecutor
     │                     └──asks──> MemoryOracle before growing
     └──merges──> RowSet (two-cursor union, append fast path)
*/

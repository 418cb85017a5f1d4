//! Safety-rule knowledge corpus and semantic retrieval index.
//!
//! Three layers, lowest first:
//!
//! - [`corpus`]: parse the normalized line-delimited rule corpus into
//!   [`RuleUnit`]s, plus the one-shot importer that extracts rule records
//!   from a free-form source file and dedups them.
//! - [`embed`]: a deterministic, CPU-only text embedder producing
//!   L2-normalized vectors, so similarity search is a plain dot-product
//!   ranking. The embedder id is pinned into every persisted collection;
//!   mixing embedders between build and query is an error, never a silent
//!   quality loss.
//! - [`store`]: the persisted vector collection. Rebuild is full-replace
//!   and atomic (tmp file + rename + handle swap); search is top-k ANN with
//!   exact re-scoring so ordering is deterministic for a fixed collection.

pub mod corpus;
pub mod embed;
pub mod store;

pub use corpus::{import_raw, load_jsonl, write_jsonl, CorpusError, RawRule, RuleUnit};
pub use embed::{Embedder, TokenHashEmbedder};
pub use store::{CollectionStatus, IndexError, RetrievedRule, RuleIndex};

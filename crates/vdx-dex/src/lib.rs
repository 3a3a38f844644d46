//! vdx-dex
//!
//! Pure DEX (Data Exchange) document core: tokenizer, key-value extractor,
//! group formatter and summary builder.
//!
//! DEX is the asterisk-delimited EDI-style text format vending machines use
//! to report sales, cash and diagnostic data. This crate turns a raw DEX
//! blob into a flat string-keyed map plus derived groups and a summary.
//! Everything here is deterministic, synchronous and total: malformed input
//! degrades to fewer keys, never to an error. Upstream DEX data is
//! inconsistently formatted and partial data beats hard failure.
//!
//! No IO, no DB, no clock. Reconciliation of fault histories lives in
//! `vdx-reconcile`; this crate only decodes.

pub mod extract;
pub mod groups;
pub mod segment;

pub use extract::{extract, KeyValueMap};
pub use groups::{format_groups, summarize, KeyValueGroups, Summary};
pub use segment::{tokenize, Segment};

//! Pairing and listing pipeline: enumerates source/destination
//! bucket inventories, aligns them into `To`/`From`/`With` pair records,
//! and runs the listing producer for each pair, feeding the bounded task
//! queue in `taskqueue`.

pub mod diff;
pub mod listing;
pub mod plan;
pub mod producer;

pub use plan::{compute_pairing, BucketInfo};
pub use producer::run_pair;

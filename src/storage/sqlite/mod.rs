//! Shared `SQLite` infrastructure.
//!
//! - [`connection`]: mutex poison recovery, pragmas, transactions
//! - [`sql`]: JSON-path query generation
//! - [`metrics`]: per-operation counters and latency histograms

mod connection;
mod metrics;
mod sql;

pub use connection::{acquire_lock, configure_connection, open_connection, with_transaction};
pub use metrics::{record_operation_metrics, timed};
pub use sql::{QueryClause, build_query_clause};

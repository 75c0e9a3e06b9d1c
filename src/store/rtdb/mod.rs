//! REST adapter for a real-time-database style document tree: `PUT`/`GET`/
//! `PATCH` on `.json` paths plus a server-sent-event feed per subscribed
//! document.

mod config;
mod error;
mod store;

pub use config::RtdbConfig;
pub use error::{RtdbError, RtdbResult};
pub use store::RtdbStore;

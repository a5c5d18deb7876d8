//! HTTP front end for px-kvstore
//!
//! `http` exposes any `KvStore` over a small JSON API; `config` holds the
//! command line and topology file handling used by the `px-kvstore` binary.

pub mod config;
pub mod http;

pub use config::{load_topology, Args};
pub use http::{build_router, ApiError};

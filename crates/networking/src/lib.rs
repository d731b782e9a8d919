//! Networking utilities for Quran Reader
//!
//! This crate provides the connectivity oracle the sync engine consults
//! before touching the network.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connectivity;

pub use connectivity::{Connectivity, NetworkMonitor, NetworkState};

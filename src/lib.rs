//! State synchronization core for an EDST flight-strip workstation: the entry
//! refresh/derivation pipeline and the shared UI event protocol between peer
//! workstations on the same sector.

pub mod aar;
pub mod config;
pub mod derive;
pub mod filters;
pub mod geo;
pub mod logging;
pub mod model;
pub mod net;
pub mod peer;
pub mod plans;
pub mod refresh;
pub mod runtime;
pub mod sectors;
pub mod shared;
pub mod storage;
pub mod store;
pub mod windows;

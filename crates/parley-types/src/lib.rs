//! Wire and domain types shared by the Parley crates.

pub mod api;
pub mod events;
pub mod models;

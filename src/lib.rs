/// SoloDM - Solo D&D 5e Campaign Companion (Core Edition)
///
/// Core library providing the campaign save-data store: manifest-indexed
/// JSON persistence for characters, companions, enemies, NPCs, encounters,
/// world-state snapshots, and an append-only change log.

pub mod config;
pub mod core;

#[cfg(test)]
mod tests;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

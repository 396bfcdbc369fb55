//! Persistence implementations

pub mod settings_store;

pub use settings_store::{JsonFileSettingsStore, MemorySettingsStore};

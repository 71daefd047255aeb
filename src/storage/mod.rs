//! Storage module: register file and simulated RAM placement.

pub mod controller;

pub use controller::{RegisterSlot, StorageController};

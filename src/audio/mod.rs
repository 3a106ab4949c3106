#[cfg(feature = "device")]
pub mod device;
pub mod effects;
pub mod engine;
pub mod graph;
pub mod host;
pub mod presets;

pub mod snapshot;
pub mod story;
pub mod tags;

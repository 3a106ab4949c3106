pub mod config;
pub mod history;
pub mod input;
pub mod player;
pub mod renderer;
pub mod scheduler;
pub mod storage;
pub mod typewriter;

pub mod config;
pub mod logging;

pub mod control;
pub mod download;
pub mod job;
pub mod renderer;
pub mod retry;
pub mod scheduler;
pub mod script;
pub mod store;
pub mod timeline;

pub mod api;
pub mod app;
pub mod automation;
pub mod config;
pub mod render;
pub mod shared;
pub mod tui;

pub mod app;
pub mod config;
pub mod error;
pub mod gateway;
pub mod relative_time;
pub mod router;
pub mod session;
pub mod song;
pub mod storage;
pub mod text_box;
pub mod theme;
pub mod tui;
pub mod views;

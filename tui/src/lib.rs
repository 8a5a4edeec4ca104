//! Manual TUI - Terminal interface for the vehicle manual QA service
//!
//! This crate is a thin surface over `manual-conductor`: it turns key presses
//! into `SurfaceEvent`s and draws whatever the Conductor reports back.
//!
//! # Architecture
//!
//! - **App**: event loop, vehicle picker, chat view, input line
//! - **ConductorClient**: embedded Conductor plus its message channel
//! - **DisplayState**: everything the screen shows, rebuilt from messages
//! - **Widgets**: answer markup layout and a bottom-anchored chat log
//! - **Config**: TOML file, environment and CLI settings

pub mod app;
pub mod conductor_client;
pub mod config;
pub mod display;
pub mod theme;
pub mod widgets;

pub use app::App;
pub use conductor_client::ConductorClient;
pub use display::DisplayState;

//! # tomatempo
//!
//! Application foundation for the tomatempo timer: layered settings and a
//! non-blocking structured logging pipeline.
//!
//! ## Modules
//!
//! - [`settings`]: resolves [`settings::Settings`] from explicit overrides,
//!   `APP_*` environment variables, a `.env` file and defaults, and manages
//!   the platform cache/log/config directories
//! - [`logging`]: JSON and plain-text formatting, severity routing and the
//!   queue + background listener that performs all log I/O
//! - [`constants`]: application-wide names and defaults

pub mod constants;
pub mod logging;
pub mod settings;

//! # led_dimmerd
//!
//! A Linux daemon that scales the brightness of an RGB LED down while the
//! ambient light level is below a threshold.
//!
//! ## Architecture
//!
//! - [`DimmingController`](dimming::DimmingController) decides the scaling and writes it to every channel
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) owns services and the main loop
//! - [`EventBus`](event::EventBus) carries sensor readings and config changes between services
//! - [`AppState`](app_context::AppState) is the state shared by all services
//!
//! Readings arrive over D-Bus; the LED channels are sysfs attributes.
//!
//! ## Example
//!
//! ```no_run
//! use led_dimmerd::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod channel;
pub mod channel_writer;
pub mod config;
pub mod coordinator;
pub mod dimming;
pub mod drivers;
pub mod error;
pub mod event;
pub mod interface;
pub mod providers;
pub mod scaling;
pub mod sensors;
pub mod task_manager;

//! Dependency injection providers for service management.
//!
//! Each service of the daemon is started by a provider sharing the same
//! [`AppState`](crate::app_context::AppState) and event bus.

pub mod app_state;
pub mod config_watcher;
pub mod dbus;
pub mod dimming;
pub mod traits;

pub use app_state::AppStateProvider;
pub use config_watcher::ConfigWatcherServiceProvider;
pub use dbus::DBusServiceProvider;
pub use dimming::DimmingServiceProvider;
pub use traits::{AsyncProvider, ServiceProvider};

pub mod api;
pub mod cache;
pub mod config;
pub mod constants;
pub mod desktop;
pub mod models;
pub mod persist;
pub mod runtime;
pub mod search;
pub mod secure_storage;
pub mod store;
pub mod sweeper;
pub mod tracing_setup;
pub mod validation;
pub mod views;

pub use config::CoreConfig;
pub use runtime::CoreRuntime;
pub use store::{NotificationStore, PropertyStore, StoreError, UiStore};

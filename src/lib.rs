pub mod api;
pub mod config;
pub mod control;
pub mod dashboard;
pub mod error_surface;
pub mod models;
pub mod poller;
pub mod reconciler;
pub mod store;
pub mod view_state;

pub use dashboard::Dashboard;

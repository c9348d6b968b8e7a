//! Real-time metrics synchronization client: streaming session, auth gate,
//! bounded history and render-ready downsampling.

pub mod api;
pub mod app;
pub mod auth;
pub mod client;
pub mod connection;
pub mod downsample;
pub mod error;
pub mod format;
pub mod history;
pub mod profiles;
pub mod router;
pub mod settings;
pub mod store;
pub mod types;
pub mod ws;

pub use client::{ClientEvent, ClientHandle, MetricsClient};
pub use settings::ClientSettings;

//! Gateway from sensor channels to personal health record uploads.
//!
//! This crate provides a service that:
//! - Reads named samples from a line-oriented source onto the channel bus
//! - Renders each known channel's sample into a typed record body
//! - Uploads the records for the selected person through a signed session
//! - Drops unknown channels and malformed values before any request is made
//!
//! # Channels
//!
//! - `oximeter.spo2` - blood oxygen saturation
//! - `oximeter.pulse` - heart rate
//! - `scale.weight` - weight
//! - `thermometer.temperature` - body temperature (vital signs)
//! - `glucometer.glucose` - blood glucose
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/hvgate/gateway.toml`:
//!
//! ```toml
//! [service]
//! host = "platform.healthvault-ppe.com"
//! master_app_id = "11111111-2222-3333-4444-555555555555"
//! credentials_path = "~/.local/share/hvgate/app-instance"
//! request_timeout_secs = 20
//! person = "0"
//!
//! [bridge]
//! queue_capacity = 64
//! upload_retries = 2
//! channels = ["oximeter.spo2", "oximeter.pulse"]
//! ```

pub mod bridge;
pub mod config;
pub mod pipeline;
pub mod source;
pub mod templates;
pub mod uploader;

pub use bridge::{Bridge, BridgeStats, Dispatch, StatsSnapshot};
pub use config::{BridgeConfig, Config, ConfigError, ServiceConfig, ValidationError};
pub use pipeline::Pipeline;
pub use source::{SourceError, parse_line, spawn_line_source};
pub use templates::{ChannelSpec, ChannelTable, RenderError};
pub use uploader::Uploader;

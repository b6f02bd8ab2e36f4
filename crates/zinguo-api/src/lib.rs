// zinguo-api: Async Rust client for the Zinguo cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod session;
pub mod transport;

pub use auth::{Authenticated, Credentials};
pub use client::ZinguoClient;
pub use error::Error;
pub use models::{DeviceSummary, RawDeviceRecord};
pub use session::{DEFAULT_ENDPOINTS, SessionManager};
pub use transport::{TlsMode, TransportConfig};

pub mod ansi;
pub mod auth;
pub mod client;
pub mod config;
pub mod default_client;
pub mod error;
pub mod interactive;
pub mod lines;
pub mod stream;

pub use auth::Session;
pub use auth::SessionGuard;
pub use client::BackendClient;
pub use config::Config;
pub use error::OpsdeckErr;
pub use error::Result;
pub use lines::LineKind;
pub use lines::OutputLine;
pub use stream::StreamController;
pub use stream::StreamState;
pub use stream::StreamUpdate;

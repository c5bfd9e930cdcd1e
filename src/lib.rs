pub mod config;
pub mod error;
pub mod relay;
pub mod team;

pub use config::AppConfig;
pub use error::{RelayError, RelayResult};
pub use relay::SecretRelay;
pub use team::{RegisteredTeam, Team};

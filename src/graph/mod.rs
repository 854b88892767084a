mod auth;
mod client;
pub mod types;

pub use auth::{ClientCredentialsAuth, StaticToken, TokenProvider};
pub use client::GraphClient;

use serde::{Deserialize, Serialize};

/// Identifies a document library: the site it lives in and its drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriveContext {
    pub site_id: String,
    pub drive_id: String,
}

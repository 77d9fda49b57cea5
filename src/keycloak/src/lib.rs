//! # Rolemerge Keycloak Backend
//!
//! [`RoleBackend`](rolemerge_reconcile::RoleBackend) over the Keycloak admin
//! REST API. Authentication uses OpenID discovery and the profile's grant;
//! the token is refreshed in the background for the life of the client.
//!
//! ```no_run
//! use rolemerge_keycloak::{ConnectionSettings, Grant, KeycloakClient};
//!
//! # async fn example() -> rolemerge_keycloak::Result<()> {
//! let settings = ConnectionSettings::new(
//!     "http://localhost:8080",
//!     "demo",
//!     Grant::password("admin-cli", "admin", "admin"),
//! );
//! let client = KeycloakClient::connect(&settings).await?;
//! // ... reconcile ...
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod settings;
pub mod token;

pub use client::KeycloakClient;
pub use error::{KeycloakError, Result};
pub use settings::{ConnectionSettings, Grant};
pub use token::{Credentials, OidcClient, TokenResponse, TokenSet};

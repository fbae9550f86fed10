//! # cnops-client
//!
//! HTTP client for the CloudNetOps console API.
//!
//! Every request carries the bearer token of an explicit [`Session`] handed
//! to the client at construction time. Responses are returned as raw JSON;
//! shape validation happens in the console engine, which decodes each body
//! against the schemas in `cnops-types`.
//!
//! The [`Transport`] trait is the seam the engine polls through, so the
//! engine can be driven by in-memory transports in tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cnops_client::{ApiClient, Transport};
//! use cnops_types::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let anonymous = ApiClient::builder()
//!         .endpoint("http://localhost:5000")
//!         .build()?;
//!
//!     let session = anonymous
//!         .login(&Credentials {
//!             email: "ops@example.com".to_string(),
//!             password: "secret".to_string(),
//!         })
//!         .await?;
//!
//!     let client = anonymous.with_session(session);
//!     let instances = client.get("/monitor/ec2/list").await?;
//!     println!("{instances}");
//!     Ok(())
//! }
//! ```

mod client;
pub mod error;
mod session;
mod transport;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::ClientError;
pub use session::Session;
pub use transport::Transport;

//! fast-azure-storage: a client for Azure Storage's Queue and Table
//! services.
//!
//! The interesting part of this crate is not the façade methods in
//! [`queue`] and [`table`] but the request pipeline underneath them:
//! Shared Key/SAS authorization ([`auth`]), a keep-alive connection pool
//! tuned for Azure's load balancer ([`pool`]), an exponential-backoff retry
//! engine ([`retry`]), and a tolerant XML/JSON response decoder
//! ([`decode`]).
//!
//! # Example
//!
//! ```no_run
//! use fast_azure_storage::{ClientOptions, Credentials, Pool, QueueClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fast_azure_storage::Error> {
//!     let key = fast_azure_storage::auth::shared_key::decode_key("base64key==")?;
//!     let options = ClientOptions::builder(Credentials::SharedKey {
//!         account: "jungle".to_string(),
//!         key,
//!     })
//!     .build()?;
//!     let client = QueueClient::new(options, Pool::with_defaults());
//!     let result = client.list_queues(None, None, None).await?;
//!     println!("{} queues", result.queues.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod date;
pub mod decode;
pub mod error;
pub mod pool;
pub mod queue;
pub mod request;
pub mod retry;
pub mod sas_gen;
pub mod table;
pub mod transport;

pub use config::{ClientOptions, ClientOptionsBuilder, Credentials, MetadataLevel, SasProducer};
pub use error::{Error, Result};
pub use pool::Pool;
pub use queue::QueueClient;
pub use table::TableClient;

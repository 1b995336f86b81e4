//! Resilient HTTP client layer for the Bayline shop console API.
//!
//! Every request the console makes goes through one [`ShopClient`], which
//! layers on top of a plain [`Transport`]:
//!
//! - **Response cache**: GET payloads are kept for a TTL (five minutes by
//!   default) and expired lazily.
//! - **Request de-duplication**: concurrent reads of the same key share one
//!   network call and one outcome.
//! - **Offline mutation queue**: writes that cannot reach the server are kept
//!   in order and replayed when connectivity returns.
//! - **Auth interceptor**: attaches the bearer credential, classifies every
//!   failure, and ends the session once when the credential is rejected.
//!
//! # Example
//!
//! ```no_run
//! use bayline_client::{LoginRequest, MutationOutcome, ShopClient};
//! use serde_json::json;
//!
//! # async fn example() -> bayline_client::Result<()> {
//! let client = ShopClient::builder()
//!     .base_url("http://localhost:5000")
//!     .build()?;
//!
//! client
//!     .auth()
//!     .login(&LoginRequest::new("tech@shop.example", "secret"))
//!     .await?;
//!
//! // Served from cache on the second call.
//! let customers = client.customers().list(&[]).await?;
//! println!("{}", customers);
//!
//! match client.jobs().create(&json!({"title": "Brake inspection"})).await? {
//!     MutationOutcome::Completed(job) => println!("created {}", job),
//!     MutationOutcome::Queued(receipt) => println!("queued as #{}", receipt.id),
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod classify;
pub mod client;
pub mod dedup;
pub mod error;
pub mod interceptor;
pub mod queue;
pub mod session;
pub mod transport;
pub mod types;

pub use cache::{CacheStats, DEFAULT_CACHE_TTL, ResponseCache};
pub use classify::{ApiResult, ClassifiedError, ErrorKind, Failure, classify};
pub use client::{
    ClientBuilder, Fetched, MutationOutcome, Outcome, RequestOptions, ShopClient, cache_key,
};
pub use dedup::RequestDeduplicator;
pub use error::{Error, Result};
pub use interceptor::AuthInterceptor;
pub use queue::{
    Backoff, DrainReport, MutationQueue, QueueState, QueuedMutation, QueuedReceipt, ReplayPolicy,
};
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionCredential, SessionEvent, SessionStore,
    TerminationReason,
};
pub use transport::{
    Body, FilePart, HttpRequest, HttpResponse, RequestClass, ReqwestTransport, Timeouts,
    Transport, TransportError, TransportErrorKind,
};
pub use types::*;

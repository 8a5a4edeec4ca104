//! Manual QA Backend Integration
//!
//! Access to the manual question-answering service through a common trait, so
//! the Conductor can be driven against the real HTTP backend or a test double.
//!
//! # Available Backends
//!
//! - **HTTP**: the QA service's JSON API (default)
//!
//! # Usage
//!
//! ```ignore
//! use manual_conductor::backend::{ApiConfig, AskRequest, HttpManualApi, ManualApi, QueryEvent};
//!
//! let api = HttpManualApi::new(ApiConfig::new("http://localhost:8000"))?;
//! let mut rx = api.ask(AskRequest::new("엔진오일 교환 주기는?", "SONATA"));
//! while let Some(event) = rx.recv().await {
//!     if let QueryEvent::Completed(result) = event {
//!         println!("{:?}", result);
//!     }
//! }
//! ```

mod http;
mod traits;

pub use http::HttpManualApi;
pub use traits::{
    ApiConfig, AskRequest, AskResponse, HealthReport, ManualApi, QueryEvent, DEFAULT_BASE_URL,
};

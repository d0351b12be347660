//! Data platform adapters for DataOps Copilot.
//!
//! [`PlatformClient`] talks to the platform's REST API, [`PlatformTools`]
//! exposes it to the orchestrator as registry tools, and [`QueryService`]
//! drives query jobs through the bounded job poller.

pub mod error;
pub mod platform;
pub mod query;
pub mod tools;

pub use error::{AdapterError, Result};
pub use platform::{PlatformClient, PlatformClientConfig};
pub use query::{QueryService, QuerySpec};
pub use tools::PlatformTools;

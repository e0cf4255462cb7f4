//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → dispatcher.rs (snapshot: match API → routing override → select server)
//!     → node.rs (one DispatchNode per API node, holds an in-flight slot)
//!     → filter.rs pre (circuit breaker gate)
//!     → backend call (http)
//!     → filter.rs post / post_err (analysis, breaker transitions)
//!
//! Configuration sync:
//!     event.rs (ChangeEvent) → Dispatcher::apply / apply_all / reload
//!     → TableWriter on a draft → publish snapshot
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod filter;
pub mod node;

pub use context::RequestContext;
pub use dispatcher::{Dispatcher, RouteTable, TableWriter};
pub use error::{GatewayError, SyncError};
pub use event::ChangeEvent;
pub use filter::{AnalysisFilter, Filter, FilterChain, FilterContext};
pub use node::DispatchNode;

//! HCS Core
//!
//! Provisioning lifecycle engine for HuaweiCloudStack resources: REST
//! invocation, request bodies, response flattening, state polling, prepaid
//! order waiting, and the create/read/update/delete orchestration on top.

pub mod body;
pub mod differ;
pub mod error;
pub mod flatten;
pub mod invoker;
pub mod lifecycle;
pub mod order;
pub mod poller;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod tags;

pub use error::{LifecycleError, LifecycleResult};
pub use lifecycle::{KindDefinition, Lifecycle, Timeouts};
pub use provider::{Provider, ProviderError, ProviderResult, ResourceKind};

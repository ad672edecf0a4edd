// Application layer - use cases and orchestration

pub mod bill_service;
pub mod error;
pub mod group_service;
pub mod locks;
pub mod reconciliation;
pub mod scheduler;
pub mod service;

pub use bill_service::*;
pub use error::*;
pub use group_service::*;
pub use locks::*;
pub use reconciliation::*;
pub use scheduler::*;
pub use service::*;

pub mod assemble;
pub mod classify;
pub mod merge;
pub mod registry;
pub mod service;
pub mod store;

pub use assemble::ProfileAssembler;
pub use classify::{classify, project_reserved, Classified};
pub use merge::reconcile;
pub use registry::TenantRegistry;
pub use service::HubService;
pub use store::{MemoryProfileStore, ProfileStore};

// ABOUTME: Validated identifiers used across the engine and the state store.
// ABOUTME: Resource ids, resource type tags, and scope ids reject malformed input at construction.

mod resource_id;
mod resource_type;
mod scope_id;

pub use resource_id::{ResourceId, ResourceIdError};
pub use resource_type::{ResourceType, ResourceTypeError};
pub use scope_id::{ScopeId, ScopeIdError};

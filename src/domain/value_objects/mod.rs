pub mod entity_id;
pub mod entity_type;
pub mod http_method;
pub mod mutation_kind;
pub mod optimistic_update_id;
pub mod payload;
pub mod queued_action_id;
pub mod update_status;

pub use entity_id::EntityId;
pub use entity_type::EntityType;
pub use http_method::HttpMethod;
pub use mutation_kind::MutationKind;
pub use optimistic_update_id::OptimisticUpdateId;
pub use payload::OfflinePayload;
pub use queued_action_id::QueuedActionId;
pub use update_status::UpdateStatus;

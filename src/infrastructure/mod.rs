pub mod artifact_store;
pub mod cache;
pub mod event_bus;
pub mod http_client_factory;
pub mod llm;
pub mod market_data;
pub mod news;
pub mod observability;

pub use artifact_store::JsonArtifactStore;
pub use cache::TtlCache;
pub use event_bus::{BroadcastListener, EventBus};
pub use llm::OpenAiCompatibleClient;

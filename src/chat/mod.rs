pub mod cache;

pub use cache::{CacheKey, FetchTicket, MessageCache, MessageList, MutationPhase, SendMutation};

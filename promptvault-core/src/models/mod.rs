pub mod conversation;
pub mod message;
pub mod rating;
pub mod stats;

pub use conversation::{Conversation, ConversationSummary};
pub use message::{Message, MessageType, NewMessage, ToolCall};
pub use rating::{Rating, RatingStats, RatingTarget, MAX_RATING, MIN_RATING};
pub use stats::{CascadeReport, CounterReconciliation, StoreStats};

pub mod event;
pub mod ids;
pub mod task;
pub mod user;

pub use event::{now_millis, ChatMessage, EventKind, TaskEvent};
pub use ids::{SessionId, TaskId, UserId};
pub use task::{Task, TaskFilter, TaskPriority, TaskStats};
pub use user::{Identity, User};

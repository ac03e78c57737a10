pub mod conversation;
pub mod preset;
pub mod turn;

pub use conversation::Conversation;
pub use preset::Preset;
pub use turn::{Role, Turn};

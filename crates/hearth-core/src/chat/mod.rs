//! The chat pipeline: prompt composition, context assembly and the streaming
//! relay to the inference backend.

pub mod assembler;
pub mod composer;
pub mod relay;

pub use assembler::{AssembleRequest, AssembledContext, assemble, conversation_title};
pub use composer::{SEGMENT_SEPARATOR, compose};
pub use relay::{InferenceRelay, RelayEvent, RelayOutcome, RelayState};

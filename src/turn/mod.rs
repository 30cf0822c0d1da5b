//! Turn taking: the per-frame capture state machine and the session
//! orchestrator that drives it against the live microphone.

mod machine;
mod session;

pub use machine::{AbortReason, TurnMachine, Verdict};
pub use session::{RecordingResult, capture_turn, run_chat_loop};

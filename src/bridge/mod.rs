//! # Bridge Module
//!
//! The per-call machinery that joins one telephony media-stream connection
//! to one model realtime connection:
//!
//! - **Messages**: typed wire formats for both peers
//! - **Session**: the pure state machine sequencing both directions
//! - **Model**: the outbound realtime socket task
//!
//! The telephony-side WebSocket actor lives in `src/websocket.rs` at the
//! crate root and drives everything here.

pub mod messages; // Wire formats for both peers
pub mod model; // Model-side realtime socket client
pub mod session; // Per-call state machine

//! Agent subprocess output handling.
//!
//! - `codec`: NDJSON line framing with a per-line size cap.
//! - `event`: parsing of `stream-json` lines into [`StreamEvent`](event::StreamEvent)s.
//! - `classifier`: splitting a turn's events into user-facing and context channels.

pub mod classifier;
pub mod codec;
pub mod event;

pub use classifier::{classify, TurnBuilder};
pub use event::{parse_line, StreamEvent};

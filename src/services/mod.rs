//! Session-engine components used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Each module owns one concern: the store owns session records, presence
//! owns room membership, the room broadcaster fans events out, the document
//! synchronizer turns client intents into canonical mutations, the clock
//! answers sync requests, and the sweeper retires lapsed guest sessions.

pub mod clock;
pub mod document;
pub mod presence;
pub mod room;
pub mod store;
pub mod sweeper;

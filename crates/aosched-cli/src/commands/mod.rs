//! Subcommand implementations. Each `execute` builds its objects and timers
//! on the caller's scheduler, then runs the scheduler until it goes quiet.

pub mod messaging;
pub mod read;
pub mod thread;
pub mod timers;

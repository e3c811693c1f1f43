// Command implementations

pub mod inspect;
pub mod state;
pub mod watch;

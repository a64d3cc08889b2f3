pub mod attendance;
pub mod instance;
pub mod recurrence;
pub mod session;

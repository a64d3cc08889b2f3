pub mod autocreate;
pub mod clock;
pub mod location;
pub mod log;
pub mod recurrence;
pub mod scheduler;
pub mod window;

pub mod program;
pub mod progress;
pub mod step;
pub mod user;

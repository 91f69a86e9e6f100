pub mod actor;
pub mod event;
pub mod interact;
pub mod interpreter;
pub mod level;
pub mod session;
pub mod step;
pub mod world;

pub mod animator;
pub mod input;
pub mod renderer;
pub mod sound;

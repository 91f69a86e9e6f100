pub mod entity;
pub mod grid;
pub mod program;
pub mod rules;

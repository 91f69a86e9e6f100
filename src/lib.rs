//! Block Runner: a block-program grid puzzle.
//!
//! `domain` holds the pure rules, `sim` the running game (world,
//! interpreter, simulation tick, session), `ui` the terminal front end.

pub mod config;
pub mod domain;
pub mod sim;
pub mod ui;

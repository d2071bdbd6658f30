#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod closure;
pub mod display;
mod error;
mod events;
mod function;
mod structure;
mod visit;

pub use self::{
    closure::{Closure, LinearBlock, Node},
    error::FlowError,
    events::{Event, EventKind, Join, Jump, Split, canonicalize_jumps},
    function::{Function, find_function_bounds},
    structure::{ControlStructure, StructureKind},
};

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod classes;
mod instruction;

pub use self::{classes::MnemonicClasses, instruction::Instruction};

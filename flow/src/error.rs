use alloc::vec::Vec;

use unbraid_ir::Instruction;

use crate::events::Event;

/// Errors raised while reconstructing structured control flow.
///
/// All of these are fatal to the analysis of the current function and carry
/// the offending instruction or event. An `Unknown` structure classification
/// is *not* an error; it is the designed fallback for regions the taxonomy
/// cannot name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// A branch targets an address before the function entry.
    #[error("branch to {target:#x}, before function start: {cause}", target = .cause.target.unwrap_or_default())]
    OutOfBounds {
        /// The address of the first instruction of the function
        entry: u64,
        /// The offending branch instruction
        cause: Instruction,
    },
    /// The instruction sequence ended while forward branch targets were still
    /// pending, so no return can be the last instruction of the function.
    #[error("function at {address:#x} does not finish within the given code")]
    FunctionUnterminated { address: u64 },
    /// A branch target address does not fall on an instruction boundary
    /// within the function.
    #[error("address {address:#x} is out of function range")]
    UnmappedAddress { address: u64 },
    /// A back-reference event has no open forward partner.
    #[error("a past event referred to cannot be found: {event}")]
    DanglingBackReference { event: Event },
    /// A branch transferring control to the very next instruction.
    #[error("found self jump: {event}")]
    SelfJump { event: Event },
    /// Events were still open after the last index of the slice.
    #[error("{} event(s) remain open after the end of the slice", .open.len())]
    UnbalancedEvents { open: Vec<Event> },
    /// An `if`/`if-else` structure was rendered with the wrong number of
    /// child closures.
    #[error("wrong number of child closures for an {kind}: expected {expected}, found {found}")]
    StructureArity {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
}

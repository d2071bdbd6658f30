use alloc::vec::Vec;
use core::ops::Range;

use smallvec::SmallVec;
use unbraid_ir::{Instruction, MnemonicClasses};

use crate::{
    closure::Closure,
    error::FlowError,
    events::{Jump, canonicalize_jumps},
};

/// Locate the bounds of the procedure beginning at `start`.
///
/// Assumes nothing jumps into the procedure from outside. A return is the last
/// instruction of the procedure iff no forward branch target is still pending
/// at that point; targets that have been passed are pruned, which accounts for
/// forward jumps that overshoot a return and later fall through.
pub fn find_function_bounds(
    code: &[Instruction],
    start: usize,
    classes: &MnemonicClasses,
) -> Result<Range<usize>, FlowError> {
    assert!(start < code.len(), "function start {start} out of code bounds");
    let entry = code[start].address;

    // Branch targets beyond the current address
    let mut outside: SmallVec<[u64; 8]> = SmallVec::new();
    for (i, instruction) in code.iter().enumerate().skip(start) {
        let current = instruction.address;
        if classes.is_flow_changing(&instruction.mnemonic) {
            let target = instruction
                .target
                .expect("flow-changing instruction without a branch target");
            if target < entry {
                return Err(FlowError::OutOfBounds {
                    entry,
                    cause: instruction.clone(),
                });
            }
            if target > current {
                outside.push(target);
            }
        } else if classes.is_finishing(&instruction.mnemonic) {
            outside.retain(|target| *target > current);
            if outside.is_empty() {
                return Ok(start..i + 1);
            }
        }
    }

    Err(FlowError::FunctionUnterminated { address: entry })
}

/// A procedure sliced out of the decoded instruction stream, with its control
/// flow reconstructed as a tree of linear blocks and control structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    address: u64,
    instructions: Vec<Instruction>,
    body: Closure,
}

impl Function {
    /// Slice the procedure beginning at `code[start]` out of the stream and
    /// reconstruct its control flow.
    pub fn analyze(
        code: &[Instruction],
        start: usize,
        classes: &MnemonicClasses,
    ) -> Result<Self, FlowError> {
        let bounds = find_function_bounds(code, start, classes)?;
        let address = code[start].address;
        let instructions = code[bounds].to_vec();
        log::debug!(
            target: "flow",
            "function at {address:#x} spans {} instruction(s)",
            instructions.len(),
        );

        let jumps = find_jumps(&instructions, classes)?;
        let events = canonicalize_jumps(jumps);
        let body = Closure::build(&instructions, events)?;

        Ok(Self {
            address,
            instructions,
            body,
        })
    }

    /// The address of the procedure's first instruction.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The full instruction slice of the procedure.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The reconstructed body.
    pub fn body(&self) -> &Closure {
        &self.body
    }

    /// The slice index of the instruction at `address`, if any.
    pub fn index_of(&self, address: u64) -> Option<usize> {
        self.instructions.iter().position(|instruction| instruction.address == address)
    }
}

/// Collect every flow-changing instruction of the slice as a [Jump] in slice
/// indices.
fn find_jumps(
    instructions: &[Instruction],
    classes: &MnemonicClasses,
) -> Result<Vec<Jump>, FlowError> {
    let mut jumps = Vec::new();
    for (source, instruction) in instructions.iter().enumerate() {
        if !classes.is_flow_changing(&instruction.mnemonic) {
            continue;
        }
        let target = instruction
            .target
            .expect("flow-changing instruction without a branch target");
        let destination = instructions
            .iter()
            .position(|candidate| candidate.address == target)
            .ok_or(FlowError::UnmappedAddress { address: target })?;
        jumps.push(Jump {
            cause: instruction.clone(),
            source,
            destination,
            conditional: instruction.is_conditional(),
        });
    }
    Ok(jumps)
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        closure::{LinearBlock, Node},
        structure::StructureKind,
    };

    fn ins(index: u64) -> Instruction {
        Instruction::new(0x100 + index * 4, "mov")
    }

    fn bra(index: u64, target_index: u64) -> Instruction {
        Instruction::branching(0x100 + index * 4, "bra", 0x100 + target_index * 4)
            .with_condition("e")
    }

    fn ret(index: u64) -> Instruction {
        Instruction::new(0x100 + index * 4, "ret")
    }

    #[test]
    fn linear_function_is_one_block() {
        // 0: mov, 1: mov, 2: ret
        let code = vec![ins(0), ins(1), ret(2)];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();

        assert_eq!(function.address(), 0x100);
        assert_eq!(
            function.body().children(),
            &[Node::Linear(LinearBlock::new(code))]
        );
    }

    #[test]
    fn bounds_stop_at_first_free_return() {
        // Two functions back to back
        let code = vec![ins(0), ret(1), ins(2), ret(3)];
        let classes = MnemonicClasses::default();
        assert_eq!(find_function_bounds(&code, 0, &classes).unwrap(), 0..2);
        assert_eq!(find_function_bounds(&code, 2, &classes).unwrap(), 2..4);
    }

    #[test]
    fn bounds_skip_return_with_pending_forward_branch() {
        // The branch at 1 overshoots the return at 3, so the function extends
        // to the return at 5.
        // 0: mov, 1: bra e 4, 2: mov, 3: ret, 4: mov, 5: ret
        let code = vec![ins(0), bra(1, 4), ins(2), ret(3), ins(4), ret(5)];
        let classes = MnemonicClasses::default();
        assert_eq!(find_function_bounds(&code, 0, &classes).unwrap(), 0..6);
    }

    #[test]
    fn branch_before_entry_is_out_of_bounds() {
        let code = vec![ins(0), ins(1), bra(2, 0), ret(3)];
        let classes = MnemonicClasses::default();
        // Starting at index 1, the branch targets the instruction before the
        // entry
        let err = find_function_bounds(&code, 1, &classes).unwrap_err();
        assert!(matches!(err, FlowError::OutOfBounds { entry: 0x104, .. }));
    }

    #[test]
    fn missing_return_is_unterminated() {
        let code = vec![ins(0), ins(1)];
        let classes = MnemonicClasses::default();
        let err = find_function_bounds(&code, 0, &classes).unwrap_err();
        assert!(matches!(err, FlowError::FunctionUnterminated { address: 0x100 }));
    }

    #[test]
    fn simple_if_function() {
        // 0: mov
        // 1: bra e 4
        // 2: mov
        // 3: mov
        // 4: ret
        let code = vec![ins(0), bra(1, 4), ins(2), ins(3), ret(4)];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();

        let [Node::Linear(head), Node::Control(body), Node::Linear(tail)] =
            function.body().children()
        else {
            panic!("expected linear/control/linear, got {:?}", function.body().children());
        };
        assert_eq!(head.instructions(), &code[..2]);
        assert!(matches!(body.kind(), StructureKind::If(cause) if cause.address == 0x104));
        assert_eq!(tail.instructions(), &code[4..]);

        // The single child is the skipped region
        let [child] = body.children() else {
            panic!("expected one child");
        };
        assert_eq!(
            child.children(),
            &[Node::Linear(LinearBlock::new(code[2..4].to_vec()))]
        );
    }

    #[test]
    fn conditional_branch_to_return_is_an_if() {
        // A conditional forward branch whose destination is exactly the
        // return produces an if over a single linear block.
        // 0: bra e 2, 1: mov, 2: ret
        let code = vec![bra(0, 2), ins(1), ret(2)];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();

        let [Node::Linear(head), Node::Control(body), Node::Linear(tail)] =
            function.body().children()
        else {
            panic!("expected linear/control/linear, got {:?}", function.body().children());
        };
        assert_eq!(head.instructions(), &code[..1]);
        assert!(matches!(body.kind(), StructureKind::If(_)));
        assert_eq!(tail.instructions(), &code[2..]);
    }

    #[test]
    fn branch_into_instruction_gap_is_unmapped() {
        // Target 0x106 falls between instruction addresses
        let code = vec![
            ins(0),
            Instruction::branching(0x104, "bra", 0x106).with_condition("e"),
            ins(2),
            ret(3),
        ];
        let err = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap_err();
        assert!(matches!(err, FlowError::UnmappedAddress { address: 0x106 }));
    }

    #[test]
    fn index_of_translates_addresses() {
        let code = vec![ins(0), ins(1), ret(2)];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();
        assert_eq!(function.index_of(0x100), Some(0));
        assert_eq!(function.index_of(0x108), Some(2));
        assert_eq!(function.index_of(0x10c), None);
    }
}

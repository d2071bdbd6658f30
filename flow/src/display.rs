//! Pseudo-source rendering of reconstructed control flow trees.
//!
//! Rendering is fallible: `if`/`if-else` structures are checked for the
//! expected number of child closures on the way out, and a mismatch surfaces
//! as [FlowError::StructureArity] rather than producing misleading output.

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use unbraid_ir::Instruction;

use crate::{
    closure::{Closure, LinearBlock, Node},
    error::FlowError,
    function::Function,
    structure::{ControlStructure, StructureKind},
};

const INDENT: &str = "    ";

fn indent(text: &str) -> String {
    text.split('\n').map(|line| format!("{INDENT}{line}")).collect::<Vec<_>>().join("\n")
}

fn render_instructions(instructions: &[Instruction]) -> String {
    instructions.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

/// Render a whole function as pseudo-source.
pub fn render_function(function: &Function) -> Result<String, FlowError> {
    Ok(format!(
        "// {address:#x}\nf_{address:#x}(...) {body}",
        address = function.address(),
        body = render_closure(function.body())?,
    ))
}

/// Render a closure as a braced sequence of its children, one blank line
/// between them.
pub fn render_closure(closure: &Closure) -> Result<String, FlowError> {
    let children = closure
        .children()
        .iter()
        .map(render_node)
        .collect::<Result<Vec<_>, _>>()?;
    let inside = children.iter().map(|text| indent(text)).collect::<Vec<_>>().join("\n\n");
    Ok(format!("{{\n{inside}\n}}"))
}

fn render_node(node: &Node) -> Result<String, FlowError> {
    match node {
        Node::Linear(block) => Ok(render_linear(block)),
        Node::Control(structure) => render_structure(structure),
    }
}

fn render_linear(block: &LinearBlock) -> String {
    render_instructions(block.instructions())
}

/// Render a control structure according to its classification.
pub fn render_structure(structure: &ControlStructure) -> Result<String, FlowError> {
    match structure.kind() {
        StructureKind::If(branch) => {
            let [body] = structure.children() else {
                return Err(FlowError::StructureArity {
                    kind: "if",
                    expected: 1,
                    found: structure.children().len(),
                });
            };
            Ok(format!(
                "if (not branch@{:#x}) {}",
                branch.address,
                render_closure(body)?
            ))
        }
        StructureKind::IfElse(branch) => {
            let [taken, fallthrough] = structure.children() else {
                return Err(FlowError::StructureArity {
                    kind: "if-else",
                    expected: 2,
                    found: structure.children().len(),
                });
            };
            Ok(format!(
                "if (not branch@{:#x}) {} else {}",
                branch.address,
                render_closure(taken)?,
                render_closure(fallthrough)?
            ))
        }
        StructureKind::Unknown => {
            if structure.children().is_empty() {
                // Nothing structured to show; fall back to the raw run
                Ok(format!(
                    "UnparsedFlowPattern {{{{\n{}\n}}}}",
                    indent(&render_instructions(structure.instructions()))
                ))
            } else {
                let children = structure
                    .children()
                    .iter()
                    .map(render_closure)
                    .collect::<Result<Vec<_>, _>>()?;
                let inside =
                    children.iter().map(|text| indent(text)).collect::<Vec<_>>().join("\n\n");
                Ok(format!("FlowPattern {{{{\n{inside}\n}}}}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use pretty_assertions::assert_eq;
    use unbraid_ir::MnemonicClasses;

    use super::*;

    fn ins(index: u64, mnemonic: &str) -> Instruction {
        Instruction::new(0x100 + index * 4, mnemonic)
    }

    fn bra(index: u64, target_index: u64) -> Instruction {
        Instruction::branching(0x100 + index * 4, "bra", 0x100 + target_index * 4)
            .with_condition("e")
    }

    #[test]
    fn render_linear_function() {
        let code = vec![ins(0, "mov"), ins(1, "add"), ins(2, "ret")];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();
        assert_eq!(
            render_function(&function).unwrap(),
            "// 0x100\n\
             f_0x100(...) {\n\
             \x20   0x100: mov\n\
             \x20   0x104: add\n\
             \x20   0x108: ret\n\
             }"
        );
    }

    #[test]
    fn render_simple_if() {
        // 0: mov, 1: bra e 4, 2: add, 3: mul, 4: ret
        let code = vec![
            ins(0, "mov"),
            bra(1, 4),
            ins(2, "add"),
            ins(3, "mul"),
            ins(4, "ret"),
        ];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();
        assert_eq!(
            render_function(&function).unwrap(),
            "// 0x100\n\
             f_0x100(...) {\n\
             \x20   0x100: mov\n\
             \x20   0x104: bra e 0x110\n\
             \n\
             \x20   if (not branch@0x104) {\n\
             \x20       0x108: add\n\
             \x20       0x10c: mul\n\
             \x20   }\n\
             \n\
             \x20   0x110: ret\n\
             }"
        );
    }

    #[test]
    fn render_if_else() {
        // 0: mov, 1: bra e 4, 2: add, 3: bra 6, 4: sub, 5: mul, 6: ret
        let code = vec![
            ins(0, "mov"),
            bra(1, 4),
            ins(2, "add"),
            Instruction::branching(0x10c, "bra", 0x118),
            ins(4, "sub"),
            ins(5, "mul"),
            ins(6, "ret"),
        ];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();
        let rendered = render_function(&function).unwrap();
        assert!(rendered.contains("if (not branch@0x104) {"), "got:\n{rendered}");
        assert!(rendered.contains("} else {"), "got:\n{rendered}");
        assert!(rendered.contains("0x118: ret"), "got:\n{rendered}");
    }

    #[test]
    fn render_unknown_region_opaquely() {
        // A loop back to the entry is outside the taxonomy
        // 0: mov, 1: mov, 2: bra e 0, 3: ret
        let code = vec![ins(0, "mov"), ins(1, "mov"), bra(2, 0), ins(3, "ret")];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();
        let rendered = render_function(&function).unwrap();
        assert!(rendered.contains("FlowPattern {{"), "got:\n{rendered}");
        assert!(rendered.contains("}}"), "got:\n{rendered}");
    }

    #[test]
    fn arity_violation_is_reported() {
        // Two crossing forward jumps follow the if-else event shape but leave
        // a third region stranded between the second split and the first
        // join; rendering refuses the extra child.
        // 0: mov, 1: bra e 5, 2: mov, 3: bra 7, 4: mov, 5: mov, 6: mov, 7: ret
        let code = vec![
            ins(0, "mov"),
            bra(1, 5),
            ins(2, "mov"),
            Instruction::branching(0x10c, "bra", 0x11c),
            ins(4, "mov"),
            ins(5, "mov"),
            ins(6, "mov"),
            ins(7, "ret"),
        ];
        let function = Function::analyze(&code, 0, &MnemonicClasses::default()).unwrap();
        let err = render_function(&function).unwrap_err();
        assert_eq!(
            err,
            FlowError::StructureArity {
                kind: "if-else",
                expected: 2,
                found: 3
            }
        );
    }
}

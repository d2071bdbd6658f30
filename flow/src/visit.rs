//! In-order traversal of reconstructed trees.

use unbraid_ir::Instruction;

use crate::{
    closure::{Closure, Node},
    function::Function,
    structure::ControlStructure,
};

impl Function {
    /// Apply `analyzer` to every linear instruction run of the body, in
    /// layout order.
    pub fn visit_linear<F>(&self, analyzer: &mut F)
    where
        F: FnMut(&[Instruction]),
    {
        self.body().visit_linear(analyzer);
    }
}

impl Closure {
    /// Apply `analyzer` to every linear instruction run below this closure,
    /// in layout order.
    pub fn visit_linear<F>(&self, analyzer: &mut F)
    where
        F: FnMut(&[Instruction]),
    {
        for node in self.children() {
            match node {
                Node::Linear(block) => analyzer(block.instructions()),
                Node::Control(structure) => structure.visit_linear(analyzer),
            }
        }
    }
}

impl ControlStructure {
    /// Apply `analyzer` to every linear instruction run below this structure,
    /// in layout order.
    pub fn visit_linear<F>(&self, analyzer: &mut F)
    where
        F: FnMut(&[Instruction]),
    {
        for closure in self.children() {
            closure.visit_linear(analyzer);
        }
    }
}

use core::fmt;

use compact_str::CompactString;

/// A single decoded instruction.
///
/// Instances are produced by a decoder and treated as read-only by the flow
/// reconstruction engine. The engine addresses instructions by their index in
/// the enclosing slice, never by `address`; the address is only consulted when
/// translating branch targets and when rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The address this instruction was decoded at
    pub address: u64,
    /// The operation mnemonic, e.g. `bra` or `ret`
    pub mnemonic: CompactString,
    /// The branch target address, present when the decoder recognized one.
    ///
    /// Only meaningful when the mnemonic is flow-changing.
    pub target: Option<u64>,
    /// The predicate guarding execution of this instruction, empty when the
    /// instruction is unconditional.
    pub condition: CompactString,
}

impl Instruction {
    /// Create an instruction with no branch target and no condition.
    pub fn new(address: u64, mnemonic: impl Into<CompactString>) -> Self {
        Self {
            address,
            mnemonic: mnemonic.into(),
            target: None,
            condition: CompactString::default(),
        }
    }

    /// Create a flow-changing instruction transferring control to `target`.
    pub fn branching(address: u64, mnemonic: impl Into<CompactString>, target: u64) -> Self {
        Self {
            address,
            mnemonic: mnemonic.into(),
            target: Some(target),
            condition: CompactString::default(),
        }
    }

    /// Guard this instruction with `condition`.
    pub fn with_condition(mut self, condition: impl Into<CompactString>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Returns true if this instruction only executes when its condition holds.
    #[inline]
    pub fn is_conditional(&self) -> bool {
        !self.condition.is_empty()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.address, self.mnemonic)?;
        if !self.condition.is_empty() {
            write!(f, " {}", self.condition)?;
        }
        if let Some(target) = self.target {
            write!(f, " {target:#x}")?;
        }
        Ok(())
    }
}

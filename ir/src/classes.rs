use compact_str::CompactString;
use smallvec::{SmallVec, smallvec};

/// Classification of mnemonics by their effect on control flow.
///
/// These three sets are the only architecture-specific configuration the flow
/// reconstruction engine consumes:
///
/// * *flow-changing* mnemonics produce a non-fallthrough edge to their target;
/// * *finishing* mnemonics terminate the enclosing procedure;
/// * *if-like* mnemonics are the flow-changing subset whose condition a front
///   end treats as forming `if`/`if-else` regions.
///
/// A call is deliberately neither: it returns to the following instruction, so
/// from the perspective of a single procedure it does not change the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MnemonicClasses {
    flow_changing: SmallVec<[CompactString; 2]>,
    finishing: SmallVec<[CompactString; 2]>,
    if_like: SmallVec<[CompactString; 2]>,
}

impl Default for MnemonicClasses {
    fn default() -> Self {
        Self {
            flow_changing: smallvec![CompactString::const_new("bra")],
            finishing: smallvec![CompactString::const_new("ret")],
            if_like: smallvec![CompactString::const_new("bra")],
        }
    }
}

impl MnemonicClasses {
    /// Build a classification from explicit mnemonic sets.
    pub fn new<S: Into<CompactString>>(
        flow_changing: impl IntoIterator<Item = S>,
        finishing: impl IntoIterator<Item = S>,
        if_like: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            flow_changing: flow_changing.into_iter().map(Into::into).collect(),
            finishing: finishing.into_iter().map(Into::into).collect(),
            if_like: if_like.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `mnemonic` produces a non-fallthrough edge to its target.
    pub fn is_flow_changing(&self, mnemonic: &str) -> bool {
        self.flow_changing.iter().any(|m| m == mnemonic)
    }

    /// Returns true if `mnemonic` terminates the enclosing procedure.
    pub fn is_finishing(&self, mnemonic: &str) -> bool {
        self.finishing.iter().any(|m| m == mnemonic)
    }

    /// Returns true if `mnemonic` participates in `if`/`if-else` formation.
    pub fn is_if_like(&self, mnemonic: &str) -> bool {
        self.if_like.iter().any(|m| m == mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_classes() {
        let classes = MnemonicClasses::default();
        assert!(classes.is_flow_changing("bra"));
        assert!(classes.is_finishing("ret"));
        assert!(classes.is_if_like("bra"));
        assert!(!classes.is_flow_changing("ret"));
        assert!(!classes.is_flow_changing("call"));
        assert!(!classes.is_finishing("bra"));
    }

    #[test]
    fn custom_classes() {
        let classes = MnemonicClasses::new(["jmp", "jcc"], ["iret"], ["jcc"]);
        assert!(classes.is_flow_changing("jmp"));
        assert!(classes.is_flow_changing("jcc"));
        assert!(classes.is_finishing("iret"));
        assert!(classes.is_if_like("jcc"));
        assert!(!classes.is_if_like("jmp"));
    }
}

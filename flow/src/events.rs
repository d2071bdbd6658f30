use alloc::vec::Vec;
use core::{cmp::Reverse, fmt};

use unbraid_ir::Instruction;

/// A flow-changing instruction re-expressed in slice indices.
///
/// `source` is the index of the branch instruction itself; `destination` the
/// index its target address maps to. Both are relative to the same slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jump {
    pub cause: Instruction,
    pub source: usize,
    pub destination: usize,
    pub conditional: bool,
}

/// The point at which control may leave the fallthrough path.
///
/// `index` is the position immediately *after* the branch instruction, since
/// control transfers once the branch has executed; `destination` is the target
/// position within the current slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub cause: Instruction,
    pub index: usize,
    pub destination: usize,
    pub conditional: bool,
}

/// The point at which control from a non-fallthrough path re-enters.
///
/// `index` is the destination position; `source` the position immediately
/// after the originating branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub cause: Instruction,
    pub index: usize,
    pub source: usize,
}

/// The two event variants, distinguished where only the shape matters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventKind {
    Split,
    Join,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Split => f.write_str("split"),
            Self::Join => f.write_str("join"),
        }
    }
}

/// One endpoint of a canonicalized jump.
///
/// Every jump within a slice contributes exactly one [Split] at its source and
/// one [Join] at its destination; the pair reference each other through
/// `destination`/`source`. Events are owned by the control structure that ends
/// up holding them and are re-expressed relative to each sub-slice they
/// descend into (see [Event::offset]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Split(Split),
    Join(Join),
}

impl Event {
    /// Which variant this event is.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Split(_) => EventKind::Split,
            Self::Join(_) => EventKind::Join,
        }
    }

    /// The position of the event itself.
    pub fn index(&self) -> usize {
        match self {
            Self::Split(split) => split.index,
            Self::Join(join) => join.index,
        }
    }

    /// The position of the other half of the jump.
    pub fn referenced_index(&self) -> usize {
        match self {
            Self::Split(split) => split.destination,
            Self::Join(join) => join.source,
        }
    }

    /// The branch instruction this event originates from.
    pub fn cause(&self) -> &Instruction {
        match self {
            Self::Split(split) => &split.cause,
            Self::Join(join) => &join.cause,
        }
    }

    /// Re-express this event relative to a slice beginning `delta` positions
    /// after the current origin. A negative `delta` undoes a prior offset.
    pub fn offset(&mut self, delta: isize) {
        fn shift(index: usize, delta: isize) -> usize {
            index.checked_add_signed(-delta).expect("event index out of slice bounds")
        }
        match self {
            Self::Split(split) => {
                split.index = shift(split.index, delta);
                split.destination = shift(split.destination, delta);
            }
            Self::Join(join) => {
                join.index = shift(join.index, delta);
                join.source = shift(join.source, delta);
            }
        }
    }

    /// Returns true if `self` and `other` are the two halves of one jump.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Split(split), Self::Join(join)) | (Self::Join(join), Self::Split(split)) => {
                join.source == split.index
            }
            _ => false,
        }
    }

    /// Returns true if the jump intervals of `self` and `other` properly
    /// interleave: one endpoint of `other` falls inside the span of `self`
    /// while the other falls outside.
    ///
    /// Two jumps sharing an endpoint never intersect; that is the well-nested
    /// case. The case split below is on the variant pair and the direction of
    /// `self`, and is deliberately kept in one place.
    pub fn intersects(&self, other: &Self) -> bool {
        let (start_inside, end_inside) = match (self, other) {
            (Self::Split(a), Self::Split(b)) => {
                // Two jumps to the same place never intersect
                if a.destination == b.destination {
                    return false;
                }
                if a.index < a.destination {
                    // forward jump
                    (
                        a.index < b.index && b.index <= a.destination,
                        a.index <= b.destination && b.destination < a.destination,
                    )
                } else {
                    (
                        a.destination < b.index && b.index < a.index,
                        a.destination <= b.destination && b.destination < a.index,
                    )
                }
            }
            (Self::Split(a), Self::Join(b)) => {
                if a.destination == b.index {
                    return false;
                }
                if a.index < a.destination {
                    // forward jump
                    (
                        a.index < b.source && b.source <= a.destination,
                        a.index <= b.index && b.index < a.destination,
                    )
                } else {
                    (
                        a.destination < b.source && b.source < a.index,
                        a.destination <= b.index && b.index < a.index,
                    )
                }
            }
            (Self::Join(a), Self::Join(b)) => {
                if a.index == b.index {
                    return false;
                }
                if a.source < a.index {
                    // forward jump
                    (
                        a.source < b.source && b.source <= a.index,
                        a.source <= b.index && b.index < a.index,
                    )
                } else {
                    (
                        a.index < b.source && b.source < a.source,
                        a.index <= b.index && b.index < a.source,
                    )
                }
            }
            // A join intersects a split exactly when that split intersects it
            (Self::Join(_), Self::Split(_)) => return other.intersects(self),
        };
        // One endpoint inside, the other outside
        start_inside != end_inside
    }

    /// The canonical total order: by index, splits before joins at the same
    /// index, and among equals the event whose other half reaches furthest
    /// first, so outermost openings precede inner ones and outermost closings
    /// follow inner ones.
    pub(crate) fn sort_key(&self) -> (usize, bool, Reverse<usize>) {
        match self {
            Self::Split(split) => (split.index, false, Reverse(split.destination)),
            Self::Join(join) => (join.index, true, Reverse(join.source)),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Split(split) => write!(f, "split at {} to {}", split.index, split.destination),
            Self::Join(join) => write!(f, "join at {} from {}", join.index, join.source),
        }
    }
}

/// Unify jumps into [Split]/[Join] events sorted by the canonical order.
///
/// Control flow transfers *immediately after* the branch instruction, which is
/// why the split lands at `source + 1`; the branch itself stays in the block
/// that falls through into it.
pub fn canonicalize_jumps(jumps: impl IntoIterator<Item = Jump>) -> Vec<Event> {
    let mut events = Vec::new();
    for jump in jumps {
        events.push(Event::Split(Split {
            cause: jump.cause.clone(),
            index: jump.source + 1,
            destination: jump.destination,
            conditional: jump.conditional,
        }));
        events.push(Event::Join(Join {
            cause: jump.cause,
            index: jump.destination,
            source: jump.source + 1,
        }));
    }
    events.sort_by_key(Event::sort_key);
    events
}

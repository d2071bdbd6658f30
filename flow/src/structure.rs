use alloc::{collections::BTreeSet, vec::Vec};
use core::fmt;

use unbraid_ir::Instruction;

use crate::{
    closure::Closure,
    error::FlowError,
    events::{Event, EventKind},
};

/// The recognized shape of a control structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureKind {
    /// A single conditional forward jump over one region, caused by `branch`
    If(Instruction),
    /// Two jumps carving the region into a taken and a fallthrough arm,
    /// entered through `branch`
    IfElse(Instruction),
    /// Anything the taxonomy cannot name; rendered opaquely, never an error
    Unknown,
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::If(_) => f.write_str("if"),
            Self::IfElse(_) => f.write_str("if-else"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// An irreducible cluster of events ("mess") together with the child closures
/// living in the gaps between consecutive cluster events, and the control
/// construct the cluster was classified as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlStructure {
    instructions: Vec<Instruction>,
    mess: Vec<Event>,
    flow: Vec<Closure>,
    kind: StructureKind,
}

/// The event-kind sequence of an `if`: one opening, closed once.
const IF_EVENTS: &[(EventKind, usize)] = &[(EventKind::Split, 0), (EventKind::Join, 0)];

/// The event-kind sequence of an `if-else`: two openings, closed in order,
/// properly interleaved around one another.
const IF_ELSE_EVENTS: &[(EventKind, usize)] = &[
    (EventKind::Split, 0),
    (EventKind::Split, 1),
    (EventKind::Join, 0),
    (EventKind::Join, 1),
];

/// Returns true if `mess` follows the kind sequence of `pattern` and every
/// event number opened by the pattern is also closed by it.
fn match_events(mess: &[Event], pattern: &[(EventKind, usize)]) -> bool {
    if mess.len() != pattern.len() {
        return false;
    }

    let mut started = BTreeSet::new();
    for (event, &(kind, number)) in mess.iter().zip(pattern) {
        if event.kind() != kind {
            return false;
        }
        if !started.remove(&number) {
            started.insert(number);
        }
    }
    started.is_empty()
}

impl ControlStructure {
    /// The full instruction slice this structure spans.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The cluster events, in canonical order.
    pub fn mess(&self) -> &[Event] {
        &self.mess
    }

    /// The child closures between consecutive cluster events, in order.
    /// Empty gaps contribute no child.
    pub fn children(&self) -> &[Closure] {
        &self.flow
    }

    /// How this cluster was classified.
    pub fn kind(&self) -> &StructureKind {
        &self.kind
    }

    /// Analyze the outer cluster of one irreducible region.
    ///
    /// `events` is the canonically ordered event list of the window and must
    /// be non-empty; indices are relative to `instructions`.
    pub(crate) fn build(
        instructions: &[Instruction],
        events: Vec<Event>,
    ) -> Result<Self, FlowError> {
        assert!(!events.is_empty(), "a control structure must have events");

        let mess_positions = find_mess(&events);
        let flow = carve_children(instructions, &events, &mess_positions)?;

        let mess: Vec<Event> =
            mess_positions.iter().map(|&position| events[position].clone()).collect();
        let kind = classify(&mess);
        log::trace!(
            target: "flow",
            "classified a mess of {} event(s) as {kind}",
            mess.len(),
        );

        Ok(Self {
            instructions: instructions.to_vec(),
            mess,
            flow,
            kind,
        })
    }
}

/// Find the entangled mess: seed with the first event, expand to a fixed point
/// of the `intersects` relation, then absorb the `matches` partners of every
/// member so pairs stay together even when their intervals nest cleanly.
///
/// Returns positions into `events`, ascending (which is canonical order,
/// since `events` is canonically sorted).
fn find_mess(events: &[Event]) -> Vec<usize> {
    let mut mess = BTreeSet::from([0]);
    let mut left: BTreeSet<usize> = (1..events.len()).collect();

    loop {
        let intersections: Vec<usize> = left
            .iter()
            .copied()
            .filter(|&candidate| {
                mess.iter().any(|&member| events[candidate].intersects(&events[member]))
            })
            .collect();
        if intersections.is_empty() {
            break;
        }
        for position in intersections {
            left.remove(&position);
            mess.insert(position);
        }
    }

    let partners: Vec<usize> = left
        .iter()
        .copied()
        .filter(|&candidate| mess.iter().any(|&member| events[member].matches(&events[candidate])))
        .collect();
    for position in partners {
        mess.insert(position);
    }

    mess.into_iter().collect()
}

/// Carve one child closure out of each non-empty gap between consecutive mess
/// events. The boundary events themselves belong to the mess, not to any
/// child; events strictly inside a gap descend into its closure, re-expressed
/// relative to the gap's origin.
fn carve_children(
    instructions: &[Instruction],
    events: &[Event],
    mess_positions: &[usize],
) -> Result<Vec<Closure>, FlowError> {
    let mut closures = Vec::new();
    let mut previous = 0;
    for &position in mess_positions {
        let (first, last) = (previous, position);
        previous = position;
        if first == last {
            continue;
        }

        let start = events[first].index();
        let end = events[last].index();
        if start == end {
            continue;
        }

        let mut sub_events: Vec<Event> = events[first + 1..last].to_vec();
        for sub_event in sub_events.iter_mut() {
            sub_event.offset(start as isize);
        }
        closures.push(Closure::build(&instructions[start..end], sub_events)?);
    }
    Ok(closures)
}

/// Match the canonically ordered mess against the known construct shapes.
fn classify(mess: &[Event]) -> StructureKind {
    if match_events(mess, IF_EVENTS) {
        StructureKind::If(mess[0].cause().clone())
    } else if match_events(mess, IF_ELSE_EVENTS) {
        StructureKind::IfElse(mess[0].cause().clone())
    } else {
        StructureKind::Unknown
    }
}

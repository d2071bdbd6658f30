use alloc::{vec, vec::Vec};
use core::cmp::Ordering;

use unbraid_ir::Instruction;

use crate::{error::FlowError, events::Event, structure::ControlStructure};

/// A contiguous, event-free instruction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearBlock {
    instructions: Vec<Instruction>,
}

impl LinearBlock {
    pub(crate) fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// The instructions of this run, in layout order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// A child of a [Closure]: either a linear run or a control structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Linear(LinearBlock),
    Control(ControlStructure),
}

/// An alternating sequence of linear blocks and control structures covering a
/// self-contained slice exactly once, in order.
///
/// A slice is self-contained when every jump that opens inside it also closes
/// inside it, so it can be analyzed without crossing its own boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    flow: Vec<Node>,
}

impl Closure {
    /// The children of this closure, in layout order.
    pub fn children(&self) -> &[Node] {
        &self.flow
    }

    /// Partition `instructions` into linear runs and the smallest possible
    /// control structures, driven by the canonically ordered `events`.
    ///
    /// The builder alternates between two modes. In linear mode it accumulates
    /// instructions until the next event. In control mode it tracks the set of
    /// events whose referenced index is still ahead; the moment that set
    /// drains, every jump opened inside the window has also closed inside it,
    /// and the window becomes one [ControlStructure].
    pub(crate) fn build(
        instructions: &[Instruction],
        events: Vec<Event>,
    ) -> Result<Self, FlowError> {
        if events.is_empty() {
            return Ok(Self {
                flow: vec![Node::Linear(LinearBlock::new(instructions.to_vec()))],
            });
        }

        let mut flow = Vec::new();
        // Index of the most recently opened linear region, None in control mode
        let mut linear_start = Some(0);
        // Position in `events` where the current control window began
        let mut window_start = 0;
        // Events whose referenced index is still pending, as positions in `events`
        let mut forward_refs: Vec<usize> = Vec::new();

        for (i, event) in events.iter().enumerate() {
            if let Some(start) = linear_start.take() {
                // Commit the linear run and switch to control mode
                if start != event.index() {
                    flow.push(Node::Linear(LinearBlock::new(
                        instructions[start..event.index()].to_vec(),
                    )));
                }
                window_start = i;
            }

            match event.referenced_index().cmp(&event.index()) {
                // A new opening
                Ordering::Greater => forward_refs.push(i),
                // A closing: find the unique open event it pairs with
                Ordering::Less => {
                    let mut candidates = forward_refs
                        .iter()
                        .enumerate()
                        .filter(|&(_, &open)| events[open].matches(event))
                        .map(|(slot, _)| slot);
                    match candidates.next() {
                        Some(slot) => {
                            assert!(
                                candidates.next().is_none(),
                                "multiple open forward references match {event}"
                            );
                            drop(candidates);
                            forward_refs.remove(slot);
                        }
                        None => {
                            return Err(FlowError::DanglingBackReference {
                                event: event.clone(),
                            });
                        }
                    }
                }
                Ordering::Equal => return Err(FlowError::SelfJump { event: event.clone() }),
            }

            if forward_refs.is_empty() {
                // Every jump opened in the window has closed: commit it and
                // switch back to linear mode at the current index
                linear_start = Some(event.index());

                let window = &events[window_start..=i];
                let start = window[0].index();
                let end = window[window.len() - 1].index();
                let mut sub_events = window.to_vec();
                for sub_event in sub_events.iter_mut() {
                    sub_event.offset(start as isize);
                }
                log::trace!(
                    target: "flow",
                    "control window of {} event(s) over instructions {start}..{end}",
                    window.len(),
                );
                flow.push(Node::Control(ControlStructure::build(
                    &instructions[start..end],
                    sub_events,
                )?));
            }
        }

        let Some(start) = linear_start else {
            let open = forward_refs.into_iter().map(|open| events[open].clone()).collect();
            return Err(FlowError::UnbalancedEvents { open });
        };
        if start < instructions.len() {
            flow.push(Node::Linear(LinearBlock::new(instructions[start..].to_vec())));
        }

        Ok(Self { flow })
    }
}

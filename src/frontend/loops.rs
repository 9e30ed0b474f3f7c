use std::fmt;

use super::parser::{ParseError, Position, Symbol};

/// Names one matched `[`/`]` pair. Handed out in order of first `[`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopId(pub u64);

impl LoopId {
    pub fn start_label(self) -> String {
        format!("start_{}", self.0)
    }

    pub fn end_label(self) -> String {
        format!("end_{}", self.0)
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pairs loop brackets during the single pass over the program.
///
/// The stack depth always equals the current nesting depth.
#[derive(Debug, Default)]
pub struct LoopTracker {
    next: u64,
    pending: Vec<(LoopId, Position)>,
}

impl LoopTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, position: Position) -> LoopId {
        let id = LoopId(self.next);
        self.next += 1;
        self.pending.push((id, position));

        id
    }

    pub fn close(&mut self, position: Position) -> Result<LoopId, ParseError> {
        self.pending
            .pop()
            .map(|(id, _)| id)
            .ok_or(ParseError::UnbalancedLoop {
                symbol: Symbol::LoopClose,
                position,
            })
    }

    pub fn depth(&self) -> usize {
        self.pending.len()
    }

    /// Fails on the earliest `[` still waiting for its `]`.
    pub fn finish(self) -> Result<(), ParseError> {
        match self.pending.first() {
            Some(&(_, position)) => Err(ParseError::UnbalancedLoop {
                symbol: Symbol::LoopOpen,
                position,
            }),
            None => Ok(()),
        }
    }
}

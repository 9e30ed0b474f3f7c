use derive_more::TryFrom;
use itertools::Itertools;
use thiserror::Error;

use super::loops::{LoopId, LoopTracker};

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFrom)]
#[try_from(repr)]
#[repr(u8)]
pub enum Symbol {
    MoveRight = b'>',
    MoveLeft = b'<',
    Increment = b'+',
    Decrement = b'-',
    Output = b'.',
    Input = b',',
    LoopOpen = b'[',
    LoopClose = b']',
}

impl Symbol {
    /// Runs of these symbols collapse into a single counted instruction.
    pub fn is_repeatable(self) -> bool {
        matches!(
            self,
            Symbol::MoveRight
                | Symbol::MoveLeft
                | Symbol::Increment
                | Symbol::Decrement
        )
    }

    pub fn as_char(self) -> char {
        self as u8 as char
    }
}

/// Location of a symbol in the unfiltered source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub symbol: Symbol,
    pub position: Position,
}

/// The filtered instruction stream. Everything outside the eight symbols is
/// dropped here.
pub struct Program {
    tokens: Vec<Token>,
}

impl From<&str> for Program {
    fn from(value: &str) -> Self {
        let mut line = 1;
        let mut column = 0;

        let tokens = value
            .char_indices()
            .filter_map(|(offset, c)| {
                column += 1;
                if c == '\n' {
                    line += 1;
                    column = 0;
                    return None;
                }

                let symbol: Symbol = u8::try_from(c).ok()?.try_into().ok()?;
                Some(Token {
                    symbol,
                    position: Position {
                        offset,
                        line,
                        column,
                    },
                })
            })
            .collect();

        Program { tokens }
    }
}

impl Program {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.tokens.iter().map(|t| t.symbol)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    MoveRight(usize),
    MoveLeft(usize),
    Increment(usize),
    Decrement(usize),
    Output,
    Input,
    LoopOpen(LoopId),
    LoopClose(LoopId),
}

impl Instruction {
    pub fn symbol(&self) -> Symbol {
        use Instruction as I;
        match self {
            I::MoveRight(_) => Symbol::MoveRight,
            I::MoveLeft(_) => Symbol::MoveLeft,
            I::Increment(_) => Symbol::Increment,
            I::Decrement(_) => Symbol::Decrement,
            I::Output => Symbol::Output,
            I::Input => Symbol::Input,
            I::LoopOpen(_) => Symbol::LoopOpen,
            I::LoopClose(_) => Symbol::LoopClose,
        }
    }

    /// How many source symbols this instruction stands for.
    pub fn run(&self) -> usize {
        use Instruction as I;
        match self {
            I::MoveRight(r)
            | I::MoveLeft(r)
            | I::Increment(r)
            | I::Decrement(r) => *r,
            _ => 1,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(
        "unmatched '{}' at line {}, column {}",
        .symbol.as_char(),
        .position.line,
        .position.column
    )]
    UnbalancedLoop { symbol: Symbol, position: Position },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IR(pub Vec<Instruction>);

impl IR {
    pub fn parse(program: &Program) -> Result<Self, ParseError> {
        use Instruction as I;
        use Symbol as S;

        let mut loops = LoopTracker::new();

        let parsed = program
            .tokens
            .iter()
            .dedup_by_with_count(|l, r| {
                l.symbol == r.symbol && l.symbol.is_repeatable()
            })
            .map(|(count, token)| -> Result<Instruction, ParseError> {
                Ok(match token.symbol {
                    S::MoveRight => I::MoveRight(count),
                    S::MoveLeft => I::MoveLeft(count),
                    S::Increment => I::Increment(count),
                    S::Decrement => I::Decrement(count),
                    S::Output => I::Output,
                    S::Input => I::Input,
                    S::LoopOpen => I::LoopOpen(loops.open(token.position)),
                    S::LoopClose => I::LoopClose(loops.close(token.position)?),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        loops.finish()?;

        Ok(IR(parsed))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }
}

use bfc::frontend::loops::{LoopId, LoopTracker};
use bfc::frontend::parser::{
    Instruction, ParseError, Position, Program, Symbol, IR,
};
use pretty_assertions::assert_eq;

fn parse(source: &str) -> Result<Vec<Instruction>, ParseError> {
    IR::parse(&Program::from(source)).map(|ir| ir.0)
}

fn expand(instrs: &[Instruction]) -> String {
    instrs
        .iter()
        .flat_map(|i| std::iter::repeat(i.symbol().as_char()).take(i.run()))
        .collect()
}

#[test]
fn filter_keeps_only_symbols_in_order() {
    let source = "ab+c-\n>< [x] .,\t# comment ++";
    let program = Program::from(source);
    let filtered: String = program.symbols().map(Symbol::as_char).collect();

    assert_eq!(filtered, "+-><[].,++");
    assert!(program.len() <= source.len());
}

#[test]
fn filter_records_positions() {
    let program = Program::from("a+\n  ]");
    let positions: Vec<Position> =
        program.tokens().iter().map(|t| t.position).collect();

    assert_eq!(
        positions,
        vec![
            Position {
                offset: 1,
                line: 1,
                column: 2
            },
            Position {
                offset: 5,
                line: 2,
                column: 3
            },
        ]
    );
}

#[test]
fn filter_of_symbol_free_source_is_empty() {
    assert!(Program::from("hello world\n").is_empty());
    assert_eq!(parse("no code here").unwrap(), Vec::<Instruction>::new());
}

#[test]
fn runs_collapse() {
    use Instruction as I;
    assert_eq!(parse("+++").unwrap(), vec![I::Increment(3)]);
    assert_eq!(parse("+-").unwrap(), vec![I::Increment(1), I::Decrement(1)]);
    assert_eq!(
        parse(">>>><<+ +").unwrap(),
        vec![I::MoveRight(4), I::MoveLeft(2), I::Increment(2)]
    );
}

#[test]
fn io_and_brackets_never_collapse() {
    use Instruction as I;
    assert_eq!(
        parse("..,,").unwrap(),
        vec![I::Output, I::Output, I::Input, I::Input]
    );
    assert_eq!(
        parse("[[]]").unwrap(),
        vec![
            I::LoopOpen(LoopId(0)),
            I::LoopOpen(LoopId(1)),
            I::LoopClose(LoopId(1)),
            I::LoopClose(LoopId(0)),
        ]
    );
}

#[test]
fn expansion_reconstructs_filtered_stream() {
    let sources = [
        "",
        "+",
        "++--++",
        ">>>[-<<+>>]<<<.",
        "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.",
        ",[.,]",
    ];

    for source in sources {
        let program = Program::from(source);
        let filtered: String =
            program.symbols().map(Symbol::as_char).collect();
        let ir = IR::parse(&program).unwrap();

        assert_eq!(expand(&ir.0), filtered);
    }
}

#[test]
fn loop_ids_follow_first_encounter_order() {
    use Instruction as I;
    let opens: Vec<LoopId> = parse("[][[]]")
        .unwrap()
        .into_iter()
        .filter_map(|i| match i {
            I::LoopOpen(id) => Some(id),
            _ => None,
        })
        .collect();

    assert_eq!(opens, vec![LoopId(0), LoopId(1), LoopId(2)]);
}

#[test]
fn stray_close_is_unbalanced() {
    assert_eq!(
        parse("]"),
        Err(ParseError::UnbalancedLoop {
            symbol: Symbol::LoopClose,
            position: Position {
                offset: 0,
                line: 1,
                column: 1
            },
        })
    );
    assert!(parse("[]]").is_err());
}

#[test]
fn unclosed_open_is_unbalanced() {
    assert_eq!(
        parse("+[[]\n"),
        Err(ParseError::UnbalancedLoop {
            symbol: Symbol::LoopOpen,
            position: Position {
                offset: 1,
                line: 1,
                column: 2
            },
        })
    );
}

#[test]
fn unbalanced_message_names_location() {
    let err = parse("+\n+]").unwrap_err();
    assert_eq!(err.to_string(), "unmatched ']' at line 2, column 2");
}

#[test]
fn tracker_depth_follows_nesting() {
    let at = Position {
        offset: 0,
        line: 1,
        column: 1,
    };
    let mut loops = LoopTracker::new();

    let outer = loops.open(at);
    let inner = loops.open(at);
    assert_eq!(loops.depth(), 2);

    assert_eq!(loops.close(at).unwrap(), inner);
    assert_eq!(loops.close(at).unwrap(), outer);
    assert_eq!(loops.depth(), 0);
    assert!(loops.close(at).is_err());
    assert!(loops.finish().is_ok());
}

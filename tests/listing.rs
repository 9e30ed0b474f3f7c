use bfc::frontend::parser::{ParseError, Symbol};
use bfc::{compile, CompileOptions, Error};
use pretty_assertions::assert_eq;

fn body(source: &str) -> Vec<String> {
    compile(source, &CompileOptions::default())
        .unwrap()
        .body()
        .to_vec()
}

#[test]
fn empty_program_is_preamble_and_epilogue() {
    let listing = compile("", &CompileOptions::default()).unwrap();

    assert_eq!(
        listing.to_string(),
        "bits 64\n\
         global _start\n\
         section .bss\n\
         memory: resb 512\n\
         section .text\n\
         _start:\n\
         mov rdx, 1\n\
         mov rsi, memory\n\
         exit:\n\
         mov rax, 60\n\
         xor rdi, rdi\n\
         syscall\n"
    );
}

#[test]
fn memory_size_sizes_reservation() {
    let options = CompileOptions { memory_size: 30000 };
    let listing = compile("+", &options).unwrap();

    assert!(listing.to_string().contains("\nmemory: resb 30000\n"));
    assert_eq!(listing.memory_size(), 30000);
}

#[test]
fn run_becomes_counted_add() {
    assert_eq!(body("+++"), vec!["add byte [rsi], 3"]);
}

#[test]
fn operator_change_gives_single_steps() {
    assert_eq!(body("+-"), vec!["inc byte [rsi]", "dec byte [rsi]"]);
}

#[test]
fn pointer_moves_act_on_register() {
    assert_eq!(
        body("><>>>><<"),
        vec!["inc rsi", "dec rsi", "add rsi, 4", "sub rsi, 2"]
    );
}

#[test]
fn counted_cell_ops_wrap_at_256() {
    let source = "+".repeat(258);
    assert_eq!(body(&source), vec!["add byte [rsi], 2"]);

    let source = "-".repeat(300);
    assert_eq!(body(&source), vec!["sub byte [rsi], 44"]);
}

#[test]
fn clear_cell_loop() {
    assert_eq!(
        body("[-]"),
        vec![
            "cmp byte [rsi], 0",
            "je end_0",
            "start_0:",
            "dec byte [rsi]",
            "cmp byte [rsi], 0",
            "jne start_0",
            "end_0:",
        ]
    );
}

#[test]
fn nested_loops_pair_labels() {
    assert_eq!(
        body("[[]][]"),
        vec![
            "cmp byte [rsi], 0",
            "je end_0",
            "start_0:",
            "cmp byte [rsi], 0",
            "je end_1",
            "start_1:",
            "cmp byte [rsi], 0",
            "jne start_1",
            "end_1:",
            "cmp byte [rsi], 0",
            "jne start_0",
            "end_0:",
            "cmp byte [rsi], 0",
            "je end_2",
            "start_2:",
            "cmp byte [rsi], 0",
            "jne start_2",
            "end_2:",
        ]
    );
}

#[test]
fn io_uses_one_byte_syscalls() {
    assert_eq!(
        body(".,"),
        vec![
            "mov rax, 1",
            "mov rdi, 1",
            "syscall",
            "xor rax, rax",
            "xor rdi, rdi",
            "syscall",
        ]
    );
}

#[test]
fn junk_is_ignored() {
    let listing = compile("a+b", &CompileOptions::default()).unwrap();
    assert_eq!(listing.body(), ["inc byte [rsi]"]);

    let text = listing.to_string();
    let start = text.find("mov rsi, memory\n").unwrap();
    let end = text.find("exit:\n").unwrap();
    assert_eq!(&text[start..end], "mov rsi, memory\ninc byte [rsi]\n");
}

#[test]
fn unbalanced_source_gives_no_listing() {
    let err = compile("]", &CompileOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Parse(ParseError::UnbalancedLoop {
            symbol: Symbol::LoopClose,
            ..
        })
    ));

    assert!(compile("[+", &CompileOptions::default()).is_err());
}

#[test]
fn listing_is_deterministic() {
    let source = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.";
    let options = CompileOptions { memory_size: 1024 };

    let first = compile(source, &options).unwrap().to_string();
    let second = compile(source, &options).unwrap().to_string();

    assert_eq!(first, second);
}

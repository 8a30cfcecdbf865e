// Generated code issues Linux x86-64 system calls; the descriptors are
// pointed at temporary files so output can be inspected.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

mod common;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;

use common::*;
use tapejit::{
    Config, CursorMode, Engine, Error, Interpreter, Jit, MemoryChannel, Program, TapeMachine,
};

struct Fixture {
    _input: File,
    output: File,
    config: Config,
}

impl Fixture {
    fn new(input_bytes: &[u8]) -> Self {
        let mut input = tempfile::tempfile().unwrap();
        input.write_all(input_bytes).unwrap();
        input.seek(SeekFrom::Start(0)).unwrap();
        let output = tempfile::tempfile().unwrap();
        let config = Config {
            tape_size: 1024,
            input_fd: input.as_raw_fd(),
            output_fd: output.as_raw_fd(),
            ..Config::default()
        };
        Fixture {
            _input: input,
            output,
            config,
        }
    }

    fn run(&mut self, source: &str, tape: &mut TapeMachine) -> Result<(), Error> {
        Jit::new(self.config.clone()).run(Program::new(source), tape)
    }

    fn output(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        self.output.seek(SeekFrom::Start(0)).unwrap();
        self.output.read_to_end(&mut out).unwrap();
        out
    }
}

fn jit(source: &str, input: &[u8]) -> (Vec<u8>, TapeMachine) {
    let mut fixture = Fixture::new(input);
    let mut tape = TapeMachine::with_config(&fixture.config);
    fixture.run(source, &mut tape).unwrap();
    (fixture.output(), tape)
}

fn interpret(source: &str, input: &[u8]) -> (Vec<u8>, TapeMachine) {
    let config = Config {
        tape_size: 1024,
        ..Config::default()
    };
    let mut tape = TapeMachine::with_config(&config);
    let mut io = MemoryChannel::from_input(input.to_vec());
    Interpreter::with_config(&config)
        .run(Program::new(source), &mut tape, &mut io)
        .unwrap();
    (io.into_output(), tape)
}

fn assert_engines_agree(source: &str, input: &[u8]) {
    let (jit_out, jit_tape) = jit(source, input);
    let (int_out, int_tape) = interpret(source, input);
    assert_eq!(jit_out, int_out, "output differs for {:?}", source);
    assert_eq!(jit_tape.cursor(), int_tape.cursor(), "cursor differs for {:?}", source);
    assert_eq!(jit_tape.cells(), int_tape.cells(), "tape differs for {:?}", source);
}

#[test]
fn test_add_two_cells() {
    let (out, tape) = jit(ADD_TWO_CELLS, b"");
    assert_eq!(out, vec![7]);
    assert_eq!(&tape.cells()[..2], &[7, 0]);
    assert_eq!(tape.cursor(), 0);
}

#[test]
fn test_echo() {
    let (out, _) = jit(ECHO, &[0x41]);
    assert_eq!(out, vec![0x41]);
}

#[test]
fn test_hello_world() {
    let (out, _) = jit(HELLO_WORLD, b"");
    assert_eq!(out, b"Hello World!\n");
}

#[test]
fn test_cat() {
    let (out, _) = jit(CAT, b"jit\n\x00?");
    // The zero byte ends the copy loop.
    assert_eq!(out, b"jit\n");
}

#[test]
fn test_eof_leaves_cell() {
    let (out, tape) = jit("+++++,.", b"");
    assert_eq!(out, vec![5]);
    assert_eq!(tape.get(), 5);
}

#[test]
fn test_nested_loop_counts() {
    let (_, tape) = jit(DEPTH_ONE, b"");
    assert_eq!(tape.cells()[1], 5);
    let (_, tape) = jit(DEPTH_TWO, b"");
    assert_eq!(tape.cells()[2], 12);
    let (_, tape) = jit(DEPTH_THREE, b"");
    assert_eq!(tape.cells()[3], 24);
}

#[test]
fn test_clear_loop_every_value() {
    for v in 0..=255usize {
        let source = format!("{}[->+<]", "+".repeat(v));
        let (_, tape) = jit(&source, b"");
        assert_eq!(tape.cells()[0], 0);
        assert_eq!(tape.cells()[1] as usize, v);
    }
}

#[test]
fn test_long_runs_are_split() {
    let source = format!("{}+{}.", ">".repeat(300), "<".repeat(300));
    let (out, tape) = jit(&source, b"");
    assert_eq!(out, vec![0]);
    assert_eq!(tape.cells()[300], 1);
    assert_eq!(tape.cursor(), 0);

    let (_, tape) = jit(&"+".repeat(600), b"");
    assert_eq!(tape.get(), (600 % 256) as u8);
}

#[test]
fn test_adjacent_closers() {
    let (out, _) = jit(ADJACENT_CLOSERS, b"");
    assert_eq!(out, vec![3]);

    let deep = format!("+{}-{}+.", "[".repeat(13), "]".repeat(13));
    let (out, _) = jit(&deep, b"");
    assert_eq!(out, vec![1]);
}

#[test]
fn test_engines_agree() {
    let programs = [
        (ADD_TWO_CELLS, ""),
        (ECHO, "A"),
        (HELLO_WORLD, ""),
        (CAT, "some input\n"),
        (DEPTH_THREE, ""),
        (ADJACENT_CLOSERS, ""),
        ("[[[+.]+.]+.]++.", ""),
        (",>,<[->+<]>.", "(\x02"),
        ("+[[-]]>>+[[[-]]]<<.", ""),
    ];
    for (source, input) in programs {
        assert_engines_agree(source, input.as_bytes());
        assert_engines_agree(&with_noise(source), input.as_bytes());
    }
}

#[test]
fn test_wrapping_cursor_matches_interpreter() {
    // Tape of 1024 cells in the fixtures.
    let programs = [
        "<+.".to_string(),
        "<<<++>>>+.<<<<.".to_string(),
        format!("{}+.", ">".repeat(1024 + 5)),
        format!("{}+.", "<".repeat(300)),
        format!("+[{}+]", ">".repeat(200)),
        format!("{}-{}.", ">".repeat(2048), "<".repeat(4096)),
    ];
    for source in &programs {
        assert_engines_agree(source, b"");
    }

    let (out, tape) = jit("<+.", b"");
    assert_eq!(out, vec![1]);
    assert_eq!(tape.cursor(), 1023);
    assert_eq!(tape.cells()[1023], 1);
}

#[test]
fn test_wrapping_on_a_tiny_tape() {
    let mut fixture = Fixture::new(b"");
    fixture.config.tape_size = 3;
    let mut tape = TapeMachine::with_config(&fixture.config);
    fixture.run(&format!("{}+{}+", ">".repeat(7), "<".repeat(300)), &mut tape).unwrap();
    // Seven steps is two laps and one cell; 300 steps back is whole laps.
    assert_eq!(tape.cursor(), 1);
    assert_eq!(tape.cells(), &[0, 2, 0]);
}

fn strict_pair(source: &str) -> ((Error, TapeMachine), (Error, TapeMachine)) {
    let config = Config {
        tape_size: 8,
        cursor: CursorMode::Strict,
        ..Config::default()
    };

    let mut fixture = Fixture::new(b"");
    fixture.config.tape_size = 8;
    fixture.config.cursor = CursorMode::Strict;
    let mut jit_tape = TapeMachine::with_config(&fixture.config);
    let jit_err = fixture.run(source, &mut jit_tape).unwrap_err();

    let mut int_tape = TapeMachine::with_config(&config);
    let mut io = MemoryChannel::from_input(Vec::new());
    let int_err = Interpreter::with_config(&config)
        .run(Program::new(source), &mut int_tape, &mut io)
        .unwrap_err();
    ((jit_err, jit_tape), (int_err, int_tape))
}

#[test]
fn test_strict_cursor_stops_both_engines_alike() {
    let long = ">".repeat(300);
    for source in ["<+", "+>>>>>>>+>+", ">>>+<<<<", "+[>+]", long.as_str()] {
        let ((jit_err, jit_tape), (int_err, int_tape)) = strict_pair(source);
        match (jit_err, int_err) {
            (
                Error::CursorOutOfRange { cursor: a, delta: b, capacity: c },
                Error::CursorOutOfRange { cursor: x, delta: y, capacity: z },
            ) => assert_eq!((a, b, c), (x, y, z), "error differs for {:?}", source),
            other => panic!("unexpected errors for {:?}: {:?}", source, other),
        }
        assert_eq!(jit_tape.cursor(), int_tape.cursor(), "cursor differs for {:?}", source);
        assert_eq!(jit_tape.cells(), int_tape.cells(), "tape differs for {:?}", source);
    }
}

#[test]
fn test_strict_fault_keeps_earlier_output() {
    let mut fixture = Fixture::new(b"");
    fixture.config.cursor = CursorMode::Strict;
    let mut tape = TapeMachine::with_config(&fixture.config);
    let err = fixture.run("+.>+.<<+.", &mut tape).unwrap_err();
    assert!(matches!(err, Error::CursorOutOfRange { cursor: 1, delta: -2, capacity: 1024 }));
    assert_eq!(fixture.output(), vec![1, 1]);
    assert_eq!(tape.cursor(), 1);
}

#[test]
fn test_configured_output_descriptor_used_by_both_engines() {
    let mut fixture = Fixture::new(b"");
    for engine in [Engine::Interpreter, Engine::Jit] {
        let mut tape = TapeMachine::with_config(&fixture.config);
        tapejit::run_on(Program::new(ADD_TWO_CELLS), engine, &fixture.config, &mut tape).unwrap();
    }
    assert_eq!(fixture.output(), vec![7, 7]);
}

#[test]
fn test_configured_input_descriptor_shared_by_both_engines() {
    let mut fixture = Fixture::new(b"abc");
    let mut tape = TapeMachine::with_config(&fixture.config);
    tapejit::run_on(Program::new(",."), Engine::Interpreter, &fixture.config, &mut tape).unwrap();
    tapejit::run_on(Program::new(",."), Engine::Jit, &fixture.config, &mut tape).unwrap();
    tapejit::run_on(Program::new(",."), Engine::Interpreter, &fixture.config, &mut tape).unwrap();
    assert_eq!(fixture.output(), b"abc");
}

#[test]
fn test_resumes_from_cursor() {
    let mut fixture = Fixture::new(b"");
    let mut tape = TapeMachine::with_config(&fixture.config);
    fixture.run(">>>+", &mut tape).unwrap();
    assert_eq!(tape.cursor(), 3);
    fixture.run(">++.", &mut tape).unwrap();
    assert_eq!(tape.cursor(), 4);
    assert_eq!(&tape.cells()[..5], &[0, 0, 0, 1, 2]);
    assert_eq!(fixture.output(), vec![2]);
}

#[test]
fn test_malformed_programs_are_rejected() {
    let mut fixture = Fixture::new(b"");
    let mut tape = TapeMachine::with_config(&fixture.config);
    assert!(matches!(
        fixture.run("]", &mut tape).unwrap_err(),
        Error::UnmatchedClose { offset: 0 }
    ));
    assert!(matches!(
        fixture.run("+[", &mut tape).unwrap_err(),
        Error::UnclosedLoop { offset: 1 }
    ));
    // Nothing ran.
    assert_eq!(tape.get(), 0);
    assert!(fixture.output().is_empty());
}

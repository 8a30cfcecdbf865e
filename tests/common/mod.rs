// common/mod.rs - Programs shared by the integration tests

#![allow(dead_code)]

pub const ADD_TWO_CELLS: &str = "++>+++++[<+>-]<.";

pub const ECHO: &str = ",.";

pub const HELLO_WORLD: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

/// Copies input to output until end of input.
pub const CAT: &str = ",[.[-],]";

/// Leaves 5, 12 and 24 in cells 1, 2 and 3 through loops nested 1, 2 and 3 deep.
pub const DEPTH_ONE: &str = "+++++[>+<-]";
pub const DEPTH_TWO: &str = "+++[>++++[>+<-]<-]";
pub const DEPTH_THREE: &str = "++[>+++[>++++[>+<-]<-]<-]";

/// Inner loop empties cell 0, so the outer closer's test is redundant.
pub const ADJACENT_CLOSERS: &str = "+++[[->+<]]>.";

/// Spread the instructions of `source` out with whitespace and comments.
pub fn with_noise(source: &str) -> String {
    let mut out = String::new();
    for (i, c) in source.chars().enumerate() {
        out.push(c);
        match i % 3 {
            0 => out.push(' '),
            1 => out.push_str("\n\t"),
            _ => out.push_str(" note "),
        }
    }
    out
}

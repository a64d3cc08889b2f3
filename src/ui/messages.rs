//! One-line status output for CLI handlers.
//!
//! `info` and `success` go to stdout; `warning` and `error` go to stderr so
//! `run --json` keeps a clean stdout.

use std::fmt;

use crate::utils::colors::{CYAN, GREEN, RED, RESET, YELLOW};

const BOLD: &str = "\x1b[1m";

fn tagged(color: &str, tag: &str, msg: impl fmt::Display) -> String {
    format!("{color}{BOLD}{tag}{RESET} {msg}")
}

pub fn info<T: fmt::Display>(msg: T) {
    println!("{}", tagged(CYAN, "ℹ️", msg));
}

pub fn success<T: fmt::Display>(msg: T) {
    println!("{}", tagged(GREEN, "✅", msg));
}

pub fn warning<T: fmt::Display>(msg: T) {
    eprintln!("{}", tagged(YELLOW, "⚠️", msg));
}

pub fn error<T: fmt::Display>(msg: T) {
    eprintln!("{}", tagged(RED, "❌", msg));
}

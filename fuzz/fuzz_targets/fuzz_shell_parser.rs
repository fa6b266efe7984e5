//! Fuzz target: shell line parser
//!
//! Feeds arbitrary telnet input through `parse` and checks:
//! - No panics on any byte sequence
//! - A parsed command's name is one of `COMMANDS`
//! - Every suggestion offered is a real command
//!
//! cargo fuzz run fuzz_shell_parser

#![no_main]

use greenhouse::shell::parser::{parse, COMMANDS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);

    match parse(&line) {
        Ok(_) => {
            let name = line.split_whitespace().next().unwrap_or_default();
            assert!(
                COMMANDS.iter().any(|c| c.name == name),
                "parsed an unknown command name {name:?}"
            );
        }
        Err(e) => {
            if let Some(hint) = e.suggestion() {
                assert!(COMMANDS.iter().any(|c| c.name == hint), "bogus hint {hint:?}");
            }
            // Error text must render without panicking.
            let _ = e.to_string();
        }
    }
});

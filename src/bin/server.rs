//! gpt-chat server binary.
//! Run with: cargo run --bin gpt-chat-server

use std::process::ExitCode;

use gpt_chat::start_gpt_chat;

fn main() -> ExitCode {
    start_gpt_chat::run()
}

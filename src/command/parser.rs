//! Parsing of inbound chat command lines.
//!
//! Grammar: `chat [-n|--new] <msg>`, `image <prompt>`, `help`. A leading `/` on the
//! command name is accepted. A quote (`"`, `“…”` or `'`) only counts when it opens a
//! word and has a matching close; anywhere else quotes and backslashes are literal text.
//! Unquoted trailing words are joined with single spaces, so `chat hello there` and
//! `chat "hello there"` carry the same message.

use thiserror::Error;

/// Usage text shown next to parse errors and for `help`.
pub const USAGE: &str = "usage: chat [-n|--new] <msg>  (wrap messages with spaces in double quotes)\n       image <prompt>";

/// Errors produced while parsing a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Nothing but whitespace.
    #[error("empty command")]
    Empty,
    /// Command name not recognized.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// Option not recognized.
    #[error("unknown option: {0}")]
    UnknownOption(String),
    /// Required argument absent.
    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),
}

/// A `chat` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatCommand {
    /// Message for the model.
    pub message: String,
    /// Start a new conversation before sending.
    pub force_new: bool,
}

/// A parsed command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Continue or start a conversation.
    Chat(ChatCommand),
    /// Generate an image.
    Image {
        /// Image description.
        prompt: String,
    },
    /// Show usage.
    Help,
}

/// Parse a raw command line.
///
/// # Errors
/// Returns a `CommandError` for unknown commands or options and missing arguments.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = tokenize(line).into_iter();
    let name = words.next().ok_or(CommandError::Empty)?;

    match name.text.trim_start_matches('/') {
        "chat" => parse_chat(words).map(Command::Chat),
        "image" => {
            let prompt = join_words(words.map(|word| word.text));
            if prompt.is_empty() {
                return Err(CommandError::MissingArgument("prompt"));
            }
            Ok(Command::Image { prompt })
        }
        "help" => Ok(Command::Help),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// One word of a command line.
#[derive(Debug, PartialEq, Eq)]
struct Word {
    text: String,
    /// Opened with a quote; never read as an option.
    quoted: bool,
}

const fn closing_quote(open: char) -> Option<char> {
    match open {
        '"' => Some('"'),
        '\'' => Some('\''),
        '“' => Some('”'),
        _ => None,
    }
}

/// Split a line into words on whitespace.
///
/// A word that starts with a quote and has a matching close runs up to that close,
/// spaces included. An unmatched opening quote is kept as text.
fn tokenize(line: &str) -> Vec<Word> {
    let chars: Vec<char> = line.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let quoted = closing_quote(chars[i]).and_then(|close| {
            chars[i + 1..]
                .iter()
                .position(|&ch| ch == close)
                .map(|offset| i + 1 + offset)
        });
        if let Some(end) = quoted {
            words.push(Word {
                text: chars[i + 1..end].iter().collect(),
                quoted: true,
            });
            i = end + 1;
            continue;
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        words.push(Word {
            text: chars[start..i].iter().collect(),
            quoted: false,
        });
    }

    words
}

fn parse_chat(words: impl Iterator<Item = Word>) -> Result<ChatCommand, CommandError> {
    let mut force_new = false;
    let mut rest = Vec::new();
    let mut options_done = false;

    for word in words {
        if options_done || word.quoted || !word.text.starts_with('-') || word.text == "-" {
            options_done = true;
            rest.push(word.text);
            continue;
        }
        match word.text.as_str() {
            "-n" | "--new" => force_new = true,
            "--" => options_done = true,
            _ => return Err(CommandError::UnknownOption(word.text)),
        }
    }

    let message = join_words(rest.into_iter());
    if message.is_empty() {
        return Err(CommandError::MissingArgument("msg"));
    }
    Ok(ChatCommand { message, force_new })
}

fn join_words(words: impl Iterator<Item = String>) -> String {
    words.collect::<Vec<_>>().join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(message: &str, force_new: bool) -> Command {
        Command::Chat(ChatCommand {
            message: message.to_string(),
            force_new,
        })
    }

    #[test]
    fn parses_plain_chat() {
        assert_eq!(parse_command("chat hello"), Ok(chat("hello", false)));
    }

    #[test]
    fn quoted_and_unquoted_messages_match() {
        assert_eq!(
            parse_command("chat \"how are you\""),
            Ok(chat("how are you", false))
        );
        assert_eq!(parse_command("chat how are you"), Ok(chat("how are you", false)));
    }

    #[test]
    fn new_flag_in_short_and_long_form() {
        assert_eq!(parse_command("chat -n hi"), Ok(chat("hi", true)));
        assert_eq!(parse_command("/chat --new hi"), Ok(chat("hi", true)));
    }

    #[test]
    fn options_stop_at_first_message_word() {
        assert_eq!(
            parse_command("chat what does -n mean"),
            Ok(chat("what does -n mean", false))
        );
        assert_eq!(parse_command("chat -- -n"), Ok(chat("-n", false)));
    }

    #[test]
    fn reports_errors() {
        assert_eq!(parse_command("   "), Err(CommandError::Empty));
        assert_eq!(
            parse_command("chat -n"),
            Err(CommandError::MissingArgument("msg"))
        );
        assert_eq!(
            parse_command("chat -x hi"),
            Err(CommandError::UnknownOption("-x".to_string()))
        );
        assert_eq!(
            parse_command("draw cat"),
            Err(CommandError::UnknownCommand("draw".to_string()))
        );
    }

    #[test]
    fn apostrophes_inside_words_are_text() {
        assert_eq!(
            parse_command("chat don't forget"),
            Ok(chat("don't forget", false))
        );
        assert_eq!(
            parse_command("chat it's Sam's turn"),
            Ok(chat("it's Sam's turn", false))
        );
    }

    #[test]
    fn backslashes_are_kept() {
        assert_eq!(
            parse_command(r"chat C:\temp\file"),
            Ok(chat(r"C:\temp\file", false))
        );
    }

    #[test]
    fn curly_and_single_quotes_group_words() {
        assert_eq!(
            parse_command("chat “hello there”"),
            Ok(chat("hello there", false))
        );
        assert_eq!(
            parse_command("chat -n 'hello there'"),
            Ok(chat("hello there", true))
        );
    }

    #[test]
    fn unmatched_quote_is_text() {
        assert_eq!(
            parse_command("chat \"unterminated"),
            Ok(chat("\"unterminated", false))
        );
        assert_eq!(parse_command("chat 'tis fine"), Ok(chat("'tis fine", false)));
    }

    #[test]
    fn quoted_dash_is_message_not_option() {
        assert_eq!(parse_command("chat \"-n\""), Ok(chat("-n", false)));
        assert_eq!(
            parse_command("chat \"--verbose please\""),
            Ok(chat("--verbose please", false))
        );
    }

    #[test]
    fn parses_image_and_help() {
        assert_eq!(
            parse_command("image a red fox"),
            Ok(Command::Image {
                prompt: "a red fox".to_string()
            })
        );
        assert_eq!(
            parse_command("image"),
            Err(CommandError::MissingArgument("prompt"))
        );
        assert_eq!(parse_command("help"), Ok(Command::Help));
    }
}

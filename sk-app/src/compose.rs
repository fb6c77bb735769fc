//! Prompt composition and the advisory reply-format check.

use sk_llm::ChatMessage;
use sk_store::{Character, Store};

/// Fixed output-format directive appended to every system message.
const FORMAT_DIRECTIVE: &str = "Format your answer as:\n\
    - one introduction line of at most 12 words;\n\
    - 3 to 5 numbered points;\n\
    - one closing line of at most 20 words.";

const MIN_POINTS: usize = 3;
const MAX_POINTS: usize = 5;
const MAX_INTRO_WORDS: usize = 12;
const MAX_CLOSING_WORDS: usize = 20;

/// Build the `[system, user]` pair for an already-resolved character. Pure.
pub fn build_messages_for_character(character: &Character, question: &str) -> Vec<ChatMessage> {
    let system = format!(
        "You are {}.\n{}\n\n{FORMAT_DIRECTIVE}",
        character.name, character.prompt
    );
    vec![ChatMessage::system(system), ChatMessage::user(question)]
}

/// Resolve the owner's character (falling back to the store's default) and
/// compose the message list. The only store access here is this read.
pub fn build_messages(
    store: &Store,
    owner: i64,
    question: &str,
) -> sk_store::Result<Vec<ChatMessage>> {
    let character = store.get_user_character(owner)?;
    Ok(build_messages_for_character(&character, question))
}

/// Heuristic check that a reply follows the format directive: short intro
/// line, 3-5 numbered points, short closing line.
///
/// Advisory only. Used in tests and logging, never to block a send.
pub fn looks_formatted(text: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() < 3 {
        return false;
    }

    if lines[0].split_whitespace().count() > MAX_INTRO_WORDS {
        return false;
    }

    let points = lines[1..lines.len() - 1]
        .iter()
        .filter(|line| starts_with_numeric_marker(line))
        .count();
    if !(MIN_POINTS..=MAX_POINTS).contains(&points) {
        return false;
    }

    lines[lines.len() - 1].split_whitespace().count() <= MAX_CLOSING_WORDS
}

/// Digits optionally followed by `.` or `)` count as a list marker. A line
/// that merely opens with a number ("2024 was a year") does not.
fn starts_with_numeric_marker(line: &str) -> bool {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return false;
    }
    rest.is_empty() || rest.starts_with('.') || rest.starts_with(')')
}

//! Chat command parser: raw message text to a typed `Command`.
//!
//! Parsing never touches the store or the network; malformed arguments
//! become `Command::Invalid` with a usage hint for the user.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    About,
    Ping,
    NoteAdd(String),
    NoteList,
    NoteFind(String),
    NoteEdit { id: i64, text: String },
    NoteDel(i64),
    NoteCount,
    Characters,
    SetCharacter(i64),
    Models,
    SetModel(i64),
    Ask(String),
    Weather,
    Sum(String),
    Max(String),
    Show,
    Hide,
    /// Recognized command with malformed arguments; payload is the usage hint.
    Invalid(String),
    Unknown,
}

pub fn parse(text: &str) -> Command {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Unknown;
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    // Telegram appends "@BotName" to commands in group chats.
    let name = name.split('@').next().unwrap_or(name);

    match name {
        "start" => Command::Start,
        "help" => Command::Help,
        "about" => Command::About,
        "ping" => Command::Ping,
        "note_add" => require_text(args, "/note_add <text>", Command::NoteAdd),
        "note_list" => Command::NoteList,
        "note_find" => require_text(args, "/note_find <query>", Command::NoteFind),
        "note_edit" => parse_note_edit(args),
        "note_del" => require_id(args, "/note_del <id>", Command::NoteDel),
        "note_count" => Command::NoteCount,
        "characters" => Command::Characters,
        "character" => require_id(args, "/character <id>", Command::SetCharacter),
        "models" => Command::Models,
        "model" => require_id(args, "/model <id>", Command::SetModel),
        "ask" => require_text(args, "/ask <question>", Command::Ask),
        "weather" => Command::Weather,
        "sum" => Command::Sum(args.to_string()),
        "max" => Command::Max(args.to_string()),
        "show" => Command::Show,
        "hide" => Command::Hide,
        _ => Command::Unknown,
    }
}

fn require_text(args: &str, usage: &str, build: impl FnOnce(String) -> Command) -> Command {
    if args.is_empty() {
        Command::Invalid(format!("Usage: {usage}"))
    } else {
        build(args.to_string())
    }
}

fn require_id(args: &str, usage: &str, build: impl FnOnce(i64) -> Command) -> Command {
    match args.parse::<i64>() {
        Ok(id) => build(id),
        Err(_) => Command::Invalid(format!("The id must be a number. Usage: {usage}")),
    }
}

fn parse_note_edit(args: &str) -> Command {
    const USAGE: &str = "/note_edit <id> <new text>";
    let Some((id, text)) = args.split_once(char::is_whitespace) else {
        return Command::Invalid(format!("Usage: {USAGE}"));
    };
    let text = text.trim();
    match id.parse::<i64>() {
        Ok(id) if !text.is_empty() => Command::NoteEdit {
            id,
            text: text.to_string(),
        },
        Ok(_) => Command::Invalid(format!("Usage: {USAGE}")),
        Err(_) => Command::Invalid(format!("The id must be a number. Usage: {USAGE}")),
    }
}

/// Pull whole numbers out of free-form text: commas count as separators and
/// command tokens (leading `/`) are ignored.
pub fn parse_ints(text: &str) -> Vec<i64> {
    text.replace(',', " ")
        .split_whitespace()
        .filter(|token| !token.starts_with('/'))
        .filter_map(|token| token.parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_commands_parse() {
        assert_eq!(parse("/start"), Command::Start);
        assert_eq!(parse("  /ping  "), Command::Ping);
        assert_eq!(parse("/note_list"), Command::NoteList);
        assert_eq!(parse("/models"), Command::Models);
        assert_eq!(parse("/hide"), Command::Hide);
    }

    #[test]
    fn group_chat_suffix_is_stripped() {
        assert_eq!(parse("/help@SidekickBot"), Command::Help);
        assert_eq!(
            parse("/note_add@SidekickBot milk"),
            Command::NoteAdd("milk".to_string())
        );
    }

    #[test]
    fn arguments_are_trimmed() {
        assert_eq!(
            parse("/note_add   padded text  "),
            Command::NoteAdd("padded text".to_string())
        );
        assert_eq!(
            parse("/ask What is an API?"),
            Command::Ask("What is an API?".to_string())
        );
    }

    #[test]
    fn missing_arguments_yield_usage_hints() {
        assert!(matches!(parse("/note_add"), Command::Invalid(_)));
        assert!(matches!(parse("/note_find  "), Command::Invalid(_)));
        assert!(matches!(parse("/ask"), Command::Invalid(_)));
        assert!(matches!(parse("/note_edit 3"), Command::Invalid(_)));
    }

    #[test]
    fn non_numeric_ids_are_invalid_not_unknown() {
        let cmd = parse("/note_del abc");
        let Command::Invalid(hint) = cmd else {
            panic!("expected Invalid, got {cmd:?}");
        };
        assert!(hint.contains("number"));
        assert!(matches!(parse("/character x"), Command::Invalid(_)));
        assert!(matches!(parse("/model"), Command::Invalid(_)));
    }

    #[test]
    fn note_edit_splits_id_and_text() {
        assert_eq!(
            parse("/note_edit 7 new   text"),
            Command::NoteEdit {
                id: 7,
                text: "new   text".to_string()
            }
        );
    }

    #[test]
    fn plain_text_is_unknown() {
        assert_eq!(parse("hello there"), Command::Unknown);
        assert_eq!(parse(""), Command::Unknown);
        assert_eq!(parse("/definitely_not_a_command"), Command::Unknown);
    }

    #[test]
    fn ints_are_extracted_from_free_text() {
        assert_eq!(parse_ints("2, 3 10"), vec![2, 3, 10]);
        assert_eq!(parse_ints("-5 and 12"), vec![-5, 12]);
        assert_eq!(parse_ints("/sum 1 2"), vec![1, 2]);
        assert!(parse_ints("no numbers here").is_empty());
        assert!(parse_ints("-").is_empty());
    }
}

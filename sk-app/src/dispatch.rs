//! Command dispatch: one typed `Command` in, one `Reply` out.
//!
//! All user-facing wording lives here. Store and completion errors are
//! rendered as corrective messages; nothing in this module retries or panics
//! on user input.

use crate::commands::{self, Command};
use crate::compose;
use crate::context::AppContext;
use crate::weather;
use sk_channels::{Keyboard, Reply};
use sk_store::{MAX_NOTES_PER_OWNER, StoreError};

const HELP_TEXT: &str = "Commands:\n\
    /note_add <text> - add a note\n\
    /note_list - list your notes\n\
    /note_find <query> - search your notes\n\
    /note_edit <id> <text> - edit a note\n\
    /note_del <id> - delete a note\n\
    /note_count - how many notes you hold\n\
    /characters - list personas\n\
    /character <id> - pick your persona\n\
    /models - list models\n\
    /model <id> - switch the active model\n\
    /ask <question> - ask the assistant\n\
    /weather - current weather in Moscow\n\
    /sum <numbers> - add numbers\n\
    /max <numbers> - largest number\n\
    /show and /hide - toggle the keyboard";

const ABOUT_TEXT: &str = "Sidekick is a small personal assistant: it keeps your \
    notes, lets you pick a persona and a model, and answers questions through \
    OpenRouter.";

/// Handle one inbound command for `owner` and produce the reply to send back.
#[tracing::instrument(level = "debug", skip(ctx, text))]
pub async fn handle(ctx: &AppContext, owner: i64, text: &str) -> Reply {
    match commands::parse(text) {
        Command::Start => Reply::text(
            "Hi! I'm Sidekick, your note-taking assistant. Send /help for the command list.",
        ),
        Command::Help => Reply::text(HELP_TEXT),
        Command::About => Reply::text(ABOUT_TEXT),
        Command::Ping => Reply::text("pong"),

        Command::NoteAdd(note_text) => note_add(ctx, owner, &note_text),
        Command::NoteList => note_list(ctx, owner),
        Command::NoteFind(query) => note_find(ctx, owner, &query),
        Command::NoteEdit { id, text } => note_edit(ctx, owner, id, &text),
        Command::NoteDel(id) => note_del(ctx, owner, id),
        Command::NoteCount => note_count(ctx, owner),

        Command::Characters => characters(ctx, owner),
        Command::SetCharacter(id) => set_character(ctx, owner, id),
        Command::Models => models(ctx),
        Command::SetModel(id) => set_model(ctx, id),

        Command::Ask(question) => ask(ctx, owner, &question).await,
        Command::Weather => Reply::text(weather::moscow_now(&ctx.http).await),
        Command::Sum(args) => sum(&args),
        Command::Max(args) => max(&args),

        Command::Show => Reply::with_keyboard("Here you go:", main_keyboard()),
        Command::Hide => Reply::with_keyboard("Keyboard hidden. Bring it back with /show.", Keyboard::Remove),

        Command::Invalid(hint) => Reply::text(hint),
        Command::Unknown => Reply::text("I don't know that one. Send /help for the command list."),
    }
}

fn main_keyboard() -> Keyboard {
    Keyboard::Show(vec![
        vec!["/help".into(), "/about".into(), "/weather".into()],
        vec!["/note_list".into(), "/note_count".into(), "/hide".into()],
    ])
}

fn note_add(ctx: &AppContext, owner: i64, text: &str) -> Reply {
    let id = match ctx.store.add_note(owner, text) {
        Ok(id) => id,
        Err(e) => return render_store_error(e),
    };
    let held = ctx.store.note_count(owner).unwrap_or_default();
    Reply::text(format!(
        "Note #{id} added: {}\nYou hold {held}/{MAX_NOTES_PER_OWNER} notes.",
        text.trim()
    ))
}

fn note_list(ctx: &AppContext, owner: i64) -> Reply {
    match ctx.store.list_notes(owner) {
        Ok(notes) if notes.is_empty() => Reply::text("No notes yet. Add one with /note_add."),
        Ok(notes) => Reply::text(format!("Your notes:\n{}", format_notes(&notes))),
        Err(e) => render_store_error(e),
    }
}

fn note_find(ctx: &AppContext, owner: i64, query: &str) -> Reply {
    match ctx.store.find_notes(owner, query) {
        Ok(notes) if notes.is_empty() => Reply::text("No notes match that query."),
        Ok(notes) => Reply::text(format!("Found:\n{}", format_notes(&notes))),
        Err(e) => render_store_error(e),
    }
}

fn note_edit(ctx: &AppContext, owner: i64, id: i64, text: &str) -> Reply {
    match ctx.store.update_note(owner, id, text) {
        Ok(true) => Reply::text(format!("Note #{id} is now: {}", text.trim())),
        Ok(false) => Reply::text(format!("Note #{id} not found.")),
        Err(e) => render_store_error(e),
    }
}

fn note_del(ctx: &AppContext, owner: i64, id: i64) -> Reply {
    match ctx.store.delete_note(owner, id) {
        Ok(true) => Reply::text(format!("Note #{id} deleted.")),
        Ok(false) => Reply::text(format!("Note #{id} not found.")),
        Err(e) => render_store_error(e),
    }
}

fn note_count(ctx: &AppContext, owner: i64) -> Reply {
    match ctx.store.note_count(owner) {
        Ok(held) => Reply::text(format!("You hold {held}/{MAX_NOTES_PER_OWNER} notes.")),
        Err(e) => render_store_error(e),
    }
}

fn format_notes(notes: &[sk_store::Note]) -> String {
    notes
        .iter()
        .map(|note| format!("{}: {}", note.id, note.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn characters(ctx: &AppContext, owner: i64) -> Reply {
    let current = match ctx.store.get_user_character(owner) {
        Ok(current) => current,
        Err(e) => return render_store_error(e),
    };
    match ctx.store.list_characters() {
        Ok(list) => {
            let lines: Vec<String> = list
                .iter()
                .map(|c| {
                    let marker = if c.id == current.id { "* " } else { "  " };
                    format!("{marker}{}: {}", c.id, c.name)
                })
                .collect();
            Reply::text(format!(
                "Personas (* = yours), pick with /character <id>:\n{}",
                lines.join("\n")
            ))
        }
        Err(e) => render_store_error(e),
    }
}

fn set_character(ctx: &AppContext, owner: i64, id: i64) -> Reply {
    if let Err(e) = ctx.store.set_user_character(owner, id) {
        return render_store_error(e);
    }
    match ctx.store.get_user_character(owner) {
        Ok(character) => Reply::text(format!("Your persona is now {}.", character.name)),
        Err(e) => render_store_error(e),
    }
}

fn models(ctx: &AppContext) -> Reply {
    match ctx.store.list_models() {
        Ok(list) => {
            let lines: Vec<String> = list
                .iter()
                .map(|m| {
                    let marker = if m.active { "* " } else { "  " };
                    format!("{marker}{}: {} ({})", m.id, m.label, m.key)
                })
                .collect();
            Reply::text(format!(
                "Models (* = active), switch with /model <id>:\n{}",
                lines.join("\n")
            ))
        }
        Err(e) => render_store_error(e),
    }
}

fn set_model(ctx: &AppContext, id: i64) -> Reply {
    if let Err(e) = ctx.store.set_active_model(id) {
        return render_store_error(e);
    }
    match ctx.store.get_active_model() {
        Ok(model) => Reply::text(format!("Active model is now {}.", model.label)),
        Err(e) => render_store_error(e),
    }
}

async fn ask(ctx: &AppContext, owner: i64, question: &str) -> Reply {
    let messages = match compose::build_messages(&ctx.store, owner, question) {
        Ok(messages) => messages,
        Err(e) => return render_store_error(e),
    };
    let model = match ctx.store.get_active_model() {
        Ok(model) => model,
        Err(e) => return render_store_error(e),
    };

    match ctx.llm.chat_once(&messages, &model.key).await {
        Ok((text, elapsed_ms)) => {
            tracing::info!(
                owner,
                elapsed_ms,
                model = %model.key,
                formatted = compose::looks_formatted(&text),
                "completion served"
            );
            Reply::text(text)
        }
        // Terminal for this call; the code+message goes straight to the user.
        Err(e) => {
            tracing::warn!(%e, model = %model.key, "completion failed");
            Reply::text(e.to_string())
        }
    }
}

fn sum(args: &str) -> Reply {
    let nums = commands::parse_ints(args);
    if nums.is_empty() {
        return Reply::text("I see no numbers. Example: /sum 2 3 10");
    }
    match nums.iter().try_fold(0i64, |acc, n| acc.checked_add(*n)) {
        Some(total) => Reply::text(format!("Sum: {total}")),
        None => Reply::text("Those numbers are too large to add up."),
    }
}

fn max(args: &str) -> Reply {
    let nums = commands::parse_ints(args);
    match nums.iter().max() {
        Some(max) => Reply::text(format!("Maximum: {max}")),
        None => Reply::text("I see no numbers. Example: /max 2 3 10"),
    }
}

fn render_store_error(err: StoreError) -> Reply {
    match err {
        StoreError::Validation(msg) => Reply::text(format!("Error: {msg}.")),
        StoreError::UnknownReference { entity, id } => Reply::text(format!(
            "Unknown {entity} id {id}. Send /{entity}s to see the valid ids."
        )),
        other => {
            tracing::error!(%other, "store operation failed");
            Reply::text("Something went wrong on my side, please try again.")
        }
    }
}

use crate::error::{Result, StoreError};
use crate::types::{Character, Model, Note};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Hard cap on notes held by one owner. Checked and inserted inside a single
/// transaction, so concurrent additions from the same user cannot exceed it.
pub const MAX_NOTES_PER_OWNER: i64 = 50;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS notes (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    owner INTEGER NOT NULL,
    text  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notes_owner ON notes(owner);

CREATE TABLE IF NOT EXISTS characters (
    id     INTEGER PRIMARY KEY,
    name   TEXT NOT NULL UNIQUE,
    prompt TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS models (
    id     INTEGER PRIMARY KEY,
    key    TEXT NOT NULL UNIQUE,
    label  TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user_character (
    owner        INTEGER PRIMARY KEY,
    character_id INTEGER NOT NULL REFERENCES characters(id)
);
";

/// Seed rows carry fixed ids so re-running initialization is a no-op.
const SEED_CHARACTERS: &[(i64, &str, &str)] = &[
    (
        1,
        "Sage",
        "You are a calm, patient mentor. Explain things simply, without jargon, \
         and prefer concrete examples over abstractions.",
    ),
    (
        2,
        "Professor",
        "You are a rigorous university professor. Be precise, cite definitions, \
         and point out common misconceptions.",
    ),
    (
        3,
        "Pirate",
        "You are a good-natured pirate captain. Answer accurately but salt your \
         speech with nautical slang.",
    ),
    (
        4,
        "Buddy",
        "You are an upbeat friend. Keep answers casual, encouraging and short.",
    ),
];

const SEED_MODELS: &[(i64, &str, &str, bool)] = &[
    (1, "openai/gpt-4o-mini", "GPT-4o mini", true),
    (2, "anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet", false),
    (3, "meta-llama/llama-3.1-8b-instruct", "Llama 3.1 8B", false),
];

/// Handle on the local SQLite file. One connection behind a mutex; every
/// method takes `&self` and returns owned values.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if absent) the database at `path`, apply the schema and
    /// seed characters/models. Safe to call against an existing store: seed
    /// rows use fixed ids and `INSERT OR IGNORE`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        for (id, name, prompt) in SEED_CHARACTERS {
            tx.execute(
                "INSERT OR IGNORE INTO characters (id, name, prompt) VALUES (?1, ?2, ?3)",
                params![id, name, prompt],
            )?;
        }
        for (id, key, label, active) in SEED_MODELS {
            tx.execute(
                "INSERT OR IGNORE INTO models (id, key, label, active) VALUES (?1, ?2, ?3, ?4)",
                params![id, key, label, active],
            )?;
        }
        tx.commit()?;
        tracing::debug!("store initialized");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-call; the
        // connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- notes ---

    /// Insert a note for `owner`, returning its store-assigned id.
    ///
    /// Fails with `Validation` if the text trims to empty or the owner already
    /// holds `MAX_NOTES_PER_OWNER` notes. Count and insert share a transaction.
    pub fn add_note(&self, owner: i64, text: &str) -> Result<i64> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::Validation("note text is empty".to_string()));
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let held: i64 = tx.query_row(
            "SELECT COUNT(*) FROM notes WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        if held >= MAX_NOTES_PER_OWNER {
            return Err(StoreError::Validation(format!(
                "note limit reached ({MAX_NOTES_PER_OWNER} per user)"
            )));
        }
        tx.execute(
            "INSERT INTO notes (owner, text) VALUES (?1, ?2)",
            params![owner, text],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// All notes owned by `owner`, in insertion order.
    pub fn list_notes(&self, owner: i64) -> Result<Vec<Note>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT id, owner, text FROM notes WHERE owner = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![owner], note_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// ASCII case-insensitive substring match over `text`, scoped to `owner`.
    pub fn find_notes(&self, owner: i64, query: &str) -> Result<Vec<Note>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner, text FROM notes
             WHERE owner = ?1 AND instr(lower(text), lower(?2)) > 0
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![owner, query], note_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Replace the text of the owner's note. Returns `false` when no note with
    /// that id belongs to `owner`; ownership is enforced by the lookup scope.
    pub fn update_note(&self, owner: i64, note_id: i64, new_text: &str) -> Result<bool> {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            return Err(StoreError::Validation("note text is empty".to_string()));
        }
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE notes SET text = ?3 WHERE owner = ?1 AND id = ?2",
            params![owner, note_id, new_text],
        )?;
        Ok(changed > 0)
    }

    /// Same not-found/not-owned contract as `update_note`.
    pub fn delete_note(&self, owner: i64, note_id: i64) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "DELETE FROM notes WHERE owner = ?1 AND id = ?2",
            params![owner, note_id],
        )?;
        Ok(changed > 0)
    }

    pub fn note_count(&self, owner: i64) -> Result<i64> {
        let conn = self.lock();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?)
    }

    // --- characters ---

    pub fn list_characters(&self) -> Result<Vec<Character>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, name, prompt FROM characters ORDER BY id")?;
        let rows = stmt.query_map([], character_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The owner's assigned character, or the deterministic default (lowest
    /// seeded id) when no assignment exists. Never returns an absent value.
    pub fn get_user_character(&self, owner: i64) -> Result<Character> {
        let conn = self.lock();
        let assigned = conn
            .query_row(
                "SELECT c.id, c.name, c.prompt
                 FROM user_character uc JOIN characters c ON c.id = uc.character_id
                 WHERE uc.owner = ?1",
                params![owner],
                character_from_row,
            )
            .optional()?;
        if let Some(character) = assigned {
            return Ok(character);
        }
        conn.query_row(
            "SELECT id, name, prompt FROM characters ORDER BY id LIMIT 1",
            [],
            character_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::Inconsistent("no characters seeded".to_string()))
    }

    /// Assign `character_id` to `owner`, overwriting any previous assignment.
    /// A native upsert keyed on the unique `owner` column keeps the at-most-one
    /// row invariant under concurrent callers.
    pub fn set_user_character(&self, owner: i64, character_id: i64) -> Result<()> {
        let conn = self.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM characters WHERE id = ?1)",
            params![character_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::UnknownReference {
                entity: "character",
                id: character_id,
            });
        }
        conn.execute(
            "INSERT INTO user_character (owner, character_id) VALUES (?1, ?2)
             ON CONFLICT(owner) DO UPDATE SET character_id = excluded.character_id",
            params![owner, character_id],
        )?;
        Ok(())
    }

    // --- models ---

    pub fn list_models(&self) -> Result<Vec<Model>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, key, label, active FROM models ORDER BY id")?;
        let rows = stmt.query_map([], model_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Look a model up by its OpenRouter key, e.g. "openai/gpt-4o-mini".
    pub fn find_model_by_key(&self, key: &str) -> Result<Option<Model>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT id, key, label, active FROM models WHERE key = ?1",
                params![key],
                model_from_row,
            )
            .optional()?)
    }

    /// The single active model. A store with no active row is corrupt; that is
    /// surfaced as `Inconsistent`, not healed here.
    pub fn get_active_model(&self) -> Result<Model> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, key, label, active FROM models WHERE active = 1",
            [],
            model_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::Inconsistent("no active model".to_string()))
    }

    /// Activate `model_id`: clear-and-set inside one transaction so exactly
    /// one model stays active even under concurrent activations.
    pub fn set_active_model(&self, model_id: i64) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM models WHERE id = ?1)",
            params![model_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::UnknownReference {
                entity: "model",
                id: model_id,
            });
        }
        tx.execute("UPDATE models SET active = 0 WHERE active = 1", [])?;
        tx.execute(
            "UPDATE models SET active = 1 WHERE id = ?1",
            params![model_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        owner: row.get(1)?,
        text: row.get(2)?,
    })
}

fn character_from_row(row: &Row<'_>) -> rusqlite::Result<Character> {
    Ok(Character {
        id: row.get(0)?,
        name: row.get(1)?,
        prompt: row.get(2)?,
    })
}

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<Model> {
    Ok(Model {
        id: row.get(0)?,
        key: row.get(1)?,
        label: row.get(2)?,
        active: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().expect("open in-memory store")
    }

    #[test]
    fn added_note_shows_up_in_list() {
        let s = store();
        let id = s.add_note(7, "buy oat milk").expect("add");
        let notes = s.list_notes(7).expect("list");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, id);
        assert_eq!(notes[0].text, "buy oat milk");
        assert_eq!(notes[0].owner, 7);
    }

    #[test]
    fn note_text_is_trimmed_and_must_be_non_empty() {
        let s = store();
        let id = s.add_note(7, "  padded  ").expect("add");
        assert_eq!(s.list_notes(7).expect("list")[0].text, "padded");
        assert!(matches!(
            s.add_note(7, "   "),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            s.update_note(7, id, ""),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn note_limit_is_enforced_at_fifty() {
        let s = store();
        for i in 0..MAX_NOTES_PER_OWNER {
            s.add_note(1, &format!("note {i}")).expect("add under limit");
        }
        assert!(matches!(
            s.add_note(1, "one too many"),
            Err(StoreError::Validation(_))
        ));
        // Other owners are unaffected.
        s.add_note(2, "different owner").expect("add for other owner");
        assert_eq!(s.note_count(1).expect("count"), MAX_NOTES_PER_OWNER);
    }

    #[test]
    fn list_notes_preserves_insertion_order() {
        let s = store();
        let first = s.add_note(3, "first").expect("add");
        let second = s.add_note(3, "second").expect("add");
        let third = s.add_note(3, "third").expect("add");
        let ids: Vec<i64> = s.list_notes(3).expect("list").iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn find_notes_matches_substring_case_insensitively() {
        let s = store();
        s.add_note(5, "Call the Dentist").expect("add");
        s.add_note(5, "water the plants").expect("add");
        s.add_note(6, "dentist for someone else").expect("add");

        let found = s.find_notes(5, "dentist").expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Call the Dentist");
        assert!(s.find_notes(5, "garage").expect("find").is_empty());
    }

    #[test]
    fn update_and_delete_are_scoped_to_owner() {
        let s = store();
        let id = s.add_note(10, "mine").expect("add");

        assert!(!s.update_note(11, id, "stolen").expect("update other owner"));
        assert!(!s.delete_note(11, id).expect("delete other owner"));
        assert_eq!(s.list_notes(10).expect("list")[0].text, "mine");

        assert!(s.update_note(10, id, "mine, edited").expect("update"));
        assert_eq!(s.list_notes(10).expect("list")[0].text, "mine, edited");
        assert!(s.delete_note(10, id).expect("delete"));
        assert!(s.list_notes(10).expect("list").is_empty());
        assert!(!s.delete_note(10, id).expect("delete again"));
    }

    #[test]
    fn seeded_characters_are_unique_and_non_empty() {
        let s = store();
        let characters = s.list_characters().expect("list");
        assert!(characters.len() >= 2);

        let ids: Vec<i64> = characters.iter().map(|c| c.id).collect();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);
        for c in &characters {
            assert!(!c.name.is_empty());
            assert!(!c.prompt.is_empty());
        }
    }

    #[test]
    fn user_character_upsert_keeps_one_row() {
        let s = store();
        let characters = s.list_characters().expect("list");
        let (first, second) = (&characters[0], &characters[1]);

        s.set_user_character(123, first.id).expect("set first");
        assert_eq!(s.get_user_character(123).expect("get").id, first.id);

        s.set_user_character(123, second.id).expect("set second");
        assert_eq!(s.get_user_character(123).expect("get").id, second.id);

        let rows: i64 = s
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM user_character WHERE owner = ?1",
                params![123],
                |row| row.get(0),
            )
            .expect("count rows");
        assert_eq!(rows, 1);
    }

    #[test]
    fn set_user_character_rejects_unknown_id() {
        let s = store();
        let err = s.set_user_character(123, 999_999).expect_err("must fail");
        assert!(matches!(
            err,
            StoreError::UnknownReference {
                entity: "character",
                id: 999_999
            }
        ));
    }

    #[test]
    fn unassigned_owners_share_the_same_default_character() {
        let s = store();
        let lowest = s.list_characters().expect("list")[0].clone();

        let a = s.get_user_character(100_001).expect("get");
        let b = s.get_user_character(100_002).expect("get");
        let a_again = s.get_user_character(100_001).expect("get again");

        assert_eq!(a.id, lowest.id);
        assert_eq!(b.id, lowest.id);
        assert_eq!(a_again.id, lowest.id);
    }

    #[test]
    fn exactly_one_model_is_active_after_any_activation_sequence() {
        let s = store();
        let models = s.list_models().expect("list");
        assert!(models.len() >= 2);

        for m in [&models[0], &models[1], &models[0]] {
            s.set_active_model(m.id).expect("activate");
            assert_eq!(s.get_active_model().expect("get active").id, m.id);
            let active = s
                .list_models()
                .expect("list")
                .into_iter()
                .filter(|m| m.active)
                .count();
            assert_eq!(active, 1);
        }
    }

    #[test]
    fn models_are_found_by_key() {
        let s = store();
        let second = s.list_models().expect("list")[1].clone();

        let found = s
            .find_model_by_key(&second.key)
            .expect("lookup")
            .expect("seeded key must resolve");
        assert_eq!(found.id, second.id);
        assert!(
            s.find_model_by_key("vendor/does-not-exist")
                .expect("lookup")
                .is_none()
        );
    }

    #[test]
    fn set_active_model_rejects_unknown_id_and_keeps_previous() {
        let s = store();
        let before = s.get_active_model().expect("active");
        let err = s.set_active_model(999_999).expect_err("must fail");
        assert!(matches!(
            err,
            StoreError::UnknownReference {
                entity: "model",
                id: 999_999
            }
        ));
        assert_eq!(s.get_active_model().expect("active").id, before.id);
    }

    #[test]
    fn store_seeds_exactly_one_active_model() {
        let s = store();
        let active: Vec<Model> = s
            .list_models()
            .expect("list")
            .into_iter()
            .filter(|m| m.active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(s.get_active_model().expect("get").id, active[0].id);
    }

    #[test]
    fn reinitialization_does_not_duplicate_seed_rows() {
        let s = store();
        let characters_before = s.list_characters().expect("list").len();
        let models_before = s.list_models().expect("list").len();
        let active_before = s.get_active_model().expect("active").id;

        s.set_active_model(2).expect("activate non-default");
        s.initialize().expect("re-init");

        assert_eq!(s.list_characters().expect("list").len(), characters_before);
        assert_eq!(s.list_models().expect("list").len(), models_before);
        // Re-init must not flip the active model back either.
        assert_eq!(s.get_active_model().expect("active").id, 2);
        assert_ne!(active_before, 2);
    }

    #[test]
    fn missing_active_model_is_an_inconsistency() {
        let s = store();
        s.lock()
            .execute("UPDATE models SET active = 0", [])
            .expect("corrupt on purpose");
        assert!(matches!(
            s.get_active_model(),
            Err(StoreError::Inconsistent(_))
        ));
    }
}

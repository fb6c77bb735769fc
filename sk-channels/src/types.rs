/// One inbound text command, reduced to what command dispatch consumes:
/// who sent it, where to answer, and the raw text.
#[derive(Debug, Clone)]
pub struct InboundCommand {
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// Outbound reply text with optional keyboard markup.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Keyboard {
    /// Rows of one-tap reply buttons.
    Show(Vec<Vec<String>>),
    /// Remove any previously shown keyboard.
    Remove,
}

impl Keyboard {
    pub(crate) fn to_markup(&self) -> serde_json::Value {
        match self {
            Self::Show(rows) => serde_json::json!({
                "keyboard": rows,
                "resize_keyboard": true,
            }),
            Self::Remove => serde_json::json!({ "remove_keyboard": true }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Keyboard;

    #[test]
    fn show_markup_carries_rows_and_resize() {
        let kb = Keyboard::Show(vec![
            vec!["/help".to_string(), "/about".to_string()],
            vec!["/note_list".to_string()],
        ]);
        let markup = kb.to_markup();
        assert_eq!(markup["resize_keyboard"], true);
        assert_eq!(markup["keyboard"][0][1], "/about");
        assert_eq!(markup["keyboard"][1][0], "/note_list");
    }

    #[test]
    fn remove_markup_sets_remove_keyboard() {
        assert_eq!(Keyboard::Remove.to_markup()["remove_keyboard"], true);
    }
}

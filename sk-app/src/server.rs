//! Bootstrap and the sequential serve loop.

use crate::config::{self, SidekickConfig};
use crate::context::AppContext;
use crate::dispatch;
use sk_channels::TelegramBot;
use sk_llm::OpenRouterClient;
use sk_store::Store;
use std::path::PathBuf;
use tokio::sync::mpsc;

const INBOUND_QUEUE_DEPTH: usize = 64;

const CONFIG_TEMPLATE: &str = r#"# Sidekick configuration.
# Every value can also come from the environment:
#   TELEGRAM_BOT_TOKEN, OPENROUTER_API_KEY, SIDEKICK_MODEL, SIDEKICK_DB_PATH.

[general]
# db_path = "~/.sidekick/sidekick.db"
# completion_timeout_secs = 30
# model = "openai/gpt-4o-mini"

[keys]
# openrouter_api_key = "sk-or-..."

[telegram]
# bot_token = "123456:ABC..."
"#;

pub async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = SidekickConfig::load(config_path).await?;
    cfg.require_bot_token()?;

    ensure_parent_dir(&cfg.general.db_path).await?;
    let store = Store::open(&cfg.general.db_path)?;
    apply_model_override(&store, cfg.general.model.as_deref())?;
    let llm = OpenRouterClient::with_timeout(
        cfg.keys.openrouter_api_key.clone(),
        cfg.completion_timeout(),
    );
    if !llm.has_api_key() {
        tracing::warn!("no OpenRouter API key configured; /ask will answer with an error");
    }
    let ctx = AppContext::new(store, llm);
    let bot = TelegramBot::new(&cfg.telegram.bot_token)?;

    let (tx, mut rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
    bot.spawn_poll_loop(tx);
    tracing::info!(db = %cfg.general.db_path.display(), "sidekick serving");

    // One logical worker: commands are handled strictly in arrival order.
    while let Some(inbound) = rx.recv().await {
        let reply = dispatch::handle(&ctx, inbound.user_id, &inbound.text).await;
        if let Err(e) = bot.send(inbound.chat_id, &reply).await {
            tracing::error!(%e, chat_id = inbound.chat_id, "reply send failed");
        }
    }
    Err(anyhow::anyhow!("inbound queue closed"))
}

/// Create `~/.sidekick` with a config template and a seeded database.
/// Idempotent: an existing config file and existing seed rows are kept.
pub async fn init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let home = config::sidekick_home();
    tokio::fs::create_dir_all(&home)
        .await
        .map_err(|e| anyhow::anyhow!("create {}: {e}", home.display()))?;

    let path = config_path.unwrap_or_else(config::default_config_path);
    if tokio::fs::try_exists(&path).await? {
        println!("sidekick init: kept existing {}", path.display());
    } else {
        tokio::fs::write(&path, CONFIG_TEMPLATE).await?;
        println!("sidekick init: wrote {}", path.display());
    }

    let cfg = SidekickConfig::load(Some(path.clone())).await?;
    ensure_parent_dir(&cfg.general.db_path).await?;
    let store = Store::open(&cfg.general.db_path)?;
    println!(
        "database ready at {} ({} characters, {} models)",
        cfg.general.db_path.display(),
        store.list_characters()?.len(),
        store.list_models()?.len(),
    );
    println!("next: edit {} or export TELEGRAM_BOT_TOKEN", path.display());
    Ok(())
}

/// Activate the configured model key (config `general.model` or the
/// `SIDEKICK_MODEL` variable). An unknown key is a startup error; it means a
/// typo, and silently serving a different model would be worse.
fn apply_model_override(store: &Store, model_key: Option<&str>) -> anyhow::Result<()> {
    let Some(wanted) = model_key else {
        return Ok(());
    };
    let Some(model) = store.find_model_by_key(wanted)? else {
        let known: Vec<String> = store.list_models()?.into_iter().map(|m| m.key).collect();
        return Err(anyhow::anyhow!(
            "unknown model key {wanted:?}; known keys: {}",
            known.join(", ")
        ));
    };
    store.set_active_model(model.id)?;
    tracing::info!(model = %model.key, "active model set from configuration");
    Ok(())
}

async fn ensure_parent_dir(db_path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}

/// Validate the config and report store and key health.
pub async fn doctor(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = SidekickConfig::load(config_path).await?;

    match cfg.require_bot_token() {
        Ok(()) => println!("telegram bot token: configured"),
        Err(e) => println!("telegram bot token: MISSING ({e})"),
    }
    if cfg.keys.openrouter_api_key.is_some() {
        println!("openrouter api key: configured");
    } else {
        println!("openrouter api key: MISSING (/ask will answer with [401])");
    }

    ensure_parent_dir(&cfg.general.db_path).await?;
    let store = Store::open(&cfg.general.db_path)?;
    apply_model_override(&store, cfg.general.model.as_deref())?;
    let active = store.get_active_model()?;
    println!(
        "store at {}: {} characters, {} models, active model {} ({})",
        cfg.general.db_path.display(),
        store.list_characters()?.len(),
        store.list_models()?.len(),
        active.label,
        active.key,
    );
    Ok(())
}

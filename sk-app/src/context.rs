use sk_llm::OpenRouterClient;
use sk_store::Store;

/// Process-wide context, built once at startup and passed into dispatch.
/// Replaces any notion of module-level bot/store singletons; it is dropped
/// when the process exits.
pub struct AppContext {
    pub store: Store,
    pub llm: OpenRouterClient,
    /// Shared client for side calls (weather), separate from the completion
    /// client so its timeout stays independent.
    pub http: reqwest::Client,
}

impl AppContext {
    pub fn new(store: Store, llm: OpenRouterClient) -> Self {
        Self {
            store,
            llm,
            http: reqwest::Client::new(),
        }
    }
}

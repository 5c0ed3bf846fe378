use std::sync::Arc;

use crate::account::{AuthContext, SearchHistory};
use crate::backend::{
    AccountBackend, HttpAccountBackend, HttpLlmBackend, HttpSearchBackend, LlmBackend,
    SearchBackend,
};
use crate::config::Config;
use crate::session::{QueryRecorder, SearchSession, SessionBackends, SessionSettings};

/// Process-wide client state: config, HTTP backends, and the account context.
#[derive(Clone)]
pub struct ClientState {
    pub config: Config,
    pub search: Arc<dyn SearchBackend>,
    pub llm: Arc<dyn LlmBackend>,
    pub auth: Arc<AuthContext>,
    pub history: Arc<SearchHistory>,
}

impl ClientState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.request_timeout())
            .build()?;

        let search = Arc::new(HttpSearchBackend::new(
            http_client.clone(),
            &config.search_base_url,
        ));
        let llm = Arc::new(HttpLlmBackend::new(
            http_client.clone(),
            &config.search_base_url,
        ));
        let account: Arc<dyn AccountBackend> = Arc::new(HttpAccountBackend::new(
            http_client,
            &config.account_base_url,
        ));

        Ok(Self::with_backends(config, search, llm, account))
    }

    /// Assemble state around already-built backends.
    pub fn with_backends(
        config: Config,
        search: Arc<dyn SearchBackend>,
        llm: Arc<dyn LlmBackend>,
        account: Arc<dyn AccountBackend>,
    ) -> Self {
        let auth = Arc::new(AuthContext::new(account.clone(), config.session_path()));
        let history = Arc::new(SearchHistory::new(account, auth.clone()));
        Self {
            config,
            search,
            llm,
            auth,
            history,
        }
    }

    /// Restore the persisted login, if any, and load its history.
    pub async fn init(&self) {
        if self.auth.init().is_some() {
            self.history.refresh().await;
        }
    }

    /// A fresh search session recording queries into the user's history.
    pub fn session(&self) -> SearchSession {
        let recorder: Arc<dyn QueryRecorder> = self.history.clone();
        SearchSession::new(
            SessionBackends {
                search: self.search.clone(),
                llm: self.llm.clone(),
                recorder: Some(recorder),
            },
            SessionSettings::from(&self.config),
        )
    }
}

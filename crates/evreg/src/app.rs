//! Wiring of transport, cached client and session for one CLI run

use anyhow::{bail, Context, Result};
use evreg_client::{
    ApiCache, ApiTransport, AuthSession, CacheMode, CachedApiClient, EventApi, FileTokenStore,
    HttpApiClient, TokenStore,
};
use evreg_config::{AppConfig, LocaleRouter};
use std::sync::Arc;

pub type Client = CachedApiClient<HttpApiClient>;

pub struct App {
    pub config: AppConfig,
    pub router: LocaleRouter,
    pub transport: Arc<ApiTransport>,
    pub api: Arc<Client>,
    pub session: Arc<AuthSession>,
}

impl App {
    /// Build the client stack; `locale` overrides the configured locale
    pub fn new(config: AppConfig, locale: Option<&str>) -> Result<Self> {
        let router = LocaleRouter::from_config(&config);
        if let Some(locale) = locale {
            if !router.is_supported(locale) {
                bail!(
                    "Unsupported locale '{}' (supported: {})",
                    locale,
                    config.supported_locales.join(", ")
                );
            }
        }

        let store = FileTokenStore::default_location().context("Failed to locate token file")?;
        log::debug!("Token file: {:?}", store.path());
        let tokens: Arc<dyn TokenStore> = Arc::new(store);

        let transport = Arc::new(ApiTransport::from_config(&config, Arc::clone(&tokens)));
        if let Some(locale) = locale {
            transport.set_locale(locale);
        }

        let cache = Arc::new(ApiCache::new());
        let api = Arc::new(CachedApiClient::new(
            HttpApiClient::new(Arc::clone(&transport)),
            Arc::clone(&cache),
            CacheMode::ReadWrite,
        ));

        let session = Arc::new(AuthSession::new(
            Arc::clone(&api) as Arc<dyn EventApi>,
            tokens,
            cache,
        ));
        session.watch_transport(transport.subscribe());

        Ok(Self {
            config,
            router,
            transport,
            api,
            session,
        })
    }

    /// Active display locale
    pub fn locale(&self) -> String {
        self.transport.locale()
    }

    /// Page size from the command line, else the configured one
    pub fn page_size(&self, limit: Option<u32>) -> u32 {
        limit.unwrap_or(self.config.list_page_size).max(1)
    }

    /// Resolve the stored session, failing when nobody is signed in
    pub async fn require_user(&self) -> Result<evreg_client::User> {
        self.session.initialize().await;
        match self.session.user() {
            Some(user) => Ok(user),
            None => bail!("Not signed in. Run `evreg login` first."),
        }
    }
}

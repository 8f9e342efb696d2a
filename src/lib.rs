pub mod api;
pub mod config;
pub mod currency;
pub mod documents;
pub mod error;
pub mod identity;
pub mod loans;
pub mod proposal;
pub mod review;
pub mod session;
pub mod share;

pub use error::PortalError;

use std::sync::Arc;

use api::PortalApi;
use config::PortalConfig;
use identity::{HostedIdentity, IdentityProvider};
use share::{MessageComposerChannel, ShareChannel};

/// Shared application state handed to every CLI command.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<PortalConfig>,
    pub api: Arc<PortalApi>,
    pub identity: Arc<dyn IdentityProvider>,
    pub share: Arc<dyn ShareChannel>,
}

impl AppContext {
    pub fn new(config: PortalConfig) -> anyhow::Result<Self> {
        let api = Arc::new(PortalApi::new(&config)?);
        let identity = Arc::new(HostedIdentity::new(&config)?);
        let share = Arc::new(MessageComposerChannel::new(&config));
        Ok(Self {
            config: Arc::new(config),
            api,
            identity,
            share,
        })
    }
}

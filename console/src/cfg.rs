use admin_session::gateway::DEFAULT_TIMEOUT_MS;
use admin_session::guard::DEFAULT_LOGIN_PATH;
use admin_session::GatewayConfig;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Config to be read from file
//--------------------------------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debug: bool,
    pub base_url: String,
    pub timeout_ms: Option<u64>,
    pub state_dir: Option<PathBuf>,
    pub login_path: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("console").required(false))
            .add_source(config::File::with_name("console.local").required(false))
            .add_source(config::Environment::with_prefix("ADMIN_CONSOLE").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(self.base_url.clone())
            .with_timeout(Duration::from_millis(
                self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            ))
            .with_debug(self.debug)
    }

    /// Where the session file lives. Falls back to the platform's local data directory.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("admin-console"))
            .ok_or_else(|| anyhow!("No local data directory; set state_dir in the config"))
    }

    pub fn login_path(&self) -> &str {
        self.login_path.as_deref().unwrap_or(DEFAULT_LOGIN_PATH)
    }
}

//--------------------------------------------------------------------------------------------------


//--------------------------------------------------------------------------------------------------

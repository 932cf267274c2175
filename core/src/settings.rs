//! Engine settings persistence.

use thiserror::Error;

use havoc_types::EngineSettings;

const APP_NAME: &str = "havoc";
const CONFIG_NAME: &str = "engine";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings load/store failed: {0}")]
    Confy(#[from] confy::ConfyError),
}

/// Load the engine settings, creating a defaulted file on first run.
pub fn load() -> Result<EngineSettings, SettingsError> {
    Ok(confy::load(APP_NAME, Some(CONFIG_NAME))?)
}

pub fn store(settings: &EngineSettings) -> Result<(), SettingsError> {
    Ok(confy::store(APP_NAME, Some(CONFIG_NAME), settings)?)
}

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::error::Result;
use crate::models::ConfluxSettings;

const ENV_PREFIX: &str = "CONFLUX";

/// Load settings from `conflux.toml` in the working directory (if
/// present) layered under `CONFLUX__`-prefixed environment variables.
pub fn load() -> Result<ConfluxSettings> {
    build(File::with_name("conflux").required(false))
}

/// Load settings from an explicit TOML file, still honoring the
/// environment overlay.
pub fn load_from_path(path: &Path) -> Result<ConfluxSettings> {
    build(File::from(path).format(FileFormat::Toml).required(true))
}

fn build(file: File<config::FileSourceFile, FileFormat>) -> Result<ConfluxSettings> {
    let raw = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: ConfluxSettings = raw.try_deserialize()?;
    settings.validate()?;
    debug!(
        servers = settings.servers.len(),
        max_concurrency = settings.sync.max_concurrency,
        "configuration loaded"
    );
    Ok(settings)
}

use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Installs the global subscriber. JSON lines drop the target to stay compact.
pub fn init(cfg: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&cfg.filter)
        .map_err(|e| anyhow::anyhow!("invalid log filter `{}`: {e}", cfg.filter))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match cfg.format {
        LogFormat::Json => builder.with_target(false).json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
}

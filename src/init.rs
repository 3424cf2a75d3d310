use crate::facade::LoggerFacade;
use crate::layer::RecordLayer;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Options for [`install`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, the `fmt` layer is stacked on top of
///   [`RecordLayer`] so events are also echoed to the console in the usual
///   `tracing` format.
#[derive(Clone, Debug, Default)]
pub struct InstallConfig {
    pub enable_stdout: bool,
}

/// Error returned when a global subscriber is already installed.
#[derive(thiserror::Error, Debug)]
#[error("failed to install global tracing subscriber: {0}")]
pub struct InstallError(#[from] tracing::subscriber::SetGlobalDefaultError);

/// Install a global `tracing` subscriber that routes every event through
/// `facade`.
///
/// **Effects**
///
/// Sets a [`Registry`] combined with [`RecordLayer`] as the global default
/// subscriber. Can succeed at most once per process.
pub fn install(facade: Arc<LoggerFacade>, config: InstallConfig) -> Result<(), InstallError> {
    let layer = RecordLayer::new(facade);

    // The two subscriber stacks have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Install with [`InstallConfig::default`].
pub fn install_default(facade: Arc<LoggerFacade>) -> Result<(), InstallError> {
    install(facade, InstallConfig::default())
}

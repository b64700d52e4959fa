//! Boot-time guard that rejects host routes to the cloud metadata endpoint.
//!
//! The action is gated on `disable_ec2_metadata`, prefers iproute2 over the
//! net-tools `route` command, and installs one reject route for the IPv4
//! endpoint followed by one for the IPv6 endpoint.

use std::{path::PathBuf, sync::Arc};

use thiserror::Error;
use types::{ALL_DISTROS, DISABLE_EC2_METADATA_KEY, GuardConfig, ModuleFrequency, ModuleMeta};

mod config;
mod diagnostics;
mod host;
mod routes;

#[cfg(test)]
mod tests;

pub use config::{CONFIG_ENV_PREFIX, ConfigSources, DEFAULT_CONFIG_PATH, load_config};
pub use diagnostics::{DiagnosticLevel, Diagnostics, GuardEvent, TracingDiagnostics};
pub use host::{
    CommandExecutor, DryRunExecutor, ExecError, ExecOutput, ExecRequest, ExecutableLocator,
    SystemExecutor, SystemLocator,
};
pub use routes::{
    CommandSet, CommandSpec, METADATA_IPV4, METADATA_IPV6, ToolKind, ToolSelection,
    install_routes, select_tool,
};

pub const MODULE_NAME: &str = "disable_ec2_metadata";

pub const MODULE_META: ModuleMeta = ModuleMeta {
    id: "cc_disable_ec2_metadata",
    name: "Disable EC2 Metadata",
    title: "Disable AWS EC2 Metadata",
    description: "Disables the EC2 datasource by rejecting the routes to the IPv4 metadata \
                  address 169.254.169.254 and the IPv6 metadata address fd00:ec2::254. \
                  Disabled by default.",
    distros: &[ALL_DISTROS],
    frequency: ModuleFrequency::Always,
    activate_by_keys: &[DISABLE_EC2_METADATA_KEY],
    examples: &["disable_ec2_metadata = true"],
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Skipped,
    Blocked { tool: ToolKind },
    NoRoutingTool { checked: Vec<&'static str> },
}

impl BlockOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Blocked { .. } => "blocked",
            Self::NoRoutingTool { .. } => "no_routing_tool",
        }
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("config file `{path}` does not exist")]
    MissingConfig { path: PathBuf },
    #[error("failed to load guard config: {0}")]
    LoadConfig(#[source] Box<figment::Error>),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl From<figment::Error> for GuardError {
    fn from(value: figment::Error) -> Self {
        Self::LoadConfig(Box::new(value))
    }
}

/// The metadata-endpoint blocking action, wired to its host capabilities.
#[derive(Debug, Clone)]
pub struct DisableEc2Metadata {
    locator: Arc<dyn ExecutableLocator>,
    executor: Arc<dyn CommandExecutor>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl DisableEc2Metadata {
    pub fn new(
        locator: Arc<dyn ExecutableLocator>,
        executor: Arc<dyn CommandExecutor>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            locator,
            executor,
            diagnostics,
        }
    }

    /// Uses the process `PATH`, real command execution and `tracing`.
    pub fn for_host() -> Self {
        Self::new(
            Arc::new(SystemLocator::from_env()),
            Arc::new(SystemExecutor::default()),
            Arc::new(TracingDiagnostics),
        )
    }

    pub fn meta(&self) -> &'static ModuleMeta {
        &MODULE_META
    }

    /// Runs the action once under the module `name`.
    ///
    /// A missing routing tool is reported through diagnostics and returned as
    /// [`BlockOutcome::NoRoutingTool`], not as an error. Command failures are
    /// returned unchanged and stop the remaining commands.
    pub fn handle(&self, name: &str, config: &GuardConfig) -> Result<BlockOutcome, GuardError> {
        if !config.disable_ec2_metadata_enabled() {
            self.diagnostics.emit(GuardEvent::Skipped {
                module: name.to_owned(),
            });
            return Ok(BlockOutcome::Skipped);
        }

        match select_tool(self.locator.as_ref()) {
            ToolSelection::Found(tool) => {
                install_routes(tool, self.executor.as_ref())?;
                self.diagnostics.emit(GuardEvent::RoutesBlocked { tool });
                Ok(BlockOutcome::Blocked { tool })
            }
            ToolSelection::NotFound { checked } => {
                self.diagnostics.emit(GuardEvent::NoRoutingTool {
                    checked: checked.clone(),
                });
                Ok(BlockOutcome::NoRoutingTool { checked })
            }
        }
    }
}

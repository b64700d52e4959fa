use std::fmt;

use tracing::{debug, error, info};

use crate::routes::{METADATA_IPV4, METADATA_IPV6, ToolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// The feature flag is off or absent.
    Skipped { module: String },
    /// Neither routing tool resolved; `checked` lists probe names in order.
    NoRoutingTool { checked: Vec<&'static str> },
    RoutesBlocked { tool: ToolKind },
}

impl GuardEvent {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::NoRoutingTool { .. } => "no_routing_tool",
            Self::RoutesBlocked { .. } => "routes_blocked",
        }
    }

    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Self::Skipped { .. } => DiagnosticLevel::Debug,
            Self::NoRoutingTool { .. } => DiagnosticLevel::Error,
            Self::RoutesBlocked { .. } => DiagnosticLevel::Info,
        }
    }
}

impl fmt::Display for GuardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { module } => write!(
                f,
                "skipping module {module}: disable_ec2_metadata is not enabled"
            ),
            Self::NoRoutingTool { checked } => write!(
                f,
                "Neither \"route\" nor \"ip\" command found, unable to manipulate routing table (checked: {})",
                checked.join(", ")
            ),
            Self::RoutesBlocked { tool } => write!(
                f,
                "rejected routes to {METADATA_IPV4} and {METADATA_IPV6} using `{tool}`"
            ),
        }
    }
}

/// Sink for the guard's leveled diagnostics.
pub trait Diagnostics: Send + Sync + fmt::Debug {
    fn emit(&self, event: GuardEvent);
}

/// Forwards diagnostics to the global `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, event: GuardEvent) {
        let kind = event.as_label();
        match event.level() {
            DiagnosticLevel::Debug => debug!(kind, "{event}"),
            DiagnosticLevel::Info => info!(kind, "{event}"),
            DiagnosticLevel::Error => error!(kind, "{event}"),
        }
    }
}

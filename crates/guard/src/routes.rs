use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
};

use crate::host::{CommandExecutor, ExecError, ExecRequest, ExecutableLocator};

pub const METADATA_IPV4: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);
pub const METADATA_IPV6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x0254);

// Command vectors carry the literal spellings so the argv stays byte-stable.
const METADATA_IPV4_LITERAL: &str = "169.254.169.254";
const METADATA_IPV6_LITERAL: &str = "fd00:ec2::254";

const IP_ROUTE_COMMANDS: CommandSet = CommandSet {
    tool: ToolKind::IpRoute,
    commands: [
        CommandSpec::new("ip", &["route", "add", "prohibit", METADATA_IPV4_LITERAL]),
        CommandSpec::new("ip", &["-6", "route", "add", "prohibit", METADATA_IPV6_LITERAL]),
    ],
};

const ROUTE_TABLE_COMMANDS: CommandSet = CommandSet {
    tool: ToolKind::RouteTable,
    commands: [
        CommandSpec::new("route", &["add", "-host", METADATA_IPV4_LITERAL, "reject"]),
        CommandSpec::new("route", &["-6", "add", "-host", METADATA_IPV6_LITERAL, "reject"]),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// iproute2 `ip`.
    IpRoute,
    /// net-tools `route`.
    RouteTable,
}

impl ToolKind {
    /// Detection order; the first resolvable tool wins.
    pub const PROBE_ORDER: [ToolKind; 2] = [Self::IpRoute, Self::RouteTable];

    /// Executable looked up on the search path to detect the tool.
    ///
    /// net-tools is detected through `ifconfig`, which ships in the same
    /// package as `route`.
    pub fn probe_name(self) -> &'static str {
        match self {
            Self::IpRoute => "ip",
            Self::RouteTable => "ifconfig",
        }
    }

    /// Executable the reject routes are installed with.
    pub fn program(self) -> &'static str {
        match self {
            Self::IpRoute => "ip",
            Self::RouteTable => "route",
        }
    }

    pub fn commands(self) -> CommandSet {
        match self {
            Self::IpRoute => IP_ROUTE_COMMANDS,
            Self::RouteTable => ROUTE_TABLE_COMMANDS,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// A single argument vector, executed without a shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl CommandSpec {
    pub const fn new(program: &'static str, args: &'static [&'static str]) -> Self {
        Self { program, args }
    }

    pub fn argv(&self) -> Vec<&'static str> {
        std::iter::once(self.program)
            .chain(self.args.iter().copied())
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// The reject-route commands for one tool, IPv4 first then IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSet {
    pub tool: ToolKind,
    pub commands: [CommandSpec; 2],
}

impl CommandSet {
    pub fn ipv4(&self) -> &CommandSpec {
        &self.commands[0]
    }

    pub fn ipv6(&self) -> &CommandSpec {
        &self.commands[1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    Found(ToolKind),
    NotFound { checked: Vec<&'static str> },
}

/// Probes for a routing tool in [`ToolKind::PROBE_ORDER`], stopping at the
/// first hit. Every candidate is probed before reporting `NotFound`.
pub fn select_tool(locator: &dyn ExecutableLocator) -> ToolSelection {
    let mut checked = Vec::with_capacity(ToolKind::PROBE_ORDER.len());
    for tool in ToolKind::PROBE_ORDER {
        let probe_name = tool.probe_name();
        checked.push(probe_name);
        if locator.which(probe_name).is_some() {
            return ToolSelection::Found(tool);
        }
    }
    ToolSelection::NotFound { checked }
}

/// Runs the tool's command set in order without capturing output.
///
/// The first failure is returned as-is and the remaining commands are not
/// attempted.
pub fn install_routes(tool: ToolKind, executor: &dyn CommandExecutor) -> Result<(), ExecError> {
    let command_set = tool.commands();
    for command in command_set.iter() {
        executor.execute(ExecRequest::uncaptured(command))?;
    }
    Ok(())
}

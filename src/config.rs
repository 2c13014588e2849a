use std::{fs::read_to_string, net::SocketAddr, str::FromStr};

use anyhow::Result;
use clap::Parser;
use engine::Tunables;
use serde::Deserialize;

/// Which side of the poll cycle this node plays.
///
/// A master periodically requests data from its configured targets; a
/// slave only beacons, relays, and answers requests addressed to it.
/// Either role forwards traffic for the rest of the mesh.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

impl Default for Role {
    fn default() -> Self {
        Self::Slave
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Node {
    ///
    /// Mesh identifier of this node.
    ///
    /// An opaque token unique across the mesh. It travels inside colon-
    /// and hyphen-delimited frames and therefore may contain neither
    /// character.
    ///
    pub id: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Radio {
    ///
    /// The address the UDP radio adapter binds.
    ///
    #[serde(default = "Radio::listen")]
    pub listen: SocketAddr,
    ///
    /// Where transmissions are broadcast. Every node of a bench mesh
    /// shares one broadcast address and port.
    ///
    #[serde(default = "Radio::broadcast")]
    pub broadcast: SocketAddr,
    ///
    /// The RSSI (dBm) reported for received datagrams. UDP cannot observe
    /// a real signal strength, so the adapter reports this constant;
    /// anything above the protocol's qos-threshold admits neighbors.
    ///
    #[serde(default = "Radio::rssi")]
    pub rssi: i32,
}

impl Radio {
    fn listen() -> SocketAddr {
        "0.0.0.0:7400".parse().unwrap()
    }

    fn broadcast() -> SocketAddr {
        "255.255.255.255:7400".parse().unwrap()
    }

    fn rssi() -> i32 {
        -60
    }
}

impl Default for Radio {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
            broadcast: Self::broadcast(),
            rssi: Self::rssi(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Poll {
    ///
    /// Node identifiers a master requests data from, visited round-robin.
    ///
    #[serde(default)]
    pub targets: Vec<String>,
    ///
    /// Seconds between data requests.
    ///
    #[serde(default = "Poll::period")]
    pub period: u64,
}

impl Poll {
    fn period() -> u64 {
        60
    }
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            period: Self::period(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    ///
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    ///
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub node: Node,
    ///
    /// Protocol timing and link-quality knobs; every field has the
    /// engine's default.
    ///
    #[serde(default)]
    pub protocol: Tunables,
    #[serde(default)]
    pub radio: Radio,
    #[serde(default)]
    pub poll: Poll,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    ///
    /// Specify the configuration file path
    ///
    /// Example: mesh-node --config /etc/mesh-node/config.json5
    ///
    #[arg(long, short)]
    config: String,
}

impl Config {
    ///
    /// Load configure from config file and command line parameters.
    ///
    pub fn load() -> Result<Self> {
        let config: Self = serde_json5::from_str(&read_to_string(&Cli::parse().config)?)?;

        anyhow::ensure!(
            !config.node.id.is_empty()
                && !config.node.id.contains(':')
                && !config.node.id.contains('-'),
            "node.id must be non-empty and contain neither ':' nor '-'"
        );

        Ok(config)
    }
}

//! HA role resolution
//!
//! The role file is owned by the PBX's HA tooling; a node without one is
//! simply not part of a pair.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Node type as written in the role file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Replication origin
    Master,
    /// Replication target
    Standby,
}

/// On-disk shape of the role file
#[derive(Debug, Deserialize)]
struct RoleFile {
    role: NodeType,
    #[serde(default)]
    remote_address: Option<String>,
}

/// HA pairing state of this node for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaRole {
    /// No HA configuration present
    Unconfigured,
    Standby,
    Master {
        /// Peer host or IP
        remote_address: String,
    },
}

impl HaRole {
    /// Resolve the role from the role file.
    ///
    /// An unreadable file yields [`HaRole::Unconfigured`]. Content that does
    /// not match the expected shape is an error.
    pub fn resolve(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No HA role file at {:?} ({}), treating node as unconfigured", path, e);
                return Ok(HaRole::Unconfigured);
            }
        };
        Self::parse(&content)
    }

    /// Parse role file content
    pub fn parse(content: &str) -> Result<Self> {
        let file: RoleFile = toml::from_str(content)?;
        match file.role {
            NodeType::Standby => Ok(HaRole::Standby),
            NodeType::Master => {
                let remote_address = file
                    .remote_address
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| {
                        Error::Config("HA role is master but remote_address is missing".into())
                    })?;
                Ok(HaRole::Master { remote_address })
            }
        }
    }

    /// Configured node type, if any
    pub fn node_type(&self) -> Option<NodeType> {
        match self {
            HaRole::Unconfigured => None,
            HaRole::Standby => Some(NodeType::Standby),
            HaRole::Master { .. } => Some(NodeType::Master),
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, HaRole::Master { .. })
    }

    /// Peer address; only a master has one
    pub fn remote_address(&self) -> Option<&str> {
        match self {
            HaRole::Master { remote_address } => Some(remote_address),
            _ => None,
        }
    }
}

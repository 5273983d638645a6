//! Cluster membership lookups.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::api::{ApiClient, decode};
use crate::error::StorageError;

const CLUSTER_STATUS_PATH: &str = "/cluster/status";
const NODE_ENTRY_TYPE: &str = "node";

/// A cluster member and the address it is reachable on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterNode {
    /// Node name as used in API paths.
    pub name: String,
    /// Address reported by cluster membership.
    pub address: IpAddr,
}

#[derive(Deserialize)]
struct StatusEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    ip: Option<String>,
}

/// Resolves node names to addresses from live cluster membership.
///
/// Every call re-fetches the member list.
#[derive(Debug)]
pub struct ClusterTopology<C> {
    client: Arc<C>,
}

impl<C: ApiClient> ClusterTopology<C> {
    /// Creates a resolver backed by `client`.
    #[must_use]
    pub const fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Lists cluster members that report a usable address.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] when the request or decoding fails.
    pub async fn members(&self) -> Result<Vec<ClusterNode>, StorageError> {
        let value = self.client.get(CLUSTER_STATUS_PATH).await?;
        let entries: Vec<StatusEntry> = decode(CLUSTER_STATUS_PATH, value)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == NODE_ENTRY_TYPE)
            .filter_map(|entry| {
                let address = entry
                    .ip
                    .as_deref()
                    .and_then(|ip| IpAddr::from_str(ip.trim()).ok())?;
                Some(ClusterNode {
                    name: entry.name,
                    address,
                })
            })
            .collect())
    }

    /// Returns the address of the member named `node`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NodeNotFound`] when no member matches, or any
    /// error from [`ClusterTopology::members`].
    pub async fn resolve_node_address(&self, node: &str) -> Result<IpAddr, StorageError> {
        let address = self
            .members()
            .await?
            .into_iter()
            .find(|member| member.name == node)
            .map(|member| member.address)
            .ok_or_else(|| StorageError::NodeNotFound {
                node: node.to_owned(),
            })?;
        debug!(node, %address, "resolved node address");
        Ok(address)
    }
}

//! Scene-side material networks and the node arena built from them.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Value;
use crate::util::{Error, Result};

/// Connection from a node input to an upstream node output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDesc {
    pub upstream_node: String,
    pub upstream_output: String,
}

/// Node as authored in the scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialNodeDesc {
    pub node_type_id: String,
    pub parameters: BTreeMap<String, Value>,
    pub input_connections: BTreeMap<String, Vec<ConnectionDesc>>,
}

impl MaterialNodeDesc {
    pub fn new(node_type_id: &str) -> Self {
        Self {
            node_type_id: node_type_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_connection(
        mut self,
        input: &str,
        upstream_node: &str,
        upstream_output: &str,
    ) -> Self {
        self.input_connections
            .entry(input.to_string())
            .or_default()
            .push(ConnectionDesc {
                upstream_node: upstream_node.to_string(),
                upstream_output: upstream_output.to_string(),
            });
        self
    }
}

/// Material network as handed over by a scene delegate: path-keyed nodes,
/// named terminals and extra primvars.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialNetworkMap {
    pub nodes: BTreeMap<String, MaterialNodeDesc>,
    /// Terminal name (`surface`, `volume`) to the node output that drives it.
    pub terminals: BTreeMap<String, ConnectionDesc>,
    pub primvars: Vec<String>,
}

impl MaterialNetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, path: &str, node: MaterialNodeDesc) -> &mut Self {
        self.nodes.insert(path.to_string(), node);
        self
    }

    pub fn set_terminal(&mut self, terminal: &str, node_path: &str, output: &str) -> &mut Self {
        self.terminals.insert(
            terminal.to_string(),
            ConnectionDesc {
                upstream_node: node_path.to_string(),
                upstream_output: output.to_string(),
            },
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() || self.terminals.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Source of material networks.
pub trait SceneDelegate: Send + Sync {
    /// Network authored for the material, if any.
    fn material_resource(&self, id: &str) -> Option<MaterialNetworkMap>;
}

impl SceneDelegate for HashMap<String, MaterialNetworkMap> {
    fn material_resource(&self, id: &str) -> Option<MaterialNetworkMap> {
        self.get(id).cloned()
    }
}

/// Index of a node in a [`MaterialGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Resolved connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub upstream: NodeId,
    pub output: String,
}

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub path: String,
    pub type_id: String,
    pub parameters: BTreeMap<String, Value>,
    pub inputs: BTreeMap<String, Vec<Connection>>,
}

impl GraphNode {
    #[inline]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// First connection of an input.
    pub fn connection(&self, input: &str) -> Option<&Connection> {
        self.inputs.get(input).and_then(|c| c.first())
    }

    /// Check if an input has a connection entry (even an empty one).
    pub fn is_connected(&self, input: &str) -> bool {
        self.inputs.contains_key(input)
    }
}

/// Flat node arena for one extraction pass. Connections are node indices, so
/// cycles in authored data cannot create ownership loops.
#[derive(Clone, Debug, Default)]
pub struct MaterialGraph {
    nodes: Vec<GraphNode>,
    terminals: BTreeMap<String, Connection>,
    primvars: Vec<String>,
}

impl MaterialGraph {
    /// Build the arena. Connections to unknown node paths are malformed.
    pub fn build(map: &MaterialNetworkMap) -> Result<Self> {
        let ids: HashMap<&str, NodeId> = map
            .nodes
            .keys()
            .enumerate()
            .map(|(i, path)| (path.as_str(), NodeId(i as u32)))
            .collect();

        let resolve = |from: &str, conn: &ConnectionDesc| -> Result<Connection> {
            ids.get(conn.upstream_node.as_str())
                .map(|&upstream| Connection {
                    upstream,
                    output: conn.upstream_output.clone(),
                })
                .ok_or_else(|| {
                    Error::malformed(format!(
                        "{} is connected to unknown node {}",
                        from, conn.upstream_node
                    ))
                })
        };

        let mut nodes = Vec::with_capacity(map.nodes.len());
        for (path, desc) in &map.nodes {
            let mut inputs = BTreeMap::new();
            for (input, conns) in &desc.input_connections {
                let resolved = conns
                    .iter()
                    .map(|c| resolve(path, c))
                    .collect::<Result<Vec<_>>>()?;
                inputs.insert(input.clone(), resolved);
            }
            nodes.push(GraphNode {
                path: path.clone(),
                type_id: desc.node_type_id.clone(),
                parameters: desc.parameters.clone(),
                inputs,
            });
        }

        let mut terminals = BTreeMap::new();
        for (name, conn) in &map.terminals {
            terminals.insert(name.clone(), resolve(name, conn)?);
        }

        Ok(Self {
            nodes,
            terminals,
            primvars: map.primvars.clone(),
        })
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.index()]
    }

    /// Node driving a terminal.
    pub fn terminal(&self, name: &str) -> Option<NodeId> {
        self.terminals.get(name).map(|c| c.upstream)
    }

    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.path == path)
            .map(|i| NodeId(i as u32))
    }

    pub fn primvars(&self) -> &[String] {
        &self.primvars
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

//! Binary prefix trie over IP address bits.
//!
//! Keys are 128-bit: IPv6 networks use their address bits as-is and IPv4
//! networks are placed under `::/96`, so `1.2.3.0/24` sits at depth 120.
//! This is the same layout an IPv6 MaxMind DB uses for IPv4 lookups, which
//! lets the database writer walk the trie without translation.

use ipnet::IpNet;
use std::net::IpAddr;

/// Depth of the IPv4 subtree root (`::/96`).
pub const IPV4_SUBTREE_DEPTH: u8 = 96;

/// Index of a node inside the trie arena.
pub type NodeId = usize;

/// Trie node: two optional children and an optional label.
#[derive(Debug, Clone)]
pub struct Node<V> {
    pub children: [Option<NodeId>; 2],
    pub label: Option<V>,
}

impl<V> Node<V> {
    fn empty() -> Self {
        Self {
            children: [None, None],
            label: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children[0].is_none() && self.children[1].is_none()
    }
}

/// Binary trie keyed by network prefix.
#[derive(Debug, Clone)]
pub struct PrefixTrie<V> {
    nodes: Vec<Node<V>>,
    labelled: usize,
}

impl<V> PrefixTrie<V> {
    /// Create a trie holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty()],
            labelled: 0,
        }
    }

    /// Insert a network, returning the label it replaced.
    ///
    /// Re-inserting the same network overwrites its label; overlapping
    /// networks of different length live at different depths.
    pub fn insert(&mut self, network: IpNet, label: V) -> Option<V> {
        let (key, depth) = network_key(&network);

        let mut current = 0;
        for i in 0..depth {
            let bit = bit_at(key, i);
            current = match self.nodes[current].children[bit] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::empty());
                    self.nodes[current].children[bit] = Some(child);
                    child
                }
            };
        }

        let previous = self.nodes[current].label.replace(label);
        if previous.is_none() {
            self.labelled += 1;
        }
        previous
    }

    /// Longest-prefix match for an address.
    pub fn lookup(&self, addr: IpAddr) -> Option<&V> {
        let (key, depth) = address_key(addr);

        let mut current = 0;
        let mut best = self.nodes[0].label.as_ref();
        for i in 0..depth {
            match self.nodes[current].children[bit_at(key, i)] {
                Some(child) => current = child,
                None => break,
            }
            if let Some(label) = self.nodes[current].label.as_ref() {
                best = Some(label);
            }
        }
        best
    }

    /// Label stored for exactly this network, if any.
    pub fn get(&self, network: &IpNet) -> Option<&V> {
        let (key, depth) = network_key(network);

        let mut current = 0;
        for i in 0..depth {
            current = self.nodes[current].children[bit_at(key, i)]?;
        }
        self.nodes[current].label.as_ref()
    }

    /// Root node id.
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id]
    }

    /// Number of labelled networks.
    pub fn len(&self) -> usize {
        self.labelled
    }

    pub fn is_empty(&self) -> bool {
        self.labelled == 0
    }

    /// Number of nodes including internal ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Extend<(IpNet, V)> for PrefixTrie<V> {
    fn extend<T: IntoIterator<Item = (IpNet, V)>>(&mut self, iter: T) {
        for (network, label) in iter {
            self.insert(network, label);
        }
    }
}

/// Bit `i` of `key`, counting from the most significant bit.
fn bit_at(key: u128, i: u8) -> usize {
    ((key >> (127 - i as u32)) & 1) as usize
}

fn network_key(network: &IpNet) -> (u128, u8) {
    match network {
        IpNet::V4(net) => (
            u32::from(net.addr()) as u128,
            IPV4_SUBTREE_DEPTH + net.prefix_len(),
        ),
        IpNet::V6(net) => (u128::from(net.addr()), net.prefix_len()),
    }
}

fn address_key(addr: IpAddr) -> (u128, u8) {
    match addr {
        IpAddr::V4(v4) => (u32::from(v4) as u128, IPV4_SUBTREE_DEPTH + 32),
        IpAddr::V6(v6) => (u128::from(v6), 128),
    }
}

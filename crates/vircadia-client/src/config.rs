//! Client-wide configuration.
//!
//! Everything the check-in protocol reports about this client lives here,
//! constructed once at startup and passed by `Arc` - there is no ambient
//! global state. The machine fingerprint is generated per configuration;
//! embedders that want a stable fingerprint across runs persist and restore
//! it themselves.

use uuid::Uuid;
use vircadia_packets::NodeType;

/// Identity and interest parameters for one client instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The node type this client presents as (normally an Agent)
    pub owner_type: NodeType,
    /// Place name requested from the domain
    pub place_name: String,
    /// Node types the client wants presence information for
    pub node_types_of_interest: Vec<NodeType>,
    /// Machine fingerprint reported in connect requests
    pub machine_fingerprint: Uuid,
    /// Optional hardware (MAC) address string
    pub hardware_address: Option<String>,
    /// Optional pre-compressed system information blob
    pub system_info: Option<Vec<u8>>,
    /// Uptime of the previous session in microseconds
    pub previous_session_uptime: u64,
    /// Metaverse username, sent while not yet connected
    pub username: Option<String>,
    /// Signature over the username, if the account has one
    pub username_signature: Option<Vec<u8>>,
    /// Domain-specific username
    pub domain_username: Option<String>,
    /// Domain-specific access tokens
    pub domain_tokens: Option<String>,
}

impl ClientConfig {
    /// A configuration for an interface client wanting the usual mixers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            owner_type: NodeType::Agent,
            place_name: String::new(),
            node_types_of_interest: vec![
                NodeType::AudioMixer,
                NodeType::AvatarMixer,
                NodeType::EntityServer,
                NodeType::AssetServer,
                NodeType::MessagesMixer,
                NodeType::EntityScriptServer,
            ],
            machine_fingerprint: Uuid::new_v4(),
            hardware_address: None,
            system_info: None,
            previous_session_uptime: 0,
            username: None,
            username_signature: None,
            domain_username: None,
            domain_tokens: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Core-Synth: Connection String Synthesis for Meridian
//!
//! When a node agent creates a credential it answers with a protocol-specific
//! connection descriptor (secret, port, Reality parameters, ...). This crate
//! turns that descriptor into the canonical share-link string handed to the
//! end user.
//!
//! The crate is **pure logic**: no I/O, no clocks, no randomness. The same
//! inputs always produce byte-identical output, which is what the golden
//! tests below rely on.
//!
//! # Example
//!
//! ```
//! use meridian_core_synth::{synthesize, ConnectionDescriptor};
//! use serde_json::json;
//!
//! let descriptor = ConnectionDescriptor::from_value(json!({
//!     "password": "pw1",
//!     "tcp": { "port": 443 }
//! })).unwrap();
//!
//! let link = synthesize("trojan", "10.0.0.5", "abc", &descriptor).unwrap();
//! assert_eq!(link, "trojan://pw1@10.0.0.5:443?type=tcp&security=none#Config:abc");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod descriptor;
pub mod error;

pub use descriptor::{Block, ConnectionDescriptor};
pub use error::{Result, SynthError};

/// Default TLS fingerprint advertised when a Reality block omits one
pub const DEFAULT_FINGERPRINT: &str = "chrome";

/// Default VLESS flow when the descriptor omits `flow_reality`
pub const DEFAULT_VLESS_FLOW: &str = "xtls-rprx-vision";

/// Protocol kinds a node can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Trojan,
    Vless,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Trojan => "trojan",
            Protocol::Vless => "vless",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trojan" => Ok(Protocol::Trojan),
            "vless" => Ok(Protocol::Vless),
            other => Err(SynthError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// Reality security parameters, each defaulted when absent
#[derive(Debug, Clone, PartialEq, Eq)]
struct RealityParams<'a> {
    fingerprint: &'a str,
    server_name: &'a str,
    public_key: &'a str,
    short_id: &'a str,
    spider_x: &'a str,
}

impl<'a> RealityParams<'a> {
    fn from_block(block: Option<Block<'a>>) -> Self {
        let get = |key: &str, default: &'a str| match block {
            Some(b) => b.str_or(key, default),
            None => default,
        };

        Self {
            fingerprint: get("fingerprint", DEFAULT_FINGERPRINT),
            server_name: get("serverName", ""),
            public_key: get("public_key", ""),
            short_id: get("shortId", ""),
            spider_x: get("spiderX", ""),
        }
    }

    /// Query fragment in the fixed order clients expect
    fn query(&self) -> String {
        format!(
            "fp={}&sni={}&pbk={}&sid={}&spx={}",
            self.fingerprint, self.server_name, self.public_key, self.short_id, self.spider_x
        )
    }
}

/// Build the connection string for `user_id` on `node`
///
/// `protocol` is the node's registered inbound kind. Unknown kinds fail with
/// [`SynthError::UnsupportedProtocol`]; malformed descriptors fail with
/// [`SynthError::MissingField`] or [`SynthError::NoUsableTransport`] and never
/// yield a partial string.
pub fn synthesize(
    protocol: &str,
    node: &str,
    user_id: &str,
    descriptor: &ConnectionDescriptor,
) -> Result<String> {
    match protocol.parse::<Protocol>()? {
        Protocol::Trojan => trojan_link(node, user_id, descriptor),
        Protocol::Vless => vless_link(node, user_id, descriptor),
    }
}

fn trojan_link(node: &str, user_id: &str, descriptor: &ConnectionDescriptor) -> Result<String> {
    let password = descriptor
        .str_field("password")
        .ok_or(SynthError::MissingField("password"))?;
    let tcp = descriptor
        .block("tcp")
        .ok_or(SynthError::MissingField("tcp"))?;
    let port = tcp.port().ok_or(SynthError::MissingField("tcp.port"))?;

    match tcp.block("reality") {
        Some(reality) => Ok(format!(
            "trojan://{}@{}:{}?type=tcp&security=reality&{}#Config:{}",
            password,
            node,
            port,
            RealityParams::from_block(Some(reality)).query(),
            user_id
        )),
        None => Ok(format!(
            "trojan://{}@{}:{}?type=tcp&security=none#Config:{}",
            password, node, port, user_id
        )),
    }
}

fn vless_link(node: &str, user_id: &str, descriptor: &ConnectionDescriptor) -> Result<String> {
    // A transport block only counts when it carries a port
    let reality = descriptor
        .block("tcp_reality")
        .and_then(|block| block.port().map(|port| (block, port)));

    if let Some((block, port)) = reality {
        let flow = descriptor.str_or("flow_reality", DEFAULT_VLESS_FLOW);
        let params = RealityParams::from_block(block.block("reality"));

        return Ok(format!(
            "vless://{}@{}:{}?flow={}&type=tcp&security=reality&{}#XTLS-Reality:{}",
            user_id,
            node,
            port,
            flow,
            params.query(),
            user_id
        ));
    }

    match descriptor.block("tcp").and_then(|block| block.port()) {
        Some(port) => Ok(format!(
            "vless://{}@{}:{}?type=tcp&security=none#TCP:{}",
            user_id, node, port, user_id
        )),
        None => Err(SynthError::NoUsableTransport),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn desc(value: serde_json::Value) -> ConnectionDescriptor {
        ConnectionDescriptor::from_value(value).unwrap()
    }

    #[test]
    fn test_trojan_reality_golden() {
        let d = desc(json!({
            "password": "pw1",
            "tcp": {
                "port": 443,
                "reality": {
                    "fingerprint": "chrome",
                    "serverName": "example.com",
                    "public_key": "pk",
                    "shortId": "01",
                    "spiderX": "/"
                }
            }
        }));

        let link = synthesize("trojan", "1.2.3.4", "abc", &d).unwrap();
        assert_eq!(
            link,
            "trojan://pw1@1.2.3.4:443?type=tcp&security=reality&fp=chrome&sni=example.com&pbk=pk&sid=01&spx=/#Config:abc"
        );
    }

    #[test]
    fn test_trojan_reality_defaults() {
        let d = desc(json!({
            "password": "pw1",
            "tcp": { "port": 443, "reality": {} }
        }));

        let link = synthesize("trojan", "n1", "u1", &d).unwrap();
        assert_eq!(
            link,
            "trojan://pw1@n1:443?type=tcp&security=reality&fp=chrome&sni=&pbk=&sid=&spx=#Config:u1"
        );
    }

    #[test]
    fn test_trojan_plain() {
        let d = desc(json!({ "password": "pw1", "tcp": { "port": 8443 } }));
        let link = synthesize("trojan", "n1", "u1", &d).unwrap();
        assert_eq!(link, "trojan://pw1@n1:8443?type=tcp&security=none#Config:u1");
    }

    #[test]
    fn test_trojan_missing_password() {
        let d = desc(json!({ "tcp": { "port": 443 } }));
        assert_eq!(
            synthesize("trojan", "n1", "u1", &d),
            Err(SynthError::MissingField("password"))
        );
    }

    #[test]
    fn test_trojan_missing_transport_or_port() {
        let no_tcp = desc(json!({ "password": "pw" }));
        assert_eq!(
            synthesize("trojan", "n1", "u1", &no_tcp),
            Err(SynthError::MissingField("tcp"))
        );

        let no_port = desc(json!({ "password": "pw", "tcp": { "reality": {} } }));
        assert_eq!(
            synthesize("trojan", "n1", "u1", &no_port),
            Err(SynthError::MissingField("tcp.port"))
        );
    }

    #[test]
    fn test_vless_prefers_reality_block() {
        let d = desc(json!({
            "flow_reality": "custom-flow",
            "tcp": { "port": 80 },
            "tcp_reality": {
                "port": 443,
                "reality": {
                    "fingerprint": "firefox",
                    "serverName": "sni.example",
                    "public_key": "PUB",
                    "shortId": "ab",
                    "spiderX": "/x"
                }
            }
        }));

        let link = synthesize("vless", "n1", "u1", &d).unwrap();
        assert_eq!(
            link,
            "vless://u1@n1:443?flow=custom-flow&type=tcp&security=reality&fp=firefox&sni=sni.example&pbk=PUB&sid=ab&spx=/x#XTLS-Reality:u1"
        );
    }

    #[test]
    fn test_vless_reality_default_flow_and_params() {
        let d = desc(json!({ "tcp_reality": { "port": 443 } }));
        let link = synthesize("vless", "n1", "u1", &d).unwrap();
        assert_eq!(
            link,
            "vless://u1@n1:443?flow=xtls-rprx-vision&type=tcp&security=reality&fp=chrome&sni=&pbk=&sid=&spx=#XTLS-Reality:u1"
        );
    }

    #[test]
    fn test_vless_plain_fallback() {
        let d = desc(json!({ "tcp": { "port": 80 } }));
        let link = synthesize("vless", "n1", "u1", &d).unwrap();
        assert_eq!(link, "vless://u1@n1:80?type=tcp&security=none#TCP:u1");
    }

    #[test]
    fn test_vless_no_usable_transport() {
        let d = desc(json!({ "ws": { "port": 80 } }));
        assert_eq!(
            synthesize("vless", "n1", "u1", &d),
            Err(SynthError::NoUsableTransport)
        );
    }

    #[test]
    fn test_vless_portless_reality_falls_back_to_tcp() {
        let d = desc(json!({
            "tcp_reality": { "reality": { "serverName": "s" } },
            "tcp": { "port": 80 }
        }));
        let link = synthesize("vless", "n1", "u1", &d).unwrap();
        assert_eq!(link, "vless://u1@n1:80?type=tcp&security=none#TCP:u1");

        let d = desc(json!({ "tcp_reality": { "reality": {} }, "tcp": { "port": 80 } }));
        assert_eq!(
            synthesize("vless", "n1", "u1", &d).unwrap(),
            "vless://u1@n1:80?type=tcp&security=none#TCP:u1"
        );
    }

    #[test]
    fn test_vless_blocks_without_port_are_unusable() {
        let d = desc(json!({ "tcp": {} }));
        assert_eq!(
            synthesize("vless", "n1", "u1", &d),
            Err(SynthError::NoUsableTransport)
        );

        let d = desc(json!({ "tcp_reality": { "reality": {} }, "tcp": {} }));
        assert_eq!(
            synthesize("vless", "n1", "u1", &d),
            Err(SynthError::NoUsableTransport)
        );
    }

    #[test]
    fn test_unsupported_protocol() {
        let d = desc(json!({ "password": "pw", "tcp": { "port": 1 } }));
        assert_eq!(
            synthesize("shadowsocks", "n1", "u1", &d),
            Err(SynthError::UnsupportedProtocol("shadowsocks".to_string()))
        );
    }

    #[test]
    fn test_deterministic_output() {
        let d = desc(json!({
            "password": "pw1",
            "tcp": { "port": 443, "reality": { "serverName": "a" } }
        }));

        let first = synthesize("trojan", "n1", "u1", &d).unwrap();
        for _ in 0..10 {
            assert_eq!(synthesize("trojan", "n1", "u1", &d).unwrap(), first);
        }
    }

    #[test]
    fn test_protocol_round_trip_names() {
        assert_eq!("trojan".parse::<Protocol>().unwrap(), Protocol::Trojan);
        assert_eq!(Protocol::Vless.to_string(), "vless");
        assert!("VLESS".parse::<Protocol>().is_err());
    }
}

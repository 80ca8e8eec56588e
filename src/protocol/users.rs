//! Connected-user list returned for `LIST`
//!
//! The server answers with `<count>|<ip>:<port>:<ROLE>:UDP=<port>|...`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Role;

/// One entry of the server's connected-user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedUser {
    pub address: String,
    pub port: u16,
    pub role: Role,
    /// Telemetry port registered by that client, 0 when unknown
    pub udp_port: u16,
}

/// Parse the payload of a `LIST` frame.
///
/// Entries that do not match the expected layout are skipped. A count field
/// that disagrees with the number of entries is logged, not enforced.
pub fn parse(payload: &str) -> Vec<ConnectedUser> {
    let mut parts = payload.split('|');
    let declared = parts.next().and_then(|count| count.trim().parse::<usize>().ok());

    let users: Vec<ConnectedUser> = parts.filter_map(parse_entry).collect();

    match declared {
        Some(count) if count != users.len() => {
            debug!(declared = count, parsed = users.len(), "User list count mismatch");
        }
        _ => {}
    }

    users
}

fn parse_entry(entry: &str) -> Option<ConnectedUser> {
    let mut fields = entry.trim().split(':');
    let address = fields.next()?.to_string();
    let port = fields.next()?.parse().ok()?;
    let role = match fields.next()? {
        "ADMIN" => Role::Admin,
        "OBSERVER" => Role::Observer,
        _ => return None,
    };
    let udp_port = fields
        .next()
        .and_then(|udp| udp.strip_prefix("UDP="))
        .and_then(|port| port.parse().ok())
        .unwrap_or(0);

    if address.is_empty() {
        return None;
    }

    Some(ConnectedUser { address, port, role, udp_port })
}

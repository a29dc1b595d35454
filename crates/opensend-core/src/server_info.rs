//! Metadata negotiated with the server during the handshake.

use serde_json::Value;

/// MOTD used until the server supplies its own.
pub const DEFAULT_MOTD: &str = "A third-party OpenSend Messaging Server.";

/// Server information accumulated across the handshake.
///
/// Only the `Information` and `SetProtocol` transitions write here, so the
/// value is frozen once the connection is ready to authenticate.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInformation {
    motd: String,
    protocol: Option<Value>,
}

impl ServerInformation {
    /// Message of the day.
    pub fn motd(&self) -> &str {
        &self.motd
    }

    /// Protocol agreed in `server:set_protocol`, as the server sent it.
    pub fn protocol(&self) -> Option<&Value> {
        self.protocol.as_ref()
    }

    pub(crate) fn adopt_motd(&mut self, motd: Option<&str>) {
        if let Some(motd) = motd {
            self.motd = motd.to_string();
        }
    }

    pub(crate) fn set_protocol(&mut self, protocol: Value) {
        self.protocol = Some(protocol);
    }
}

impl Default for ServerInformation {
    fn default() -> Self {
        Self { motd: DEFAULT_MOTD.to_string(), protocol: None }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn motd_defaults_until_adopted() {
        let mut info = ServerInformation::default();
        assert_eq!(info.motd(), DEFAULT_MOTD);
        info.adopt_motd(None);
        assert_eq!(info.motd(), DEFAULT_MOTD);
        info.adopt_motd(Some("Welcome"));
        assert_eq!(info.motd(), "Welcome");
    }

    #[test]
    fn protocol_is_kept_verbatim() {
        let mut info = ServerInformation::default();
        assert!(info.protocol().is_none());
        info.set_protocol(json!(2));
        assert_eq!(info.protocol(), Some(&json!(2)));
    }
}

//! Local application identity.

use opensend_proto::ClientMessage;

use crate::error::ConnectionError;

/// Range of protocol versions the client supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolWindow {
    not_before: u32,
    not_after: u32,
}

impl ProtocolWindow {
    /// Create a window; `not_before` must not exceed `not_after`.
    pub fn new(not_before: u32, not_after: u32) -> Result<Self, ConnectionError> {
        if not_before > not_after {
            return Err(ConnectionError::InvalidWindow { not_before, not_after });
        }
        Ok(Self { not_before, not_after })
    }

    /// Oldest supported version.
    pub fn not_before(self) -> u32 {
        self.not_before
    }

    /// Newest supported version.
    pub fn not_after(self) -> u32 {
        self.not_after
    }
}

impl Default for ProtocolWindow {
    fn default() -> Self {
        Self { not_before: 1, not_after: 1 }
    }
}

/// Name, version and protocol window the client announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationIdentity {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
    /// Supported protocol versions
    pub window: ProtocolWindow,
}

impl ApplicationIdentity {
    /// Create an identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>, window: ProtocolWindow) -> Self {
        Self { name: name.into(), version: version.into(), window }
    }

    /// Reply to `server:information`.
    pub fn information(&self) -> ClientMessage {
        ClientMessage::Information { application: self.name.clone(), version: self.version.clone() }
    }

    /// Reply to `server:negotiate`.
    pub fn negotiate(&self) -> ClientMessage {
        ClientMessage::Negotiate {
            not_before: self.window.not_before(),
            not_after: self.window.not_after(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_window_is_rejected() {
        assert_eq!(
            ProtocolWindow::new(3, 1),
            Err(ConnectionError::InvalidWindow { not_before: 3, not_after: 1 })
        );
        let window = ProtocolWindow::new(1, 3).unwrap();
        assert_eq!((window.not_before(), window.not_after()), (1, 3));
        assert!(ProtocolWindow::new(2, 2).is_ok());
    }

    #[test]
    fn replies_carry_identity() {
        let identity =
            ApplicationIdentity::new("opensend", "0.1.0", ProtocolWindow::new(2, 5).unwrap());
        assert_eq!(
            identity.information(),
            ClientMessage::Information {
                application: "opensend".to_string(),
                version: "0.1.0".to_string()
            }
        );
        assert_eq!(identity.negotiate(), ClientMessage::Negotiate { not_before: 2, not_after: 5 });
    }
}

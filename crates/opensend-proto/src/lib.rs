//! Wire format for the OpenSend client protocol.
//!
//! Every message on the wire is an [`Envelope`]: a JSON object carrying an
//! event name, an event-specific `data` object, a millisecond timestamp and an
//! integrity hash. Event names are namespaced by direction (`client:` for what
//! we send, `server:` for what we receive) and the two namespaces never mix.
//!
//! This crate only knows the shape of messages. Computing and checking the
//! integrity hash needs a crypto provider and lives in `opensend-core`.
//!
//! # Modules
//!
//! - [`envelope`]: envelope framing, namespaces and the digest input
//! - [`events`]: inbound `server:*` vocabulary
//! - [`messages`]: outbound `client:*` message templates
//! - [`payloads`]: typed views over inbound `data` objects
//! - [`errors`]: error taxonomy sent to the peer, and local parse errors
#![forbid(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod events;
pub mod messages;
pub mod payloads;

pub use envelope::{Envelope, EnvelopeHash, Namespace};
pub use errors::{ErrorKind, ProtocolError, Result};
pub use events::ServerEvent;
pub use messages::ClientMessage;

//! OpenSend protocol core logic
//!
//! Pure state machine logic for the client side of the OpenSend protocol,
//! completely decoupled from I/O.
//!
//! # Architecture
//!
//! The [`Connection`](connection::Connection) never touches a socket, a clock
//! or an entropy source directly. Inbound text and the current time are passed
//! in; replies come back as [`ConnectionAction`](connection::ConnectionAction)s
//! that a runtime executes. Digests and randomness come from the
//! [`CryptoProvider`](opensend_crypto::CryptoProvider) the connection owns.
//!
//! ```text
//!   transport text ──> Connection::handle_text
//!                         │  EnvelopeCodec::decode (parse, namespace, digest)
//!                         │  dispatch (state x event)
//!                         ↓
//!                      Vec<ConnectionAction> ──> runtime stamps + sends
//! ```
//!
//! Protocol violations never surface as Rust errors from the dispatch entry
//! point. They are answered with `client:error` envelopes instead.
//!
//! # Components
//!
//! - [`connection`]: Connection state machine (handshake, authentication, timeouts)
//! - [`codec`]: Envelope stamping and validation
//! - [`auth`]: Authentication challenge tracking
//! - [`reporter`]: Mapping of rejections to `client:error` replies
//! - [`identity`]: Local application identity
//! - [`server_info`]: Metadata negotiated with the server
//! - [`mod@env`]: Environment abstraction (time)
//! - [`transport`]: Transport abstraction (text channel)
//! - [`error`]: Connection error types
#![forbid(unsafe_code)]

pub mod auth;
pub mod codec;
pub mod connection;
pub mod env;
pub mod error;
pub mod identity;
pub mod reporter;
pub mod server_info;
pub mod transport;

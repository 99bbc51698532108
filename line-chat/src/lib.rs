//! Line-oriented TCP chat with a single global room.
//!
//! The server greets each connection, asks for a nickname and then relays
//! every line a client sends to everyone connected, decorated with the
//! sender's nickname. Modules, leaf first:
//!
//! - [`protocol`] builds the server's decorated lines. Its
//!   [`protocol::ServerLine`] classifies received lines into notices and
//!   chat lines for front ends that render more than raw text; the terminal
//!   client prints lines verbatim and does not need it.
//! - [`session`] line reading/writing over a byte stream plus the per-session
//!   outbound queue and its writer task.
//! - [`registry`] the lock-guarded set of joined sessions and broadcast.
//! - [`server`] accept loop, nickname handshake and per-connection loop.
//! - [`client`] the client connection: nickname, background receive task
//!   reporting [`client::ClientEvent`]s, send and close.
//! - [`console`] terminal client on top of [`client`].
//! - [`cli`] the command-line interface for server and client modes.

pub mod cli;
pub mod client;
pub mod console;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

//! # Line Broadcast Server Library
//!
//! This library provides a small real-time text broadcast server. Clients
//! connect over TCP, announce a display name and exchange newline-delimited
//! text lines that are fanned out to every other connected client.
//!
//! ## Wire Protocol
//!
//! Inbound lines:
//! - `NAME::<name>` sets the sender's display name (no reply)
//! - `TXT::<content>` broadcasts `TXT::<name>: <content>` to everyone else
//!
//! Any other line is ignored. The sender never receives its own text.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Binds the listening socket and runs the accept loop. Every accepted
//! connection becomes a registered session before the next accept.
//!
//! ### Session Module (`session`)
//! Owns one connection: the read loop that frames and parses lines, and a
//! writer task that performs best-effort delivery of broadcast lines.
//!
//! ### Registry Module (`registry`)
//! The set of live sessions, held as weak handles behind a single lock, and
//! the fan-out primitive that excludes the sender.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::ChatServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ChatServer::bind("0.0.0.0:1234".parse()?).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod network;
pub mod registry;
pub mod session;

// byme-api: Async Rust client for the By-me home automation web server
//
// Session handling, the SOAP-shaped envelope codec and the fixed SQL
// statements the controller answers. Nothing here knows about device
// classification; rows stay raw strings until `byme-core` merges them.

pub mod auth;
pub mod client;
pub mod codec;
pub mod error;
pub mod models;
pub mod queries;
pub mod transport;

pub use client::WebClient;
pub use codec::SetValueOptionals;
pub use error::Error;
pub use models::{Room, RoomIndex, Row};
pub use transport::{TlsMode, TlsProfile, TransportConfig};

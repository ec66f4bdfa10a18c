//! Host-facing wire types.
//!
//! `request::Request` is what the host sends; `events` holds everything the
//! session writes back. All types are serde camelCase JSON.

pub mod events;
pub mod request;

//! Resolvers for the DNS server: answer a decoded request with a
//! fresh response message.
//!
//! Two resolvers are available.  The local resolver serves A records
//! from the configured record set.  The forwarding resolver splits a
//! request into single-question queries, sends them to an upstream
//! nameserver concurrently, and merges the successful answers.  Which
//! one handles a request is decided purely by whether an upstream
//! address is configured.

use std::fmt;
use std::net::SocketAddr;

use dns_wire::types::{DomainName, Message, RecordType};

pub mod forwarding;
pub mod local;
pub mod records;

mod net;

use crate::records::RecordSet;

/// Resolve a request into a response message.
///
/// # Errors
///
/// See `ResolutionError`.
pub async fn resolve(
    upstream: Option<SocketAddr>,
    records: &RecordSet,
    request: &Message,
) -> Result<Message, ResolutionError> {
    match upstream {
        Some(address) => Ok(forwarding::resolve_forwarding(address, request).await),
        None => local::resolve_local(records, request),
    }
}

/// Errors encountered while resolving a request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResolutionError {
    /// A question asks for a record type the local resolver cannot
    /// serve.  The listener answers these with `NotImplemented`.
    UnsupportedType { rtype: RecordType },

    /// A configured record's value cannot be interpreted as its
    /// record type.
    InvalidRecord { name: DomainName, value: String },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolutionError::UnsupportedType { rtype } => {
                write!(f, "unsupported question type {rtype}")
            }
            ResolutionError::InvalidRecord { name, value } => {
                write!(f, "invalid record value {value:?} for {name}")
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

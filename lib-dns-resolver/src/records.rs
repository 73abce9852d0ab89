//! The configured record set: an immutable map from (type, name)
//! pairs to records, loaded once at startup.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use dns_wire::types::{DomainName, RecordType};

use crate::ResolutionError;

/// A single configured record.  The value is kept as the configured
/// string and only interpreted when an answer is synthesised, so a
/// typo in one record cannot prevent the rest from loading.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Record {
    pub name: DomainName,
    pub rtype: RecordType,
    pub value: String,
    pub ttl: u32,
}

impl Record {
    /// Interpret the configured value as RDATA for this record's
    /// type.  For A records that is the dotted-quad address as exactly
    /// four octets.
    ///
    /// # Errors
    ///
    /// If the value cannot be interpreted.
    pub fn encode_rdata(&self) -> Result<Vec<u8>, ResolutionError> {
        let invalid = || ResolutionError::InvalidRecord {
            name: self.name.clone(),
            value: self.value.clone(),
        };

        match self.rtype {
            RecordType::A => {
                let address: Ipv4Addr = self.value.parse().map_err(|_| invalid())?;
                Ok(address.octets().to_vec())
            }
            _ => Err(invalid()),
        }
    }
}

/// The record map consulted by the local resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: HashMap<(RecordType, DomainName), Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous record with the same
    /// type and name.
    pub fn insert(&mut self, record: Record) {
        self.records
            .insert((record.rtype, record.name.clone()), record);
    }

    pub fn lookup(&self, rtype: RecordType, name: &DomainName) -> Option<&Record> {
        self.records.get(&(rtype, name.clone()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

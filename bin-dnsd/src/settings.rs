//! The JSON settings file: a list of records to serve.
//!
//! ```json
//! { "records": [
//!     { "name": "example.com", "type": "A", "value": "1.2.3.4", "ttl": 60 }
//! ]}
//! ```

use std::fmt;

use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use dns_resolver::records::{Record, RecordSet};
use dns_wire::types::{DomainName, RecordType};

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub records: Vec<RecordSetting>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct RecordSetting {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
    /// Free-form annotation, accepted but otherwise unused.
    #[serde(default)]
    pub note: Option<String>,
}

impl Settings {
    /// # Errors
    ///
    /// If the file cannot be read or does not match the schema.
    pub fn new(filename: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(filename, FileFormat::Json))
            .build()?
            .try_deserialize()
    }

    /// Validate the record list into the resolver's record set.
    /// Unknown record types and malformed names are load-time errors,
    /// not something to discover when the first query arrives.
    ///
    /// # Errors
    ///
    /// See `SettingsError`.
    pub fn into_record_set(self) -> Result<RecordSet, SettingsError> {
        let mut records = RecordSet::new();

        for setting in self.records {
            if RecordType::from_name(&setting.record_type) != Some(RecordType::A) {
                return Err(SettingsError::UnsupportedRecordType {
                    name: setting.name,
                    record_type: setting.record_type,
                });
            }

            let Some(name) = DomainName::from_dotted_string(&setting.name) else {
                return Err(SettingsError::InvalidName { name: setting.name });
            };

            records.insert(Record {
                name,
                rtype: RecordType::A,
                value: setting.value,
                ttl: setting.ttl,
            });
        }

        Ok(records)
    }
}

/// Errors encountered when validating the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SettingsError {
    UnsupportedRecordType { name: String, record_type: String },
    InvalidName { name: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SettingsError::UnsupportedRecordType { name, record_type } => {
                write!(f, "record {name:?} has unsupported type {record_type:?}")
            }
            SettingsError::InvalidName { name } => {
                write!(f, "record name {name:?} is not a valid domain name")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

//! Serialisation of DNS messages to the wire format.  See the `types`
//! module for details of the format.

use std::fmt;

use crate::types::*;

impl Message {
    /// Encode this message as a single datagram of at most
    /// [`UDP_MAX_LEN`] octets.
    ///
    /// The question and answer counts are taken from the actual
    /// vectors, not from the header, so the emitted datagram is always
    /// self-consistent.  If the encoding would exceed the UDP limit,
    /// trailing answers are dropped (whole records at a time) until it
    /// fits, the answer count is patched, and the TC flag is set.
    /// Questions are never dropped.
    ///
    /// # Errors
    ///
    /// If a section count or RDATA length does not fit in 16 bits.
    pub fn into_octets(self) -> Result<Vec<u8>, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    /// # Errors
    ///
    /// If a section count or RDATA length does not fit in 16 bits.
    pub fn serialise(self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let start = buffer.index();

        let mut header = self.header;
        header.qdcount = usize_to_u16(self.questions.len())?;
        header.ancount = usize_to_u16(self.answers.len())?;
        header.serialise(buffer);

        for question in self.questions {
            question.serialise(buffer);
        }

        let mut kept_answers = 0;
        let mut kept_end = buffer.index();
        for rr in self.answers {
            rr.serialise(buffer)?;
            if buffer.index() - start <= UDP_MAX_LEN {
                kept_answers += 1;
                kept_end = buffer.index();
            }
        }

        if buffer.index() - start > UDP_MAX_LEN {
            buffer.truncate(kept_end);
            let [hi, lo] = u16::to_be_bytes(kept_answers);
            buffer.octets[start + 6] = hi;
            buffer.octets[start + 7] = lo;
            buffer.octets[start + 2] |= HEADER_MASK_TC;
        }

        Ok(())
    }
}

impl Header {
    /// Every field is written bit-for-bit as stored: the header codec
    /// round-trips exactly, and it is `Message::serialise` that keeps
    /// the counts honest.
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        // octet 1
        let flag_qr = if self.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode = HEADER_MASK_OPCODE & (u8::from(self.opcode) << HEADER_OFFSET_OPCODE);
        let flag_aa = if self.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if self.is_truncated { HEADER_MASK_TC } else { 0 };
        let flag_rd = if self.recursion_desired {
            HEADER_MASK_RD
        } else {
            0
        };
        // octet 2
        let flag_ra = if self.recursion_available {
            HEADER_MASK_RA
        } else {
            0
        };
        let field_z = HEADER_MASK_Z & (self.reserved << HEADER_OFFSET_Z);
        let field_rcode = HEADER_MASK_RCODE & u8::from(self.rcode);

        buffer.write_u16(self.id);
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc | flag_rd);
        buffer.write_u8(flag_ra | field_z | field_rcode);
        buffer.write_u16(self.qdcount);
        buffer.write_u16(self.ancount);
        buffer.write_u16(self.nscount);
        buffer.write_u16(self.arcount);
    }
}

impl Question {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        buffer.write_u16(self.rtype.into());
        buffer.write_u16(self.rclass.into());
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the RDATA is too long.
    pub fn serialise(self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let rdlength = match u16::try_from(self.data.len()) {
            Ok(rdlength) => rdlength,
            Err(_) => {
                return Err(Error::RdataTooLarge {
                    length: self.data.len(),
                })
            }
        };

        self.name.serialise(buffer);
        buffer.write_u16(self.rtype.into());
        buffer.write_u16(self.rclass.into());
        buffer.write_u32(self.ttl);
        buffer.write_u16(rdlength);
        buffer.write_octets(&self.data);

        Ok(())
    }
}

impl DomainName {
    /// Names are always written in full, never as compression
    /// pointers.  Upstream resolvers accept uncompressed names, and a
    /// stateless encoder needs no buffer-global label dictionary.
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        for label in self.labels() {
            buffer.write_u8(label.len() as u8);
            buffer.write_octets(label.as_bytes());
        }
        buffer.write_u8(0);
    }
}

/// Errors encountered when serialising a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A section count does not fit in 16 bits.
    CountTooLarge { count: usize },

    /// A record's RDATA does not fit in a 16-bit length field.
    RdataTooLarge { length: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CountTooLarge { count } => {
                write!(f, "section count {count} does not fit in a u16")
            }
            Error::RdataTooLarge { length } => {
                write!(f, "RDATA length {length} does not fit in a u16")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A buffer which can be written to, for serialisation purposes.
pub struct WritableBuffer {
    pub octets: Vec<u8>,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: Vec::with_capacity(UDP_MAX_LEN),
        }
    }
}

impl WritableBuffer {
    pub fn index(&self) -> usize {
        self.octets.len()
    }

    pub fn truncate(&mut self, index: usize) {
        self.octets.truncate(index);
    }

    pub fn write_u8(&mut self, octet: u8) {
        self.octets.push(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        for octet in value.to_be_bytes() {
            self.octets.push(octet);
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        for octet in value.to_be_bytes() {
            self.octets.push(octet);
        }
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        for octet in octets {
            self.octets.push(*octet);
        }
    }
}

/// Helper function to convert a `usize` into a `u16` (or return an
/// error).
fn usize_to_u16(count: usize) -> Result<u16, Error> {
    u16::try_from(count).map_err(|_| Error::CountTooLarge { count })
}

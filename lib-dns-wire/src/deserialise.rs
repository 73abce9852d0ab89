//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use std::fmt;

use crate::types::*;

impl Message {
    /// Decode a single datagram.
    ///
    /// Questions and answers are read according to the header counts;
    /// any bytes after the answer section (the authority and
    /// additional sections) are left unparsed, with only their counts
    /// surviving in the header.
    ///
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let header = Header::deserialise(buffer)?;
        let mut questions = Vec::with_capacity(header.qdcount.into());
        let mut answers = Vec::with_capacity(header.ancount.into());

        for _ in 0..header.qdcount {
            questions.push(Question::deserialise(header.id, buffer)?);
        }
        for _ in 0..header.ancount {
            answers.push(ResourceRecord::deserialise(header.id, buffer)?);
        }

        Ok(Self {
            header,
            questions,
            answers,
        })
    }
}

impl Header {
    /// # Errors
    ///
    /// If the header is too short.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16().ok_or(Error::TooShortForId)?;
        let flags1 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let flags2 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let qdcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let ancount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let nscount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let arcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;

        Ok(Self {
            id,
            is_response: flags1 & HEADER_MASK_QR != 0,
            opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
            is_authoritative: flags1 & HEADER_MASK_AA != 0,
            is_truncated: flags1 & HEADER_MASK_TC != 0,
            recursion_desired: flags1 & HEADER_MASK_RD != 0,
            recursion_available: flags2 & HEADER_MASK_RA != 0,
            reserved: (flags2 & HEADER_MASK_Z) >> HEADER_OFFSET_Z,
            rcode: Rcode::from(flags2 & HEADER_MASK_RCODE),
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype = buffer
            .next_u16()
            .ok_or(Error::QuestionTooShort(id))?
            .into();
        let rclass = buffer
            .next_u16()
            .ok_or(Error::QuestionTooShort(id))?
            .into();

        Ok(Self {
            name,
            rtype,
            rclass,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype = buffer.next_u16().ok_or(Error::RecordTooShort(id))?.into();
        let rclass = buffer.next_u16().ok_or(Error::RecordTooShort(id))?.into();
        let ttl = buffer.next_u32().ok_or(Error::RecordTooShort(id))?;
        let rdlength = buffer.next_u16().ok_or(Error::RecordTooShort(id))?;
        let data = buffer
            .take(rdlength as usize)
            .ok_or(Error::RecordTooShort(id))?
            .to_vec();

        Ok(Self {
            name,
            rtype,
            rclass,
            ttl,
            data,
        })
    }
}

impl DomainName {
    /// Read a name, expanding compression pointers.
    ///
    /// Pointers hold absolute offsets into the datagram, so decoding
    /// works on the full-buffer cursor rather than a slice.  The first
    /// pointer ends the caller's involvement: the caller's cursor
    /// stops two octets past it, and any further labels are read at
    /// the pointed-to offsets.  Pointer chains are bounded, so a
    /// malicious cycle fails instead of spinning.
    ///
    /// # Errors
    ///
    /// If the name cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let mut labels = Vec::with_capacity(5);
        let mut encoded_len = 1;
        let mut hops = 0;
        let mut jumped: Option<ConsumableBuffer> = None;

        loop {
            let cursor = match jumped.as_mut() {
                Some(cursor) => cursor,
                None => &mut *buffer,
            };

            let size = cursor.next_u8().ok_or(Error::NameTooShort(id))?;
            match size & 0b1100_0000 {
                0b0000_0000 => {
                    if size == 0 {
                        break;
                    }

                    let octets = cursor
                        .take(size as usize)
                        .ok_or(Error::NameTooShort(id))?;
                    encoded_len += 1 + usize::from(size);
                    if encoded_len > NAME_MAX_ENCODED_LEN {
                        return Err(Error::NameTooLong(id));
                    }

                    let mut label = String::with_capacity(size.into());
                    for octet in octets {
                        label.push(octet.to_ascii_lowercase() as char);
                    }
                    labels.push(label);
                }
                0b1100_0000 => {
                    hops += 1;
                    if hops > NAME_POINTER_HOP_LIMIT {
                        return Err(Error::NamePointerLoop(id));
                    }

                    let lo = cursor.next_u8().ok_or(Error::NameTooShort(id))?;
                    let target = usize::from(u16::from_be_bytes([size & 0b0011_1111, lo]));
                    let next = cursor
                        .at_offset(target)
                        .ok_or(Error::NamePointerInvalid(id))?;
                    jumped = Some(next);
                }
                _ => return Err(Error::NameLabelInvalid(id)),
            }
        }

        DomainName::from_labels(labels).ok_or(Error::NameLabelInvalid(id))
    }
}

/// Errors encountered when parsing a datagram.  In all the errors
/// which have a `u16` parameter, that is the ID from the header, for
/// correlating the log line with the failed query.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The datagram is not even 2 octets long, so it does not contain
    /// a transaction ID.
    TooShortForId,

    /// The header is missing one or more required fields.
    HeaderTooShort(u16),

    /// A question ends with an incomplete field.
    QuestionTooShort(u16),

    /// A resource record ends with an incomplete field.
    RecordTooShort(u16),

    /// A name runs past the end of the buffer.
    NameTooShort(u16),

    /// A name is over 255 octets in its encoded form.
    NameTooLong(u16),

    /// A length octet uses one of the reserved tags, or the labels do
    /// not form a valid name.
    NameLabelInvalid(u16),

    /// A compression pointer targets an offset outside the buffer.
    NamePointerInvalid(u16),

    /// A chain of compression pointers exceeds the hop bound, which
    /// only a cycle can do.
    NamePointerLoop(u16),
}

impl Error {
    pub fn id(self) -> Option<u16> {
        match self {
            Error::TooShortForId => None,
            Error::HeaderTooShort(id) => Some(id),
            Error::QuestionTooShort(id) => Some(id),
            Error::RecordTooShort(id) => Some(id),
            Error::NameTooShort(id) => Some(id),
            Error::NameTooLong(id) => Some(id),
            Error::NameLabelInvalid(id) => Some(id),
            Error::NamePointerInvalid(id) => Some(id),
            Error::NamePointerLoop(id) => Some(id),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TooShortForId => write!(f, "datagram too short to hold an ID"),
            Error::HeaderTooShort(id) => write!(f, "header too short (id {id})"),
            Error::QuestionTooShort(id) => write!(f, "question too short (id {id})"),
            Error::RecordTooShort(id) => write!(f, "resource record too short (id {id})"),
            Error::NameTooShort(id) => write!(f, "name too short (id {id})"),
            Error::NameTooLong(id) => write!(f, "name over 255 octets (id {id})"),
            Error::NameLabelInvalid(id) => write!(f, "invalid name label (id {id})"),
            Error::NamePointerInvalid(id) => {
                write!(f, "name pointer outside the datagram (id {id})")
            }
            Error::NamePointerLoop(id) => write!(f, "name pointer loop (id {id})"),
        }
    }
}

impl std::error::Error for Error {}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        if self.octets.len() > self.position {
            let a = self.octets[self.position];
            self.position += 1;
            Some(a)
        } else {
            None
        }
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        if self.octets.len() > self.position + 1 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            self.position += 2;
            Some(u16::from_be_bytes([a, b]))
        } else {
            None
        }
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        if self.octets.len() > self.position + 3 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            let c = self.octets[self.position + 2];
            let d = self.octets[self.position + 3];
            self.position += 4;
            Some(u32::from_be_bytes([a, b, c, d]))
        } else {
            None
        }
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.octets.len() >= self.position + size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }

    /// A second cursor over the same buffer, positioned at an absolute
    /// offset.  `None` if the offset is outside the buffer.
    pub fn at_offset(&self, position: usize) -> Option<ConsumableBuffer<'a>> {
        if position < self.octets.len() {
            Some(Self {
                octets: self.octets,
                position,
            })
        } else {
            None
        }
    }
}

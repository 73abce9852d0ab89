use std::fmt;

/// The largest datagram this server sends or receives.  Queries are
/// carried over UDP only, so the RFC 1035 section 2.3.4 limit applies.
pub const UDP_MAX_LEN: usize = 512;

/// A label must be 63 octets or shorter.
pub const LABEL_MAX_LEN: usize = 63;

/// A name must be 255 octets or shorter in its encoded form, including
/// both length and label octets.
pub const NAME_MAX_ENCODED_LEN: usize = 255;

/// How many compression pointers may be followed while decoding a
/// single name.  Any legitimate encoding needs far fewer; past this the
/// pointer graph must contain a cycle.
pub const NAME_POINTER_HOP_LIMIT: usize = 128;

pub const HEADER_MASK_QR: u8 = 0b1000_0000;
pub const HEADER_MASK_OPCODE: u8 = 0b0111_1000;
pub const HEADER_OFFSET_OPCODE: usize = 3;
pub const HEADER_MASK_AA: u8 = 0b0000_0100;
pub const HEADER_MASK_TC: u8 = 0b0000_0010;
pub const HEADER_MASK_RD: u8 = 0b0000_0001;
pub const HEADER_MASK_RA: u8 = 0b1000_0000;
pub const HEADER_MASK_Z: u8 = 0b0111_0000;
pub const HEADER_OFFSET_Z: usize = 4;
pub const HEADER_MASK_RCODE: u8 = 0b0000_1111;

/// Basic DNS message format, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.  The authority and additional sections
/// are not modelled: this server neither produces nor consumes them,
/// so the decoder skips their bytes and only the counts survive in the
/// header.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
}

impl Message {
    /// The skeleton of a reply to this message: `id`, `opcode`, and
    /// `recursion_desired` echoed, `rcode` derived from the opcode,
    /// everything else empty.  The caller fills in the question and
    /// answer sections and their counts.
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: false,
                reserved: 0,
                rcode: Rcode::for_opcode(self.header.opcode),
                qdcount: 0,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: Vec::new(),
            answers: Vec::new(),
        }
    }

    /// A fresh single-question query, as sent to an upstream
    /// nameserver.
    pub fn from_question(id: u16, opcode: Opcode, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                reserved: 0,
                rcode: Rcode::Succeeded,
                qdcount: 1,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: vec![question],
            answers: Vec::new(),
        }
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.1 of RFC 1035.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Header {
    /// A 16 bit identifier assigned by the program that generates the
    /// query.  Copied verbatim into the reply so the requester can
    /// match replies to outstanding queries.
    pub id: u16,

    /// Whether this message is a query (false) or a response (true).
    pub is_response: bool,

    /// What kind of query this message carries.  Set by the originator
    /// and copied into the response.
    pub opcode: Opcode,

    /// Whether the responding server is an authority for the domain
    /// name in the question section.
    pub is_authoritative: bool,

    /// Whether this message was cut down to fit the transmission
    /// channel.
    pub is_truncated: bool,

    /// Set in a query (and copied into the response) to direct the
    /// server to pursue the query recursively.
    pub recursion_desired: bool,

    /// Set in a response to advertise recursive query support.
    pub recursion_available: bool,

    /// The 3-bit Z field.  Reserved, but carried through verbatim on
    /// decode; messages built by this server always emit zero.
    pub reserved: u8,

    /// The response code.
    pub rcode: Rcode,

    /// Number of entries in the question section.
    pub qdcount: u16,

    /// Number of resource records in the answer section.
    pub ancount: u16,

    /// Number of resource records in the authority section.  Carried
    /// through on decode; the section itself is not parsed.
    pub nscount: u16,

    /// Number of resource records in the additional section.  Carried
    /// through on decode; the section itself is not parsed.
    pub arcount: u16,
}

/// A single entry in the question section.
///
/// See section 4.1.2 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Question {
    pub name: DomainName,
    pub rtype: RecordType,
    pub rclass: RecordClass,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.rtype, self.rclass)
    }
}

/// A single resource record, as found in the answer section.
///
/// The RDATA is kept as uninterpreted octets: this codec does not need
/// to look inside it, and RDLENGTH is derived from it at serialisation
/// time so the two can never disagree on the wire.
///
/// See section 4.1.3 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    /// Time in seconds that the record may be cached.
    pub ttl: u32,
    /// The record data, interpreted (if at all) by higher layers
    /// according to `rtype`.
    pub data: Vec<u8>,
}

/// What sort of query this is.  Only standard queries are answered;
/// everything else is preserved so it can be echoed back alongside a
/// `NotImplemented` response code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Opcode {
    Query,
    Other(u8),
}

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Query,
            other => Opcode::Other(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::Other(octet) => octet,
        }
    }
}

/// What sort of response this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Rcode {
    Succeeded,
    NotImplemented,
    Other(u8),
}

impl Rcode {
    /// The response code for a reply to a request with the given
    /// opcode: standard queries succeed, anything else is not
    /// implemented.
    pub fn for_opcode(opcode: Opcode) -> Self {
        match opcode {
            Opcode::Query => Rcode::Succeeded,
            Opcode::Other(_) => Rcode::NotImplemented,
        }
    }
}

impl From<u8> for Rcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Rcode::Succeeded,
            4 => Rcode::NotImplemented,
            other => Rcode::Other(other),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::Succeeded => 0,
            Rcode::NotImplemented => 4,
            Rcode::Other(octet) => octet,
        }
    }
}

/// Record types, shared between questions and resource records.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    Unknown(u16),
}

impl RecordType {
    /// Parse a record type from its mnemonic, as used in the
    /// configuration file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "A" => Some(RecordType::A),
            "NS" => Some(RecordType::NS),
            "CNAME" => Some(RecordType::CNAME),
            "SOA" => Some(RecordType::SOA),
            "PTR" => Some(RecordType::PTR),
            "MX" => Some(RecordType::MX),
            "TXT" => Some(RecordType::TXT),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::MX => write!(f, "MX"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::Unknown(n) => write!(f, "{n}"),
        }
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            _ => RecordType::Unknown(value),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::Unknown(value) => value,
        }
    }
}

/// Record classes.  Only the Internet class is ever served.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RecordClass {
    IN,
    Unknown(u16),
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(n) => write!(f, "{n}"),
        }
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            _ => RecordClass::Unknown(value),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(value) => value,
        }
    }
}

/// A fully materialised domain name: ASCII-lowercased labels joined by
/// `.`, with no trailing dot.  Compression pointers can reach anywhere
/// in a datagram, so decoded names own their text rather than
/// borrowing from the receive buffer.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct DomainName {
    name: String,
}

impl DomainName {
    /// The root domain, which has no labels.
    pub fn root() -> Self {
        DomainName {
            name: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Parse a dotted name like `"example.com"`.  `"."` is the root.
    /// Fails on empty labels, labels over 63 octets, or names whose
    /// encoded form would exceed 255 octets.
    pub fn from_dotted_string(s: &str) -> Option<Self> {
        if s == "." {
            return Some(Self::root());
        }

        Self::from_labels(s.split('.').map(str::to_string).collect())
    }

    /// Build a name from its labels, validating and lowercasing them.
    pub fn from_labels(labels: Vec<String>) -> Option<Self> {
        if labels.is_empty() {
            return Some(Self::root());
        }

        let mut encoded_len = 1;
        for label in &labels {
            if label.is_empty() || label.len() > LABEL_MAX_LEN {
                return None;
            }
            encoded_len += 1 + label.len();
        }

        if encoded_len > NAME_MAX_ENCODED_LEN {
            return None;
        }

        Some(DomainName {
            name: labels.join(".").to_ascii_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.name.split('.').filter(|label| !label.is_empty())
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DomainName({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_opcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Opcode::from(i)), i);
        }
    }

    #[test]
    fn u8_rcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Rcode::from(i)), i);
        }
    }

    #[test]
    fn u16_recordtype_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordType::from(i)), i);
        }
    }

    #[test]
    fn u16_recordclass_roundtrip() {
        for i in 0..100 {
            assert_eq!(u16::from(RecordClass::from(i)), i);
        }
    }

    #[test]
    fn rcode_for_opcode() {
        assert_eq!(Rcode::Succeeded, Rcode::for_opcode(Opcode::Query));
        assert_eq!(Rcode::NotImplemented, Rcode::for_opcode(Opcode::from(2)));
    }

    #[test]
    fn domainname_parses_and_lowercases() {
        let name = DomainName::from_dotted_string("WWW.Example.COM").unwrap();
        assert_eq!("www.example.com", name.as_str());
        assert_eq!(vec!["www", "example", "com"], name.labels().collect::<Vec<_>>());
    }

    #[test]
    fn domainname_rejects_empty_labels() {
        assert_eq!(None, DomainName::from_dotted_string(""));
        assert_eq!(None, DomainName::from_dotted_string("a..b"));
        assert_eq!(None, DomainName::from_dotted_string("example.com."));
    }

    #[test]
    fn domainname_rejects_oversized_labels() {
        let long_label = "x".repeat(LABEL_MAX_LEN + 1);
        assert_eq!(None, DomainName::from_dotted_string(&long_label));
        assert!(DomainName::from_dotted_string(&long_label[1..]).is_some());
    }

    #[test]
    fn domainname_rejects_oversized_names() {
        let label = "x".repeat(LABEL_MAX_LEN);
        let too_long = [label.as_str(); 4].join(".");
        assert_eq!(None, DomainName::from_dotted_string(&too_long));
    }

    #[test]
    fn domainname_root() {
        let root = DomainName::from_dotted_string(".").unwrap();
        assert!(root.is_root());
        assert_eq!(0, root.labels().count());
        assert_eq!(".", root.to_string());
    }

    #[test]
    fn make_response_echoes_request() {
        let request = Message::from_question(
            0x1234,
            Opcode::Query,
            Question {
                name: DomainName::from_dotted_string("example.com").unwrap(),
                rtype: RecordType::A,
                rclass: RecordClass::IN,
            },
        );

        let mut query = request.clone();
        query.header.recursion_desired = true;
        let response = query.make_response();

        assert_eq!(0x1234, response.header.id);
        assert!(response.header.is_response);
        assert!(response.header.recursion_desired);
        assert_eq!(Rcode::Succeeded, response.header.rcode);
        assert!(response.questions.is_empty());
        assert!(response.answers.is_empty());
    }

    #[test]
    fn make_response_rejects_unknown_opcode() {
        let request = Message::from_question(
            1,
            Opcode::from(2),
            Question {
                name: DomainName::from_dotted_string("example.com").unwrap(),
                rtype: RecordType::A,
                rclass: RecordClass::IN,
            },
        );

        assert_eq!(Rcode::NotImplemented, request.make_response().header.rcode);
    }
}

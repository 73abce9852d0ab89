use dns_wire::deserialise::ConsumableBuffer;
use dns_wire::serialise::WritableBuffer;
use dns_wire::types::*;

#[test]
fn roundtrip_headers() {
    for header in representative_headers() {
        let mut buffer = WritableBuffer::default();
        header.serialise(&mut buffer);
        let deserialised = Header::deserialise(&mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok(header), deserialised);
    }
}

#[test]
fn roundtrip_messages() {
    for original in representative_messages() {
        let octets = original.clone().into_octets().unwrap();
        let deserialised = Message::from_octets(&octets).unwrap();

        assert_eq!(original.header, deserialised.header);
        assert_eq!(original.questions, deserialised.questions);
        assert_eq!(original.answers, deserialised.answers);
    }
}

#[test]
fn roundtrip_questions() {
    for name in ["example.com", "a.b.c.d.example", "xn--bcher-kva.example"] {
        for rtype in [RecordType::A, RecordType::MX, RecordType::Unknown(999)] {
            let original = Question {
                name: domain(name),
                rtype,
                rclass: RecordClass::IN,
            };

            let mut buffer = WritableBuffer::default();
            original.clone().serialise(&mut buffer);
            let deserialised =
                Question::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets));

            assert_eq!(Ok(original), deserialised);
        }
    }
}

#[test]
fn roundtrip_resource_records() {
    for (rtype, data) in [
        (RecordType::A, vec![192, 0, 2, 1]),
        (RecordType::TXT, b"hello=world".to_vec()),
        (RecordType::Unknown(4096), Vec::new()),
    ] {
        let original = ResourceRecord {
            name: domain("record.example.com"),
            rtype,
            rclass: RecordClass::IN,
            ttl: 86400,
            data,
        };

        let mut buffer = WritableBuffer::default();
        original.clone().serialise(&mut buffer).unwrap();
        let deserialised =
            ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok(original), deserialised);
    }
}

fn representative_headers() -> Vec<Header> {
    let mut headers = Vec::new();
    for id in [0, 1, 0xbeef, u16::MAX] {
        for opcode in [Opcode::Query, Opcode::Other(2)] {
            for rcode in [Rcode::Succeeded, Rcode::NotImplemented, Rcode::Other(3)] {
                headers.push(Header {
                    id,
                    is_response: rcode != Rcode::Succeeded,
                    opcode,
                    is_authoritative: id % 2 == 0,
                    is_truncated: false,
                    recursion_desired: id % 2 == 1,
                    recursion_available: false,
                    reserved: (id % 8) as u8,
                    rcode,
                    qdcount: id % 3,
                    ancount: id % 5,
                    nscount: id % 7,
                    arcount: id % 11,
                });
            }
        }
    }
    headers
}

fn representative_messages() -> Vec<Message> {
    let query = Message::from_question(
        0x0101,
        Opcode::Query,
        Question {
            name: domain("www.example.com"),
            rtype: RecordType::A,
            rclass: RecordClass::IN,
        },
    );

    let mut multi_question = Message::from_question(
        0x0202,
        Opcode::Query,
        Question {
            name: domain("one.example.com"),
            rtype: RecordType::A,
            rclass: RecordClass::IN,
        },
    );
    multi_question.questions.push(Question {
        name: domain("two.example.com"),
        rtype: RecordType::TXT,
        rclass: RecordClass::IN,
    });
    multi_question.header.qdcount = 2;

    let mut response = query.make_response();
    response.questions = query.questions.clone();
    response.answers = vec![
        ResourceRecord {
            name: domain("www.example.com"),
            rtype: RecordType::A,
            rclass: RecordClass::IN,
            ttl: 300,
            data: vec![192, 0, 2, 7],
        },
        ResourceRecord {
            name: domain("www.example.com"),
            rtype: RecordType::A,
            rclass: RecordClass::IN,
            ttl: 300,
            data: vec![192, 0, 2, 8],
        },
    ];
    response.header.qdcount = 1;
    response.header.ancount = 2;

    vec![query, multi_question, response]
}

fn domain(name: &str) -> DomainName {
    DomainName::from_dotted_string(name).unwrap()
}

//! Forwarding resolution: split, fan out, merge.
//!
//! Upstream resolvers commonly reject or mishandle multi-question
//! requests, so each question is forwarded as its own single-question
//! query under a fresh transaction id.  The sub-queries run
//! concurrently, each on its own short-lived socket, and the answers
//! are stitched back into one reply under the original id.

use std::net::SocketAddr;

use rand::Rng;

use dns_wire::types::*;

use crate::net::query_upstream;

/// Forward a request to the upstream nameserver.
///
/// The correlation map from sub-query id to original question is
/// fully built before any I/O starts and only read afterwards.
/// Sub-ids are drawn uniformly at random and re-drawn on collision,
/// so every in-flight sub-query has a distinct id.
///
/// The merge keeps one question/answer pair per sub-query whose
/// response succeeded, is correlated, and actually carries an answer;
/// everything else (timeouts, I/O errors, undecodable responses,
/// upstream failures) is silently absent from the reply.  Merged
/// answers are in completion order, not question order.
pub async fn resolve_forwarding(upstream: SocketAddr, request: &Message) -> Message {
    let mut correlation: Vec<(u16, Question)> = Vec::with_capacity(request.questions.len());
    for question in &request.questions {
        let mut sub_id: u16 = rand::thread_rng().gen();
        while correlation.iter().any(|(id, _)| *id == sub_id) {
            sub_id = rand::thread_rng().gen();
        }
        correlation.push((sub_id, question.clone()));
    }

    let mut handles = Vec::with_capacity(correlation.len());
    for (sub_id, question) in &correlation {
        let query = Message::from_question(*sub_id, request.header.opcode, question.clone());
        handles.push(tokio::spawn(query_upstream(upstream, query)));
    }

    // rendezvous: the reply is only assembled once every sub-query
    // has completed, failed, or timed out
    let mut responses = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Some(response)) => responses.push(response),
            Ok(None) => (),
            Err(error) => tracing::debug!(%error, "sub-query task failed"),
        }
    }

    let mut reply = request.make_response();
    for response in responses {
        if response.header.rcode != Rcode::Succeeded {
            tracing::debug!(id = %response.header.id, rcode = ?response.header.rcode, "dropping failed upstream response");
            continue;
        }
        let Some((_, question)) = correlation
            .iter()
            .find(|(id, _)| *id == response.header.id)
        else {
            tracing::debug!(id = %response.header.id, "dropping uncorrelated upstream response");
            continue;
        };
        let Some(answer) = response.answers.into_iter().next() else {
            tracing::debug!(id = %response.header.id, "dropping answerless upstream response");
            continue;
        };

        reply.questions.push(question.clone());
        reply.answers.push(answer);
    }

    reply.header.qdcount = reply.questions.len() as u16;
    reply.header.ancount = reply.answers.len() as u16;

    reply
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    use tokio::net::UdpSocket;

    use super::*;

    fn domain(name: &str) -> DomainName {
        DomainName::from_dotted_string(name).unwrap()
    }

    fn a_question(name: &str) -> Question {
        Question {
            name: domain(name),
            rtype: RecordType::A,
            rclass: RecordClass::IN,
        }
    }

    /// An upstream that answers each query from a fixed name->address
    /// map, with NXDOMAIN for names it does not know.
    async fn serve_upstream(sock: UdpSocket, addresses: HashMap<String, Ipv4Addr>) {
        let mut buf = vec![0u8; UDP_MAX_LEN];
        loop {
            let (size, peer) = sock.recv_from(&mut buf).await.unwrap();
            let query = Message::from_octets(&buf[..size]).unwrap();
            assert_eq!(1, query.questions.len());

            let question = &query.questions[0];
            let mut response = query.make_response();
            match addresses.get(question.name.as_str()) {
                Some(address) => {
                    response.questions.push(question.clone());
                    response.answers.push(ResourceRecord {
                        name: question.name.clone(),
                        rtype: RecordType::A,
                        rclass: RecordClass::IN,
                        ttl: 60,
                        data: address.octets().to_vec(),
                    });
                    response.header.qdcount = 1;
                    response.header.ancount = 1;
                }
                None => response.header.rcode = Rcode::Other(3),
            }

            let serialised = response.into_octets().unwrap();
            sock.send_to(&serialised, peer).await.unwrap();
        }
    }

    async fn spawn_upstream(addresses: &[(&str, Ipv4Addr)]) -> SocketAddr {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = sock.local_addr().unwrap();
        let addresses = addresses
            .iter()
            .map(|(name, addr)| (name.to_string(), *addr))
            .collect();
        tokio::spawn(serve_upstream(sock, addresses));
        address
    }

    #[tokio::test]
    async fn forwarding_splits_and_merges() {
        let upstream = spawn_upstream(&[
            ("one.test", Ipv4Addr::new(1, 1, 1, 1)),
            ("two.test", Ipv4Addr::new(2, 2, 2, 2)),
        ])
        .await;

        let mut request = Message::from_question(0x1234, Opcode::Query, a_question("one.test"));
        request.questions.push(a_question("two.test"));
        request.header.qdcount = 2;
        request.header.recursion_desired = true;

        let reply = resolve_forwarding(upstream, &request).await;

        assert_eq!(0x1234, reply.header.id);
        assert!(reply.header.is_response);
        assert!(reply.header.recursion_desired);
        assert_eq!(Rcode::Succeeded, reply.header.rcode);
        assert_eq!(2, reply.header.qdcount);
        assert_eq!(2, reply.header.ancount);

        // answer order is not guaranteed; match answers up by name
        for question in &request.questions {
            let answer = reply
                .answers
                .iter()
                .find(|rr| rr.name == question.name)
                .expect("answer for question");
            let expected = if question.name.as_str() == "one.test" {
                vec![1, 1, 1, 1]
            } else {
                vec![2, 2, 2, 2]
            };
            assert_eq!(expected, answer.data);
        }
    }

    #[tokio::test]
    async fn forwarding_drops_name_errors_from_merge() {
        let upstream = spawn_upstream(&[("known.test", Ipv4Addr::new(1, 1, 1, 1))]).await;

        let mut request = Message::from_question(0x2345, Opcode::Query, a_question("known.test"));
        request.questions.push(a_question("unknown.test"));
        request.header.qdcount = 2;

        let reply = resolve_forwarding(upstream, &request).await;

        assert_eq!(0x2345, reply.header.id);
        assert_eq!(Rcode::Succeeded, reply.header.rcode);
        assert_eq!(1, reply.header.qdcount);
        assert_eq!(1, reply.header.ancount);
        assert_eq!(vec![a_question("known.test")], reply.questions);
        assert_eq!(vec![1, 1, 1, 1], reply.answers[0].data);
    }

    #[tokio::test]
    async fn forwarding_echoes_id_when_nothing_succeeds() {
        let upstream = spawn_upstream(&[]).await;

        let request = Message::from_question(0xfeed, Opcode::Query, a_question("unknown.test"));
        let reply = resolve_forwarding(upstream, &request).await;

        assert_eq!(0xfeed, reply.header.id);
        assert!(reply.header.is_response);
        assert_eq!(0, reply.header.qdcount);
        assert_eq!(0, reply.header.ancount);
        assert!(reply.questions.is_empty());
        assert!(reply.answers.is_empty());
    }

    #[tokio::test]
    async fn forwarding_drops_uncorrelated_responses() {
        // an upstream that echoes a response under the wrong id
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream = sock.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; UDP_MAX_LEN];
            let (size, peer) = sock.recv_from(&mut buf).await.unwrap();
            let query = Message::from_octets(&buf[..size]).unwrap();

            let mut response = query.make_response();
            response.header.id = query.header.id.wrapping_add(1);
            response.questions = query.questions.clone();
            response.answers.push(ResourceRecord {
                name: query.questions[0].name.clone(),
                rtype: RecordType::A,
                rclass: RecordClass::IN,
                ttl: 60,
                data: vec![6, 6, 6, 6],
            });
            response.header.qdcount = 1;
            response.header.ancount = 1;

            let serialised = response.into_octets().unwrap();
            sock.send_to(&serialised, peer).await.unwrap();
        });

        let request = Message::from_question(0x0042, Opcode::Query, a_question("spoof.test"));
        let reply = resolve_forwarding(upstream, &request).await;

        assert_eq!(0x0042, reply.header.id);
        assert!(reply.answers.is_empty());
    }

    #[tokio::test]
    async fn forwarding_survives_dead_upstream() {
        // bound but never reads: every sub-query runs into the deadline
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream = sock.local_addr().unwrap();

        let request = Message::from_question(0x7777, Opcode::Query, a_question("slow.test"));
        let reply = resolve_forwarding(upstream, &request).await;

        assert_eq!(0x7777, reply.header.id);
        assert!(reply.header.is_response);
        assert!(reply.answers.is_empty());
        drop(sock);
    }
}

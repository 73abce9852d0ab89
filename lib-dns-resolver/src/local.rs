//! Resolution from the configured record set.

use dns_wire::types::*;

use crate::records::RecordSet;
use crate::ResolutionError;

/// Answer a request from the record set alone.
///
/// The response carries one question/answer pair per question that
/// hits a configured record.  Questions that miss are dropped from
/// the response without failing the request, as are questions whose
/// configured value turns out to be garbage (those are also logged).
/// A question for a record type this resolver cannot serve at all
/// fails the whole request.
///
/// # Errors
///
/// See `ResolutionError`.
pub fn resolve_local(
    records: &RecordSet,
    request: &Message,
) -> Result<Message, ResolutionError> {
    let mut response = request.make_response();

    for question in &request.questions {
        match question.rtype {
            RecordType::A => {
                let Some(record) = records.lookup(RecordType::A, &question.name) else {
                    tracing::debug!(name = %question.name, "no record, dropping question");
                    continue;
                };

                match record.encode_rdata() {
                    Ok(data) => {
                        response.questions.push(question.clone());
                        response.answers.push(ResourceRecord {
                            name: question.name.clone(),
                            rtype: RecordType::A,
                            rclass: RecordClass::IN,
                            ttl: record.ttl,
                            data,
                        });
                    }
                    Err(error) => {
                        tracing::warn!(name = %question.name, %error, "skipping question");
                    }
                }
            }
            rtype => return Err(ResolutionError::UnsupportedType { rtype }),
        }
    }

    response.header.qdcount = response.questions.len() as u16;
    response.header.ancount = response.answers.len() as u16;

    Ok(response)
}

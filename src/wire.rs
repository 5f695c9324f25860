//! DNS wire message decoding and reply encoding.
//!
//! This module covers exactly what the forwarder needs: decode enough of a message to log it and
//! to rebuild a reply, and encode a reply from a client query template plus an upstream message.
//! It does not interpret record data beyond its length, and does not implement on-the-wire name
//! compression when encoding (see `DomainName::encode`).

use bytes::Bytes;
use thiserror::Error;

use crate::name::DomainName;

/// Length, in bytes, of the fixed DNS message header.
pub const HEADER_LEN: usize = 12;

/// The OPT pseudo-record type (RFC 6891).
pub const OPT_TYPE: u16 = 41;

/// Bit 15 of the flags field: set on responses, clear on queries.
const FLAG_QR: u16 = 0x8000;

/// Bit 7 of the flags field: recursion available.
const FLAG_RA: u16 = 0x0080;

/// Errors produced while decoding a DNS wire message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before a complete message could be read.
    #[error("message truncated")]
    Truncated,
    /// A label length byte had reserved top bits (`01` or `10`).
    #[error("bad label length")]
    BadLabel,
    /// A compression pointer targeted its own offset or later.
    #[error("bad pointer")]
    BadPointer,
    /// A chain of compression pointers exceeded the hop limit.
    #[error("pointer loop detected")]
    LoopDetected,
    /// A name or section exceeded a size limit.
    #[error("limit exceeded")]
    LimitExceeded,
}

/// A single entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub name: DomainName,
    pub rtype: u16,
    pub rclass: u16,
}

/// A single resource record. `rdata` is retained as an opaque byte slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdata: Bytes,
}

/// The EDNS(0) OPT pseudo-record, lifted out of `additional` during decode.
///
/// Per RFC 6891 the OPT record's class field carries the requestor's UDP payload size and its
/// TTL field is repurposed to carry the extended RCODE, version, and DO flag. Both are preserved
/// byte-for-byte rather than decomposed, since the core never inspects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptRecord {
    pub udp_payload_size: u16,
    pub ttl: u32,
    pub rdata: Bytes,
}

/// A decoded DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub flags: u16,
    pub questions: Vec<QuestionRecord>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
    pub opt: Option<OptRecord>,
    /// The original encoded message, retained so a reply can copy the question section
    /// byte-for-byte rather than re-encoding it.
    raw: Bytes,
    /// Byte range within `raw` spanning the question section (header excluded).
    question_span: (usize, usize),
}

impl Message {
    /// Whether the response bit (QR) is set.
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    /// Whether the recursion-available bit (RA) is set.
    pub fn is_recursion_available(&self) -> bool {
        self.flags & FLAG_RA != 0
    }

    /// The raw question-section bytes as they appeared on the wire.
    pub fn question_bytes(&self) -> &[u8] {
        let (start, end) = self.question_span;
        &self.raw[start..end]
    }

    /// Decodes a complete DNS message from `buf`.
    pub fn decode(buf: &[u8]) -> Result<Message, DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::Truncated);
        }
        let id = read_u16(buf, 0)?;
        let flags = read_u16(buf, 2)?;
        let qdcount = read_u16(buf, 4)?;
        let ancount = read_u16(buf, 6)?;
        let nscount = read_u16(buf, 8)?;
        let arcount = read_u16(buf, 10)?;

        let mut pos = HEADER_LEN;
        let question_start = pos;
        let mut questions = Vec::with_capacity(qdcount as usize);
        for _ in 0..qdcount {
            let (name, end) = DomainName::decode(buf, pos)?;
            pos = end;
            let rtype = read_u16(buf, pos)?;
            let rclass = read_u16(buf, pos + 2)?;
            pos += 4;
            questions.push(QuestionRecord { name, rtype, rclass });
        }
        let question_end = pos;

        let answers = decode_rrs(buf, &mut pos, ancount)?;
        let authority = decode_rrs(buf, &mut pos, nscount)?;
        let additional_raw = decode_rrs(buf, &mut pos, arcount)?;

        let mut opt = None;
        let mut additional = Vec::with_capacity(additional_raw.len());
        for rr in additional_raw {
            if rr.rtype == OPT_TYPE && opt.is_none() {
                opt = Some(OptRecord {
                    udp_payload_size: rr.rclass,
                    ttl: rr.ttl,
                    rdata: rr.rdata,
                });
            } else {
                additional.push(rr);
            }
        }

        Ok(Message {
            id,
            flags,
            questions,
            answers,
            authority,
            additional,
            opt,
            raw: Bytes::copy_from_slice(buf),
            question_span: (question_start, question_end),
        })
    }

    /// Builds a reply: `client` supplies the ID, flags, and question section template; `upstream`
    /// supplies the answer, authority, additional, and OPT data. The response bit and
    /// recursion-available bit are set on the result regardless of the client's flags.
    pub fn encode_reply(client: &Message, upstream: &Message) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + client.question_bytes().len() + 128);

        out.extend_from_slice(&client.id.to_be_bytes());
        out.extend_from_slice(&(client.flags | FLAG_QR | FLAG_RA).to_be_bytes());
        out.extend_from_slice(&(client.questions.len() as u16).to_be_bytes());
        out.extend_from_slice(&(upstream.answers.len() as u16).to_be_bytes());
        out.extend_from_slice(&(upstream.authority.len() as u16).to_be_bytes());
        let arcount = upstream.additional.len() as u16 + u16::from(upstream.opt.is_some());
        out.extend_from_slice(&arcount.to_be_bytes());

        out.extend_from_slice(client.question_bytes());

        for rr in &upstream.answers {
            encode_rr(&mut out, rr);
        }
        for rr in &upstream.authority {
            encode_rr(&mut out, rr);
        }
        for rr in &upstream.additional {
            encode_rr(&mut out, rr);
        }
        if let Some(opt) = &upstream.opt {
            encode_opt(&mut out, opt);
        }

        out
    }
}

fn decode_rrs(
    buf: &[u8],
    pos: &mut usize,
    count: u16,
) -> Result<Vec<ResourceRecord>, DecodeError> {
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (name, end) = DomainName::decode(buf, *pos)?;
        *pos = end;
        let rtype = read_u16(buf, *pos)?;
        let rclass = read_u16(buf, *pos + 2)?;
        let ttl = read_u32(buf, *pos + 4)?;
        let rdlen = read_u16(buf, *pos + 8)? as usize;
        *pos += 10;
        let rdata = buf.get(*pos..*pos + rdlen).ok_or(DecodeError::Truncated)?;
        *pos += rdlen;
        out.push(ResourceRecord {
            name,
            rtype,
            rclass,
            ttl,
            rdata: Bytes::copy_from_slice(rdata),
        });
    }
    Ok(out)
}

fn encode_rr(out: &mut Vec<u8>, rr: &ResourceRecord) {
    rr.name.encode(out);
    out.extend_from_slice(&rr.rtype.to_be_bytes());
    out.extend_from_slice(&rr.rclass.to_be_bytes());
    out.extend_from_slice(&rr.ttl.to_be_bytes());
    out.extend_from_slice(&(rr.rdata.len() as u16).to_be_bytes());
    out.extend_from_slice(&rr.rdata);
}

fn encode_opt(out: &mut Vec<u8>, opt: &OptRecord) {
    out.push(0); // root name
    out.extend_from_slice(&OPT_TYPE.to_be_bytes());
    out.extend_from_slice(&opt.udp_payload_size.to_be_bytes());
    out.extend_from_slice(&opt.ttl.to_be_bytes());
    out.extend_from_slice(&(opt.rdata.len() as u16).to_be_bytes());
    out.extend_from_slice(&opt.rdata);
}

fn read_u16(buf: &[u8], pos: usize) -> Result<u16, DecodeError> {
    let b = buf.get(pos..pos + 2).ok_or(DecodeError::Truncated)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(buf: &[u8], pos: usize) -> Result<u32, DecodeError> {
    let b = buf.get(pos..pos + 4).ok_or(DecodeError::Truncated)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 29-byte query: ID 0xabcd, RD=1, one question for example.com A/IN.
    const QUERY_A_EXAMPLE_COM: &[u8] = &[
        0xab, 0xcd, // id
        0x01, 0x00, // flags: RD=1
        0x00, 0x01, // qdcount
        0x00, 0x00, // ancount
        0x00, 0x00, // nscount
        0x00, 0x00, // arcount
        0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, // name
        0x00, 0x01, // qtype A
        0x00, 0x01, // qclass IN
    ];

    #[test]
    fn decode_query_header_and_question() {
        let msg = Message::decode(QUERY_A_EXAMPLE_COM).unwrap();
        assert_eq!(msg.id, 0xabcd);
        assert!(!msg.is_response());
        assert_eq!(msg.questions.len(), 1);
        assert_eq!(msg.questions[0].name.to_string(), "example.com");
        assert_eq!(msg.questions[0].rtype, 1);
        assert_eq!(msg.questions[0].rclass, 1);
        assert!(msg.answers.is_empty());
        assert!(msg.opt.is_none());
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert_eq!(Message::decode(&[0u8; 4]), Err(DecodeError::Truncated));
    }

    fn a_record(name: &str, addr: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        for label in name.split('.') {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
        buf.extend_from_slice(&1u16.to_be_bytes()); // type A
        buf.extend_from_slice(&1u16.to_be_bytes()); // class IN
        buf.extend_from_slice(&60u32.to_be_bytes()); // ttl
        buf.extend_from_slice(&4u16.to_be_bytes()); // rdlength
        buf.extend_from_slice(&addr);
        buf
    }

    fn upstream_response_one_a() -> Vec<u8> {
        let mut buf = vec![
            0x00, 0x00, // id 0, overwritten by DoH transport
            0x81, 0x80, // QR RD RA
            0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        buf.extend_from_slice(&QUERY_A_EXAMPLE_COM[HEADER_LEN..]);
        buf.extend_from_slice(&a_record("example.com", [93, 184, 216, 34]));
        buf
    }

    #[test]
    fn encode_reply_preserves_client_id_and_question() {
        let client = Message::decode(QUERY_A_EXAMPLE_COM).unwrap();
        let upstream_buf = upstream_response_one_a();
        let upstream = Message::decode(&upstream_buf).unwrap();

        let reply = Message::encode_reply(&client, &upstream);
        assert_eq!(&reply[0..2], &client.id.to_be_bytes());

        let reply_msg = Message::decode(&reply).unwrap();
        assert_eq!(reply_msg.id, 0xabcd);
        assert!(reply_msg.is_response());
        assert!(reply_msg.is_recursion_available());
        assert_eq!(reply_msg.question_bytes(), client.question_bytes());
        assert_eq!(reply_msg.answers.len(), 1);
        assert_eq!(reply_msg.answers[0].rdata.as_ref(), &[93, 184, 216, 34]);
    }

    #[test]
    fn decode_reencode_roundtrip_preserves_sections() {
        let upstream_buf = upstream_response_one_a();
        let msg = Message::decode(&upstream_buf).unwrap();
        let client = Message::decode(QUERY_A_EXAMPLE_COM).unwrap();
        let reencoded = Message::encode_reply(&client, &msg);
        let redecoded = Message::decode(&reencoded).unwrap();

        assert_eq!(redecoded.answers.len(), msg.answers.len());
        assert_eq!(redecoded.authority.len(), msg.authority.len());
        assert_eq!(redecoded.additional.len(), msg.additional.len());
        assert_eq!(
            redecoded.answers[0].name.to_string(),
            msg.answers[0].name.to_string()
        );
        assert_eq!(redecoded.answers[0].rtype, msg.answers[0].rtype);
        assert_eq!(redecoded.answers[0].rdata, msg.answers[0].rdata);
    }

    #[test]
    fn opt_record_lifted_from_additional() {
        let mut buf = vec![
            0x00, 0x01, 0x81, 0x80, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        ];
        buf.extend_from_slice(&QUERY_A_EXAMPLE_COM[HEADER_LEN..]);
        // OPT record: root name, type 41, class (udp payload size) 4096, ttl 0, empty rdata.
        buf.push(0);
        buf.extend_from_slice(&OPT_TYPE.to_be_bytes());
        buf.extend_from_slice(&4096u16.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());

        let msg = Message::decode(&buf).unwrap();
        assert!(msg.additional.is_empty());
        let opt = msg.opt.unwrap();
        assert_eq!(opt.udp_payload_size, 4096);
    }
}

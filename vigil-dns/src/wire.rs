//! DNS wire format

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// Header length in bytes
pub const HEADER_LEN: usize = 12;

/// Largest reply payload emitted over plain UDP
pub const MAX_UDP_PAYLOAD: usize = 512;

/// Receive buffer size for inbound datagrams
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Budget for compression-pointer hops while decoding one name
const MAX_POINTER_HOPS: usize = 128;

/// Wire names may not exceed 255 bytes including length octets
const MAX_NAME_LEN: usize = 255;

/// TTLs with the high bit set are clamped down to this
const MAX_TTL: u32 = i32::MAX as u32;

/// Message header structure
///
/// ```text
/// +--------+--------+--------+--------+--------+--------+
/// | Byte 0 | Byte 1 | Byte 2 | Byte 3 | Byte 4 | Byte 5 |
/// +--------+--------+--------+--------+--------+--------+
/// |   Id (uint16)   |  Flags (uint16) | Qdcount (uint16)|
/// +--------+--------+--------+--------+--------+--------+
///
/// +--------+--------+--------+--------+--------+--------+
/// | Byte 6 | Byte 7 | Byte 8 | Byte 9 | Byte10 | Byte11 |
/// +--------+--------+--------+--------+--------+--------+
/// | Ancount (uint16)| Nscount (uint16)| Arcount (uint16)|
/// +--------+--------+--------+--------+--------+--------+
/// ```
///
/// All integers are big-endian. The four counts describe the question,
/// answer, authority, and additional sections that follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Transaction id, echoed in replies
    pub id: u16,
    /// QR/OPCODE/AA/TC/RD/RA/RCODE bit field
    pub flags: Flags,
    /// Question section
    pub questions: Vec<Question>,
    /// Answer section
    pub answers: Vec<Record>,
    /// Authority section
    pub authorities: Vec<Record>,
    /// Additional section
    pub additionals: Vec<Record>,
}

/// One entry of the question section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Queried name, lowercased, dot-separated labels
    pub name: String,
    /// Queried record type
    pub qtype: RecordType,
    /// Queried class; only IN is accepted on inbound questions
    pub qclass: RecordClass,
}

/// A resource record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Owner name, lowercased, dot-separated labels
    pub name: String,
    /// Record type
    pub rtype: RecordType,
    /// Record class
    pub class: RecordClass,
    /// Time to live in seconds
    pub ttl: u32,
    /// Record payload
    pub data: RecordData,
}

impl Record {
    /// Build an IN A record
    pub fn a(name: impl Into<String>, addr: Ipv4Addr, ttl: u32) -> Self {
        Self {
            name: name.into(),
            rtype: RecordType::A,
            class: RecordClass::In,
            ttl,
            data: RecordData::A(addr),
        }
    }

    /// Build an IN AAAA record
    pub fn aaaa(name: impl Into<String>, addr: Ipv6Addr, ttl: u32) -> Self {
        Self {
            name: name.into(),
            rtype: RecordType::Aaaa,
            class: RecordClass::In,
            ttl,
            data: RecordData::Aaaa(addr),
        }
    }

    /// The address payload, if this is an A or AAAA record
    pub fn ip(&self) -> Option<std::net::IpAddr> {
        match self.data {
            RecordData::A(v4) => Some(v4.into()),
            RecordData::Aaaa(v6) => Some(v6.into()),
            RecordData::Raw(_) => None,
        }
    }
}

/// Record payload; addresses are decoded, everything else passes through verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// IPv4 address of an A record
    A(Ipv4Addr),
    /// IPv6 address of an AAAA record
    Aaaa(Ipv6Addr),
    /// Opaque rdata of any other record type
    Raw(Vec<u8>),
}

/// Record type; A and AAAA are handled locally, the rest is pass-through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Other(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            28 => RecordType::Aaaa,
            other => RecordType::Other(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::Aaaa => 28,
            RecordType::Other(other) => other,
        }
    }
}

/// Record class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    In,
    Other(u16),
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::In,
            other => RecordClass::Other(other),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::In => 1,
            RecordClass::Other(other) => other,
        }
    }
}

/// Response code carried in the low four flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rcode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Other(u8),
}

impl Rcode {
    /// Numeric value as carried on the wire
    pub fn as_u8(self) -> u8 {
        match self {
            Rcode::NoError => 0,
            Rcode::FormErr => 1,
            Rcode::ServFail => 2,
            Rcode::NxDomain => 3,
            Rcode::NotImp => 4,
            Rcode::Other(v) => v,
        }
    }

    /// Decode the low four bits of the flag word
    pub fn from_u8(value: u8) -> Self {
        match value & 0x0F {
            0 => Rcode::NoError,
            1 => Rcode::FormErr,
            2 => Rcode::ServFail,
            3 => Rcode::NxDomain,
            4 => Rcode::NotImp,
            v => Rcode::Other(v),
        }
    }
}

const FLAG_QR: u16 = 0x8000;
const OPCODE_MASK: u16 = 0x7800;
const OPCODE_SHIFT: u16 = 11;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;
const RCODE_MASK: u16 = 0x000F;

/// The second header word: QR, OPCODE, AA, TC, RD, RA, Z, RCODE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u16);

impl Flags {
    /// Wrap a raw flag word
    pub fn new(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw flag word
    pub fn bits(self) -> u16 {
        self.0
    }

    /// QR bit: true for responses
    pub fn is_response(self) -> bool {
        self.0 & FLAG_QR != 0
    }

    pub fn set_response(&mut self, on: bool) {
        self.set(FLAG_QR, on);
    }

    /// Four-bit operation code; 0 is a standard query
    pub fn opcode(self) -> u8 {
        ((self.0 & OPCODE_MASK) >> OPCODE_SHIFT) as u8
    }

    pub fn set_opcode(&mut self, opcode: u8) {
        self.0 = (self.0 & !OPCODE_MASK) | ((u16::from(opcode) << OPCODE_SHIFT) & OPCODE_MASK);
    }

    /// TC bit: the reply was cut down to fit the UDP payload limit
    pub fn truncated(self) -> bool {
        self.0 & FLAG_TC != 0
    }

    pub fn set_truncated(&mut self, on: bool) {
        self.set(FLAG_TC, on);
    }

    /// RD bit, mirrored from request to reply
    pub fn recursion_desired(self) -> bool {
        self.0 & FLAG_RD != 0
    }

    pub fn set_recursion_desired(&mut self, on: bool) {
        self.set(FLAG_RD, on);
    }

    /// RA bit, always set on replies from this server
    pub fn recursion_available(self) -> bool {
        self.0 & FLAG_RA != 0
    }

    pub fn set_recursion_available(&mut self, on: bool) {
        self.set(FLAG_RA, on);
    }

    pub fn rcode(self) -> Rcode {
        Rcode::from_u8((self.0 & RCODE_MASK) as u8)
    }

    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.0 = (self.0 & !RCODE_MASK) | u16::from(rcode.as_u8() & 0x0F);
    }

    fn set(&mut self, mask: u16, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }
}

impl Message {
    /// Build a recursion-desired query for one question
    pub fn query(id: u16, name: &str, qtype: RecordType) -> Self {
        let mut flags = Flags::default();
        flags.set_recursion_desired(true);
        Self {
            id,
            flags,
            questions: vec![Question {
                name: name.to_ascii_lowercase(),
                qtype,
                qclass: RecordClass::In,
            }],
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// Start a reply: id copied, QR set, opcode and RD mirrored, RA set,
    /// question section echoed, no records yet
    pub fn reply_to(request: &Message) -> Self {
        let mut flags = Flags::default();
        flags.set_response(true);
        flags.set_opcode(request.flags.opcode());
        flags.set_recursion_desired(request.flags.recursion_desired());
        flags.set_recursion_available(true);
        Self {
            id: request.id,
            flags,
            questions: request.questions.clone(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// Parse a message from raw bytes
    ///
    /// Names are decompressed with a bounded pointer-hop budget so that
    /// looping pointers cannot hang the parser. Questions must be class IN;
    /// record classes and unknown record types pass through untouched.
    /// TTLs above `2^31 - 1` are clamped.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::TruncatedInput {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }

        let id = u16::from_be_bytes([data[0], data[1]]);
        let flags = Flags::new(u16::from_be_bytes([data[2], data[3]]));
        let qdcount = u16::from_be_bytes([data[4], data[5]]) as usize;
        let ancount = u16::from_be_bytes([data[6], data[7]]) as usize;
        let nscount = u16::from_be_bytes([data[8], data[9]]) as usize;
        let arcount = u16::from_be_bytes([data[10], data[11]]) as usize;

        let mut pos = HEADER_LEN;

        let mut questions = Vec::with_capacity(qdcount.min(8));
        for _ in 0..qdcount {
            let (name, next) = decode_name(data, pos)?;
            pos = next;
            let qtype = read_u16(data, pos)?;
            let qclass = read_u16(data, pos + 2)?;
            pos += 4;
            let class = RecordClass::from(qclass);
            if class != RecordClass::In {
                return Err(Error::UnsupportedClass(qclass));
            }
            questions.push(Question {
                name,
                qtype: RecordType::from(qtype),
                qclass: class,
            });
        }

        let answers = parse_records(data, &mut pos, ancount)?;
        let authorities = parse_records(data, &mut pos, nscount)?;
        let additionals = parse_records(data, &mut pos, arcount)?;

        Ok(Self {
            id,
            flags,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Encode the message with uncompressed names
    ///
    /// If the encoding would exceed the 512-byte UDP payload limit, the
    /// record sections are dropped and the TC bit is set so the client
    /// knows the reply was cut down.
    pub fn encode(&self) -> Vec<u8> {
        let buf = self.encode_all();
        if buf.len() <= MAX_UDP_PAYLOAD {
            return buf;
        }
        let mut cut = self.clone();
        cut.answers.clear();
        cut.authorities.clear();
        cut.additionals.clear();
        cut.flags.set_truncated(true);
        cut.encode_all()
    }

    fn encode_all(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_UDP_PAYLOAD);

        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&self.flags.bits().to_be_bytes());
        buf.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.authorities.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.additionals.len() as u16).to_be_bytes());

        for q in &self.questions {
            encode_name(&mut buf, &q.name);
            buf.extend_from_slice(&u16::from(q.qtype).to_be_bytes());
            buf.extend_from_slice(&u16::from(q.qclass).to_be_bytes());
        }

        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            encode_record(&mut buf, record);
        }

        buf
    }
}

fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    let bytes = data.get(pos..pos + 2).ok_or(Error::TruncatedInput {
        expected: pos + 2,
        actual: data.len(),
    })?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32> {
    let bytes = data.get(pos..pos + 4).ok_or(Error::TruncatedInput {
        expected: pos + 4,
        actual: data.len(),
    })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a possibly-compressed name starting at `start`
///
/// Returns the name and the offset of the first byte after the name at the
/// top level (after the first pointer, if the name jumps). The hop budget
/// terminates decoding even when pointers form a cycle.
fn decode_name(data: &[u8], start: usize) -> Result<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut name_len = 0usize;
    let mut pos = start;
    let mut resume: Option<usize> = None;
    let mut hops = 0usize;

    loop {
        let b = *data.get(pos).ok_or(Error::TruncatedInput {
            expected: pos + 1,
            actual: data.len(),
        })?;

        if b == 0 {
            pos += 1;
            break;
        }

        if b & 0xC0 == 0xC0 {
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(Error::PointerLoop);
            }
            let lo = *data.get(pos + 1).ok_or(Error::TruncatedInput {
                expected: pos + 2,
                actual: data.len(),
            })?;
            if resume.is_none() {
                resume = Some(pos + 2);
            }
            pos = (usize::from(b & 0x3F) << 8) | usize::from(lo);
            continue;
        }

        // 0x40 and 0x80 length prefixes are reserved
        if b & 0xC0 != 0 {
            return Err(Error::InvalidLabel(pos));
        }

        let len = b as usize;
        let end = pos + 1 + len;
        let raw = data.get(pos + 1..end).ok_or(Error::TruncatedInput {
            expected: end,
            actual: data.len(),
        })?;
        if !raw.is_ascii() {
            return Err(Error::InvalidLabel(pos));
        }
        name_len += len + 1;
        if name_len > MAX_NAME_LEN {
            return Err(Error::InvalidLabel(pos));
        }
        labels.push(String::from_utf8_lossy(raw).to_ascii_lowercase());
        pos = end;
    }

    Ok((labels.join("."), resume.unwrap_or(pos)))
}

fn parse_records(data: &[u8], pos: &mut usize, count: usize) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        let (name, next) = decode_name(data, *pos)?;
        *pos = next;

        let rtype = RecordType::from(read_u16(data, *pos)?);
        let class = RecordClass::from(read_u16(data, *pos + 2)?);
        let ttl = read_u32(data, *pos + 4)?.min(MAX_TTL);
        let rdlen = read_u16(data, *pos + 8)? as usize;
        *pos += 10;

        let rdata = data.get(*pos..*pos + rdlen).ok_or(Error::TruncatedInput {
            expected: *pos + rdlen,
            actual: data.len(),
        })?;
        *pos += rdlen;

        let payload = match (rtype, rdlen) {
            (RecordType::A, 4) => RecordData::A(Ipv4Addr::new(
                rdata[0], rdata[1], rdata[2], rdata[3],
            )),
            (RecordType::Aaaa, 16) => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(rdata);
                RecordData::Aaaa(Ipv6Addr::from(octets))
            }
            _ => RecordData::Raw(rdata.to_vec()),
        };

        records.push(Record {
            name,
            rtype,
            class,
            ttl,
            data: payload,
        });
    }
    Ok(records)
}

fn encode_name(buf: &mut Vec<u8>, name: &str) {
    if !name.is_empty() {
        for label in name.split('.') {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
    }
    buf.push(0);
}

fn encode_record(buf: &mut Vec<u8>, record: &Record) {
    encode_name(buf, &record.name);
    buf.extend_from_slice(&u16::from(record.rtype).to_be_bytes());
    buf.extend_from_slice(&u16::from(record.class).to_be_bytes());
    buf.extend_from_slice(&record.ttl.to_be_bytes());
    match &record.data {
        RecordData::A(addr) => {
            buf.extend_from_slice(&4u16.to_be_bytes());
            buf.extend_from_slice(&addr.octets());
        }
        RecordData::Aaaa(addr) => {
            buf.extend_from_slice(&16u16.to_be_bytes());
            buf.extend_from_slice(&addr.octets());
        }
        RecordData::Raw(bytes) => {
            buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_query_bytes() -> Vec<u8> {
        // A query for example.com, id 0xBEEF, RD set
        let mut bytes = vec![
            0xBE, 0xEF, // id
            0x01, 0x00, // flags: RD
            0x00, 0x01, // qdcount
            0x00, 0x00, // ancount
            0x00, 0x00, // nscount
            0x00, 0x00, // arcount
        ];
        bytes.extend_from_slice(b"\x07example\x03com\x00");
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // A IN
        bytes
    }

    #[test]
    fn test_parse_query() {
        let message = Message::parse(&sample_query_bytes()).unwrap();

        assert_eq!(message.id, 0xBEEF);
        assert!(!message.flags.is_response());
        assert!(message.flags.recursion_desired());
        assert_eq!(message.questions.len(), 1);
        assert_eq!(message.questions[0].name, "example.com");
        assert_eq!(message.questions[0].qtype, RecordType::A);
        assert!(message.answers.is_empty());
    }

    #[test]
    fn test_parse_lowercases_names() {
        let mut bytes = sample_query_bytes();
        // Uppercase the 'e' of "example"
        bytes[13] = b'E';
        let message = Message::parse(&bytes).unwrap();
        assert_eq!(message.questions[0].name, "example.com");
    }

    #[test]
    fn test_parse_too_short() {
        let err = Message::parse(&[0u8; 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedInput {
                expected: 12,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_parse_rejects_non_in_question() {
        let mut bytes = sample_query_bytes();
        let qclass = bytes.len() - 1;
        bytes[qclass] = 3; // CH
        let err = Message::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedClass(3)));
    }

    #[test]
    fn test_parse_compressed_answer_name() {
        // Response where the answer name is a pointer to the question name
        let mut bytes = vec![
            0x12, 0x34, // id
            0x81, 0x80, // flags: QR RD RA
            0x00, 0x01, // qdcount
            0x00, 0x01, // ancount
            0x00, 0x00, 0x00, 0x00,
        ];
        bytes.extend_from_slice(b"\x07example\x03com\x00");
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        bytes.extend_from_slice(&[0xC0, 0x0C]); // pointer to offset 12
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]); // A IN
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x3C]); // ttl 60
        bytes.extend_from_slice(&[0x00, 0x04, 93, 184, 216, 34]);

        let message = Message::parse(&bytes).unwrap();
        assert_eq!(message.answers.len(), 1);
        assert_eq!(message.answers[0].name, "example.com");
        assert_eq!(message.answers[0].ttl, 60);
        assert_eq!(
            message.answers[0].data,
            RecordData::A(Ipv4Addr::new(93, 184, 216, 34))
        );
    }

    #[test]
    fn test_parse_pointer_loop_terminates() {
        let mut bytes = vec![
            0x00, 0x01, 0x00, 0x00, //
            0x00, 0x01, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00,
        ];
        // A name that is a pointer to itself
        bytes.extend_from_slice(&[0xC0, 0x0C]);
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let err = Message::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::PointerLoop));
    }

    #[test]
    fn test_parse_reserved_label_bits() {
        let mut bytes = vec![
            0x00, 0x01, 0x00, 0x00, //
            0x00, 0x01, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00,
        ];
        bytes.extend_from_slice(&[0x40, 0x00]); // reserved prefix
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let err = Message::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidLabel(12)));
    }

    #[test]
    fn test_parse_clamps_ttl() {
        let mut bytes = vec![
            0x00, 0x01, 0x80, 0x00, //
            0x00, 0x00, 0x00, 0x01, //
            0x00, 0x00, 0x00, 0x00,
        ];
        bytes.extend_from_slice(b"\x01a\x00");
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]); // ttl u32::MAX
        bytes.extend_from_slice(&[0x00, 0x04, 1, 2, 3, 4]);

        let message = Message::parse(&bytes).unwrap();
        assert_eq!(message.answers[0].ttl, i32::MAX as u32);
    }

    #[test]
    fn test_round_trip_query() {
        let query = Message::query(0x0102, "cache.test", RecordType::Aaaa);
        let parsed = Message::parse(&query.encode()).unwrap();
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_round_trip_reply_with_answers() {
        let query = Message::query(7, "router.lan", RecordType::A);
        let mut reply = Message::reply_to(&query);
        reply
            .answers
            .push(Record::a("router.lan", Ipv4Addr::new(192, 168, 1, 1), 60));
        reply
            .additionals
            .push(Record::aaaa("router.lan", Ipv6Addr::LOCALHOST, 60));

        let parsed = Message::parse(&reply.encode()).unwrap();
        assert_eq!(parsed, reply);
        assert!(parsed.flags.is_response());
        assert!(parsed.flags.recursion_available());
        assert!(parsed.flags.recursion_desired());
    }

    #[test]
    fn test_round_trip_unknown_rtype() {
        let query = Message::query(9, "mail.test", RecordType::Other(15));
        let mut reply = Message::reply_to(&query);
        reply.answers.push(Record {
            name: "mail.test".into(),
            rtype: RecordType::Other(15),
            class: RecordClass::In,
            ttl: 120,
            data: RecordData::Raw(vec![0x00, 0x0A, 0x04, b'm', b'x', b'1', 0x00]),
        });

        let parsed = Message::parse(&reply.encode()).unwrap();
        assert_eq!(parsed.answers, reply.answers);
    }

    #[test]
    fn test_encode_oversize_sets_tc() {
        let query = Message::query(1, "big.test", RecordType::A);
        let mut reply = Message::reply_to(&query);
        for i in 0..60 {
            reply.answers.push(Record::a(
                "big.test",
                Ipv4Addr::new(10, 0, (i / 256) as u8, (i % 256) as u8),
                60,
            ));
        }

        let bytes = reply.encode();
        assert!(bytes.len() <= MAX_UDP_PAYLOAD);

        let parsed = Message::parse(&bytes).unwrap();
        assert!(parsed.flags.truncated());
        assert!(parsed.answers.is_empty());
        assert_eq!(parsed.questions, reply.questions);
    }

    #[test]
    fn test_reply_mirrors_rd() {
        let mut query = Message::query(5, "a.test", RecordType::A);
        query.flags.set_recursion_desired(false);
        let reply = Message::reply_to(&query);
        assert!(!reply.flags.recursion_desired());
        assert!(reply.flags.recursion_available());
        assert_eq!(reply.id, 5);
    }

    #[test]
    fn test_rcode_round_trip() {
        let mut flags = Flags::default();
        flags.set_rcode(Rcode::NxDomain);
        assert_eq!(flags.rcode(), Rcode::NxDomain);
        flags.set_rcode(Rcode::NoError);
        assert_eq!(flags.rcode(), Rcode::NoError);
    }
}

//! Human-readable logging and JSON snapshot of a decoded DNS response.

use serde::Serialize;
use std::path::Path;

use crate::wire::{Message, ResourceRecord};

/// Fixed relative path the latest response summary is written to. Overwritten on every
/// response; concurrent writes from interleaved forwarding tasks may race, so this is
/// best-effort diagnostic output rather than a stable interface.
pub const SUMMARY_PATH: &str = "dns_summary.json";

fn mnemonic(rtype: u16) -> Option<&'static str> {
    Some(match rtype {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        6 => "SOA",
        12 => "PTR",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        33 => "SRV",
        35 => "NAPTR",
        38 => "A6",
        39 => "DNAME",
        41 => "OPT",
        43 => "DS",
        46 => "RRSIG",
        47 => "NSEC",
        48 => "DNSKEY",
        255 => "ANY",
        _ => return None,
    })
}

#[derive(Debug, Serialize)]
struct QuestionEntry {
    name: String,
    #[serde(rename = "type")]
    rtype: String,
}

#[derive(Debug, Serialize)]
struct RecordEntry {
    name: String,
    #[serde(rename = "type")]
    rtype: String,
    resource_size: usize,
}

/// A decoded response, shaped for both the bracketed log block and the JSON snapshot.
#[derive(Debug, Serialize)]
pub struct Summary {
    question: Vec<QuestionEntry>,
    answer: Vec<RecordEntry>,
    authority: Vec<RecordEntry>,
    additional: Vec<RecordEntry>,
}

impl Summary {
    /// The first question's name, or `"-"` if the message carried no question (the consolidated
    /// success log line always has something to print).
    pub fn first_question_name(&self) -> &str {
        self.question.first().map_or("-", |q| q.name.as_str())
    }

    /// The first question's type mnemonic, or `"-"` if the message carried no question.
    pub fn first_question_type(&self) -> &str {
        self.question.first().map_or("-", |q| q.rtype.as_str())
    }

    /// Number of records in the answer section.
    pub fn answer_count(&self) -> usize {
        self.answer.len()
    }

    /// Number of records in the authority section.
    pub fn authority_count(&self) -> usize {
        self.authority.len()
    }

    /// Number of records in the additional section.
    pub fn additional_count(&self) -> usize {
        self.additional.len()
    }

    /// Builds a summary from a decoded message. Returns `None` if any record's type has no
    /// mnemonic in the fixed type table — logging is skipped in that case, but this never
    /// affects whether the forwarding path itself succeeds.
    pub fn from_message(msg: &Message) -> Option<Summary> {
        Some(Summary {
            question: msg
                .questions
                .iter()
                .map(|q| {
                    Some(QuestionEntry {
                        name: q.name.to_string(),
                        rtype: mnemonic(q.rtype)?.to_owned(),
                    })
                })
                .collect::<Option<Vec<_>>>()?,
            answer: records(&msg.answers)?,
            authority: records(&msg.authority)?,
            additional: records(&msg.additional)?,
        })
    }

    /// Emits the bracketed log block at `info` level and best-effort overwrites the JSON
    /// snapshot file. Failure to write the file is logged but never propagated.
    pub fn emit(&self) {
        log::info!("=START=");
        log_section("Questions", self.question.iter().map(|q| {
            format!("- Name: {}, Type: {}", q.name, q.rtype)
        }));
        log_section("Answer RRs", self.answer.iter().map(record_line));
        log_section("Authority RRs", self.authority.iter().map(record_line));
        log_section("Additional RRs", self.additional.iter().map(record_line));
        log::info!("=END=");

        if let Err(err) = self.write_json(Path::new(SUMMARY_PATH)) {
            log::warn!("failed to write {}: {}", SUMMARY_PATH, err);
        }
    }

    fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, body)
    }
}

fn record_line(rr: &RecordEntry) -> String {
    format!(
        "- Name: {}, Type: {} ({} bytes)",
        rr.name, rr.rtype, rr.resource_size
    )
}

fn records(rrs: &[ResourceRecord]) -> Option<Vec<RecordEntry>> {
    rrs.iter()
        .map(|rr| {
            Some(RecordEntry {
                name: rr.name.to_string(),
                rtype: mnemonic(rr.rtype)?.to_owned(),
                resource_size: rr.rdata.len(),
            })
        })
        .collect()
}

fn log_section(title: &str, lines: impl Iterator<Item = String>) {
    let lines: Vec<String> = lines.collect();
    log::info!("{} ({})", title, lines.len());
    for line in lines {
        log::info!("  {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Message;

    const QUERY: &[u8] = &[
        0xab, 0xcd, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, b'e', b'x',
        b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0x00, 0x01, 0x00, 0x01,
    ];

    #[test]
    fn builds_summary_from_question_only_message() {
        let msg = Message::decode(QUERY).unwrap();
        let summary = Summary::from_message(&msg).unwrap();
        assert_eq!(summary.question.len(), 1);
        assert_eq!(summary.question[0].name, "example.com");
        assert_eq!(summary.question[0].rtype, "A");
        assert!(summary.answer.is_empty());
    }

    #[test]
    fn unknown_record_type_skips_summary() {
        let mut buf = QUERY.to_vec();
        buf[6] = 0x00;
        buf[7] = 0x01; // ancount = 1
        buf.extend_from_slice(&[
            0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, 0xff,
            0xff, // rtype 65535, not in the mnemonic table
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
        let msg = Message::decode(&buf).unwrap();
        assert!(Summary::from_message(&msg).is_none());
    }

    #[test]
    fn json_schema_matches_spec() {
        let msg = Message::decode(QUERY).unwrap();
        let summary = Summary::from_message(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&serde_json::to_string(&summary).unwrap()).unwrap();
        assert_eq!(value["question"][0]["name"], "example.com");
        assert_eq!(value["question"][0]["type"], "A");
        assert!(value["question"][0].get("resource_size").is_none());
        assert!(value["answer"].as_array().unwrap().is_empty());
    }
}

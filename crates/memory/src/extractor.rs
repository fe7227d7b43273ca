//! Rule-based fact extraction.
//!
//! A handful of regexes over the raw user message. Deliberately simple:
//! extraction quality is plumbing, reconciliation is the contract. Values
//! are whitespace-collapsed, stripped of trailing punctuation, and
//! length-gated before they become candidates.

use packrat_core::memory::{MemoryCandidate, MemoryExtractor};
use packrat_core::message::Message;
use regex::Regex;

/// Extracts name / likes / dislikes / project / goal candidates.
pub struct RuleBasedExtractor {
    re_name: Regex,
    re_dislike: Regex,
    re_like: Regex,
    re_project: Regex,
    re_goal: Regex,
}

fn clean(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(['.', '!', '?', ',', ';', ':'])
        .to_string()
}

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self {
            re_name: Regex::new(r"(?i)\bmy\s+name\s+is\s+([A-Za-z][A-Za-z \-]{1,40})")
                .expect("static regex"),
            re_dislike: Regex::new(r"(?i)\bi\s+(?:don'?t|do\s+not)\s+like\s+([^.!?\n]{1,80})")
                .expect("static regex"),
            re_like: Regex::new(r"(?i)\bi\s+like\s+([^.!?\n]{1,80})").expect("static regex"),
            re_project: Regex::new(r"(?i)\bi(?:'m|\s+am)\s+working\s+on\s+([^.!?\n]{1,120})")
                .expect("static regex"),
            re_goal: Regex::new(r"(?i)\bi\s+want\s+to\s+([^.!?\n]{1,120})").expect("static regex"),
        }
    }
}

impl Default for RuleBasedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExtractor for RuleBasedExtractor {
    fn extract(&self, message: &Message) -> Vec<MemoryCandidate> {
        let text = message.content.as_str();
        let mut out = Vec::new();

        if let Some(caps) = self.re_name.captures(text) {
            let name = clean(&caps[1]);
            if (2..=40).contains(&name.len()) {
                out.push(MemoryCandidate {
                    key: "name".into(),
                    value: name,
                    confidence: 0.9,
                });
            }
        }

        for (rx, prefix, confidence) in [
            (&self.re_dislike, "dislikes:", 0.8),
            (&self.re_like, "likes:", 0.7),
        ] {
            if let Some(caps) = rx.captures(text) {
                let topic = clean(&caps[1]);
                if (2..=80).contains(&topic.len()) {
                    out.push(MemoryCandidate {
                        key: format!("{prefix}{}", topic.to_lowercase()),
                        value: topic,
                        confidence,
                    });
                }
            }
        }

        if let Some(caps) = self.re_project.captures(text) {
            let project = clean(&caps[1]);
            if (2..=120).contains(&project.len()) {
                out.push(MemoryCandidate {
                    key: "project.current".into(),
                    value: project,
                    confidence: 0.65,
                });
            }
        }

        if let Some(caps) = self.re_goal.captures(text) {
            let goal = clean(&caps[1]);
            if (2..=120).contains(&goal.len()) {
                out.push(MemoryCandidate {
                    key: "goal.current".into(),
                    value: goal,
                    confidence: 0.6,
                });
            }
        }

        out
    }
}

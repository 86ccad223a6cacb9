use std::collections::BTreeMap;

use iscp_frame::Message;

use crate::error::{Result, SessionError};

/// Phrases understood out of the box, with their wire codes.
const BUILTIN: &[(&str, &str)] = &[
    // Power
    ("power on", "PWR01"),
    ("power off", "PWR00"),
    ("power standby", "PWR00"),
    ("power", "PWRQSTN"),
    // Master volume
    ("volume up", "MVLUP"),
    ("volume down", "MVLDOWN"),
    ("volume up1", "MVLUP1"),
    ("volume down1", "MVLDOWN1"),
    ("volume", "MVLQSTN"),
    // Muting
    ("mute on", "AMT01"),
    ("mute off", "AMT00"),
    ("mute", "AMTTG"),
    ("mute toggle", "AMTTG"),
    ("mute status", "AMTQSTN"),
    // Input selector
    ("input vcr", "SLI00"),
    ("input dvr", "SLI00"),
    ("input cbl", "SLI01"),
    ("input sat", "SLI01"),
    ("input game", "SLI02"),
    ("input aux", "SLI03"),
    ("input pc", "SLI05"),
    ("input dvd", "SLI10"),
    ("input bd", "SLI10"),
    ("input tape", "SLI20"),
    ("input phono", "SLI22"),
    ("input cd", "SLI23"),
    ("input fm", "SLI24"),
    ("input am", "SLI25"),
    ("input tuner", "SLI26"),
    ("input music server", "SLI27"),
    ("input internet radio", "SLI28"),
    ("input usb", "SLI29"),
    ("input net", "SLI2B"),
    ("input up", "SLIUP"),
    ("input down", "SLIDOWN"),
    ("input", "SLIQSTN"),
    // Listening mode
    ("mode stereo", "LMD00"),
    ("mode direct", "LMD01"),
    ("mode surround", "LMD02"),
    ("mode all channel stereo", "LMD0C"),
    ("mode pure audio", "LMD11"),
    ("mode up", "LMDUP"),
    ("mode down", "LMDDOWN"),
    ("mode", "LMDQSTN"),
    // Tuner
    ("tuner up", "TUNUP"),
    ("tuner down", "TUNDOWN"),
    ("tuner", "TUNQSTN"),
    ("preset up", "PRSUP"),
    ("preset down", "PRSDOWN"),
    ("preset", "PRSQSTN"),
    // Network playback
    ("play", "NTCPLAY"),
    ("pause", "NTCPAUSE"),
    ("stop", "NTCSTOP"),
    ("next", "NTCTRUP"),
    ("previous", "NTCTRDN"),
    // Display and timers
    ("dimmer", "DIMDIM"),
    ("dimmer status", "DIMQSTN"),
    ("sleep off", "SLPOFF"),
    ("sleep", "SLPQSTN"),
    // Zone 2
    ("zone2 power on", "ZPW01"),
    ("zone2 power off", "ZPW00"),
    ("zone2 volume up", "ZVLUP"),
    ("zone2 volume down", "ZVLDOWN"),
    // Status
    ("audio information", "IFAQSTN"),
    ("video information", "IFVQSTN"),
];

/// Immutable mapping from human phrases to wire codes.
///
/// Phrases are matched after trimming, lowercasing, and collapsing inner
/// whitespace, so `"  Volume   UP "` finds `volume up`.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: BTreeMap<String, String>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(phrase, code)| (phrase.to_string(), code.to_string()))
                .collect(),
        }
    }
}

impl CommandTable {
    /// A table with no phrases; only wire codes and volume percentages resolve.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace phrases. Every code must look like a wire code.
    pub fn with_entries<I, P, C>(mut self, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        for (phrase, code) in entries {
            let phrase = canonicalize(phrase.as_ref());
            let code = code.into();
            if phrase.is_empty() {
                return Err(SessionError::InvalidCommandTable(
                    "empty phrase".to_string(),
                ));
            }
            if !is_wire_code(&code) {
                return Err(SessionError::InvalidCommandTable(format!(
                    "'{phrase}' maps to '{code}', which is not a wire code"
                )));
            }
            self.entries.insert(phrase, code);
        }
        Ok(self)
    }

    /// Extend this table from a JSON object of `"phrase": "CODE"` pairs.
    pub fn with_json(self, json: &str) -> Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_str(json)?;
        self.with_entries(entries)
    }

    /// Turn a phrase, a volume percentage (`N%`), or a wire code into a message.
    pub fn resolve(&self, input: &str) -> Result<Message> {
        let phrase = canonicalize(input);

        if let Some(code) = self.entries.get(&phrase) {
            return wire_message(code, input);
        }
        if let Some(level) = parse_percentage(&phrase) {
            return Ok(Message::new("MVL", format!("{level:02X}")));
        }

        let trimmed = input.trim();
        if is_wire_code(trimmed) {
            return wire_message(trimmed, input);
        }

        Err(SessionError::UnknownCommand(input.to_string()))
    }

    /// The wire code mapped to a phrase, if any.
    pub fn get(&self, phrase: &str) -> Option<&str> {
        self.entries.get(&canonicalize(phrase)).map(String::as_str)
    }

    /// All phrases and codes, in phrase order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(phrase, code)| (phrase.as_str(), code.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn wire_message(code: &str, input: &str) -> Result<Message> {
    Message::parse_wire(code).ok_or_else(|| SessionError::UnknownCommand(input.to_string()))
}

fn canonicalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Three uppercase letters followed by printable, non-space ASCII.
fn is_wire_code(code: &str) -> bool {
    code.len() >= 3
        && code.bytes().take(3).all(|b| b.is_ascii_uppercase())
        && code.bytes().all(|b| b.is_ascii_graphic())
}

fn parse_percentage(phrase: &str) -> Option<u8> {
    let digits = phrase.strip_suffix('%')?;
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok().filter(|level| *level <= 100)
}

use std::fmt;

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::transmitter::RequestToken;

pub type Result<T> = std::result::Result<T, TalkwireError>;

#[derive(Debug, Clone, PartialEq)]
pub enum TalkwireError {
    /// Text was empty after trimming.
    EmptyInput,
    /// A character falls outside the 8-bit range the tone tables assume.
    UnsupportedCodePoint { ch: char, index: usize },
    /// The output device could not be created or resumed.
    DeviceUnavailable(String),
    /// A transmission was requested while another one is still playing.
    ConcurrentTransmission { active: RequestToken },
    InvalidConfig(String),
    /// Rendered audio could not be written out.
    AudioWrite(String),
}

impl fmt::Display for TalkwireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TalkwireError::EmptyInput => write!(f, "Nothing to transmit: input is empty"),
            TalkwireError::UnsupportedCodePoint { ch, index } => write!(
                f,
                "Unsupported character {ch:?} (U+{:04X}) at position {index}",
                *ch as u32
            ),
            TalkwireError::DeviceUnavailable(reason) => {
                write!(f, "Audio output unavailable: {reason}")
            }
            TalkwireError::ConcurrentTransmission { active } => {
                write!(f, "Transmission {active} is still playing")
            }
            TalkwireError::InvalidConfig(reason) => write!(f, "Invalid config: {reason}"),
            TalkwireError::AudioWrite(reason) => write!(f, "Failed to write audio: {reason}"),
        }
    }
}

impl std::error::Error for TalkwireError {}

impl From<hound::Error> for TalkwireError {
    fn from(e: hound::Error) -> Self {
        TalkwireError::AudioWrite(e.to_string())
    }
}

/// Render an error against the text it was raised for.
///
/// Character-level errors get an annotated snippet pointing at the
/// offending character; everything else falls back to `Display`.
pub fn render_report(text: &str, err: &TalkwireError) -> String {
    let TalkwireError::UnsupportedCodePoint { ch, index } = err else {
        return err.to_string();
    };
    if *index >= text.chars().count() {
        return err.to_string();
    }

    let span = *index..*index + 1;
    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, span.clone())
        .with_config(Config::default().with_color(false))
        .with_message(err.to_string())
        .with_label(
            Label::new(span)
                .with_message(format!("U+{:04X} does not fit in 8 bits", *ch as u32)),
        )
        .with_note("use CodePointPolicy::Wrap to fold code points into 0..=255")
        .finish()
        .write(Source::from(text), &mut out);

    match written {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| err.to_string()),
        Err(_) => err.to_string(),
    }
}

use crate::config::CommandSet;

// ---------------------------------------------------------------------------
// Command – what a controller line asks for
// ---------------------------------------------------------------------------

/// A classified controller line. Borrowed parts point into the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// JSON telemetry; relayed verbatim to the telemetry topic.
    Telemetry(&'a str),
    /// Take a sensor capture and send it back.
    Capture,
    /// Report the current interval.
    IntervalQuery,
    /// Run the model on the comma-separated values following the marker.
    Inference(&'a str),
    /// Blank line.
    Empty,
    /// Anything else; relayed to the log topic.
    Log(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Telemetry,
    Capture,
    IntervalQuery,
    Inference,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Contains(String),
    Equals(String),
    Blank,
}

impl Pattern {
    fn matches(&self, line: &str) -> bool {
        match self {
            Pattern::Contains(needle) => !needle.is_empty() && line.contains(needle.as_str()),
            Pattern::Equals(exact) => line == exact,
            Pattern::Blank => line.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier – ordered rule table
// ---------------------------------------------------------------------------

/// Ordered matchers; the first that fits decides, [`Command::Log`] otherwise.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(Pattern, Kind)>,
    inference_marker: String,
}

impl Classifier {
    pub fn new(commands: &CommandSet) -> Self {
        let rules = vec![
            (Pattern::Contains(commands.telemetry_marker.clone()), Kind::Telemetry),
            (Pattern::Equals(commands.capture.clone()), Kind::Capture),
            (Pattern::Equals(commands.interval.clone()), Kind::IntervalQuery),
            (Pattern::Contains(commands.inference_marker.clone()), Kind::Inference),
            (Pattern::Blank, Kind::Empty),
        ];
        Self {
            rules,
            inference_marker: commands.inference_marker.clone(),
        }
    }

    /// Classify a sanitized, trimmed line.
    pub fn classify<'a>(&self, line: &'a str) -> Command<'a> {
        let kind = self
            .rules
            .iter()
            .find(|(pattern, _)| pattern.matches(line))
            .map(|(_, kind)| *kind);

        match kind {
            Some(Kind::Telemetry) => Command::Telemetry(line),
            Some(Kind::Capture) => Command::Capture,
            Some(Kind::IntervalQuery) => Command::IntervalQuery,
            Some(Kind::Inference) => {
                let payload = line
                    .split_once(self.inference_marker.as_str())
                    .map(|(_, rest)| rest)
                    .unwrap_or("");
                Command::Inference(payload)
            }
            Some(Kind::Empty) => Command::Empty,
            None => Command::Log(line),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&CommandSet::default())
    }
}

/// Parse the comma-separated integer list of an inference request.
pub fn parse_feature_list(payload: &str) -> Result<Vec<i64>, String> {
    if payload.trim().is_empty() {
        return Err("no values after inference marker".to_string());
    }
    payload
        .split(',')
        .enumerate()
        .map(|(i, tok)| {
            tok.trim()
                .parse::<i64>()
                .map_err(|_| format!("value {i} ('{}') is not an integer", tok.trim()))
        })
        .collect()
}

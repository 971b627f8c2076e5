use crate::config;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Latest Fear & Greed index snapshot. No history is retained; each fetch
/// overwrites the previous reading.
#[derive(Clone, Debug, PartialEq)]
pub struct SentimentReading {
    /// Index value on the 0-100 scale.
    pub value: u8,
    /// Classification label as reported by the provider (e.g. "Fear").
    pub label: String,
}

/// Display bucket derived from the index value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mood {
    ExtremeFear,
    Neutral,
    ExtremeGreed,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExtremeFear => "Extreme Fear",
            Self::Neutral => "Neutral",
            Self::ExtremeGreed => "Extreme Greed",
        }
    }
}

pub fn bucket(value: u8) -> Mood {
    if value < 25 {
        Mood::ExtremeFear
    } else if value > 75 {
        Mood::ExtremeGreed
    } else {
        Mood::Neutral
    }
}

impl SentimentReading {
    pub fn mood(&self) -> Mood {
        bucket(self.value)
    }
}

/// Failure kinds are kept separate so a network outage can be told apart
/// from a provider sending an unexpected body. No default reading is ever
/// substituted on failure.
#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("sentiment request failed: {0}")]
    Network(String),
    #[error("sentiment provider returned HTTP {0}")]
    Status(u16),
    #[error("sentiment response was malformed: {0}")]
    Malformed(String),
    #[error("sentiment response carried no readings")]
    Empty,
}

#[derive(Deserialize, Debug)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Deserialize, Debug)]
struct FngEntry {
    value: NumberOrText,
    value_classification: String,
}

/// The provider has shipped `value` both as a bare integer and as a quoted
/// string; accept either.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

impl NumberOrText {
    fn as_index(&self) -> Result<u8, SentimentError> {
        let raw = match self {
            NumberOrText::Number(n) => *n,
            NumberOrText::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| SentimentError::Malformed(format!("non-numeric value {:?}", s)))?,
        };
        if (0..=100).contains(&raw) {
            Ok(raw as u8)
        } else {
            Err(SentimentError::Malformed(format!(
                "value {} outside the 0-100 scale",
                raw
            )))
        }
    }
}

/// Fetches the latest single Fear & Greed reading.
pub async fn fetch_latest() -> Result<SentimentReading, SentimentError> {
    let url = format!("{}?limit=1", config::fng_api_url());
    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .timeout(std::time::Duration::from_secs(config::SENTIMENT_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| SentimentError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SentimentError::Status(status.as_u16()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| SentimentError::Network(e.to_string()))?;

    let reading = parse_reading(&body)?;
    info!(
        "Fear & Greed index at {} ({}), bucketed as {}",
        reading.value,
        reading.label,
        reading.mood().as_str()
    );
    Ok(reading)
}

pub fn parse_reading(body: &str) -> Result<SentimentReading, SentimentError> {
    let response: FngResponse =
        serde_json::from_str(body).map_err(|e| SentimentError::Malformed(e.to_string()))?;
    let entry = response.data.first().ok_or(SentimentError::Empty)?;
    Ok(SentimentReading {
        value: entry.value.as_index()?,
        label: entry.value_classification.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucketing() {
        assert_eq!(bucket(10), Mood::ExtremeFear);
        assert_eq!(bucket(50), Mood::Neutral);
        assert_eq!(bucket(90), Mood::ExtremeGreed);
        // Boundary values stay Neutral.
        assert_eq!(bucket(25), Mood::Neutral);
        assert_eq!(bucket(75), Mood::Neutral);
        assert_eq!(bucket(24), Mood::ExtremeFear);
        assert_eq!(bucket(76), Mood::ExtremeGreed);
    }

    #[test]
    fn test_parse_string_value() {
        let body = r#"{"name":"Fear and Greed Index","data":[{"value":"39","value_classification":"Fear","timestamp":"1754438400"}]}"#;
        let reading = parse_reading(body).unwrap();
        assert_eq!(reading.value, 39);
        assert_eq!(reading.label, "Fear");
        assert_eq!(reading.mood(), Mood::Neutral);
    }

    #[test]
    fn test_parse_integer_value() {
        let body = r#"{"data":[{"value":82,"value_classification":"Extreme Greed"}]}"#;
        let reading = parse_reading(body).unwrap();
        assert_eq!(reading.value, 82);
        assert_eq!(reading.mood(), Mood::ExtremeGreed);
    }

    #[test]
    fn test_parse_empty_data() {
        assert!(matches!(
            parse_reading(r#"{"data":[]}"#),
            Err(SentimentError::Empty)
        ));
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(
            parse_reading("<html>rate limited</html>"),
            Err(SentimentError::Malformed(_))
        ));
        assert!(matches!(
            parse_reading(r#"{"data":[{"value":"n/a","value_classification":"Fear"}]}"#),
            Err(SentimentError::Malformed(_))
        ));
        assert!(matches!(
            parse_reading(r#"{"data":[{"value":180,"value_classification":"Greed"}]}"#),
            Err(SentimentError::Malformed(_))
        ));
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Raw candle as delivered by the bar-history provider.
///
/// Prices arrive as decimal strings; "NaN" and "inf" parse successfully and
/// are left for the bar-close guard to reject.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Candle {
    /// Candle open time (epoch ms)
    #[serde(rename = "t")]
    #[schema(rename = "t")]
    pub open_time: u64,
    /// Candle close time (epoch ms, inclusive)
    #[serde(rename = "T")]
    #[schema(rename = "T")]
    pub close_time: u64,
    /// Open price
    #[serde(rename = "o", deserialize_with = "deserialize_string_to_f64")]
    #[schema(rename = "o", value_type = String)]
    pub open: f64,
    /// High price
    #[serde(rename = "h", deserialize_with = "deserialize_string_to_f64")]
    #[schema(rename = "h", value_type = String)]
    pub high: f64,
    /// Low price
    #[serde(rename = "l", deserialize_with = "deserialize_string_to_f64")]
    #[schema(rename = "l", value_type = String)]
    pub low: f64,
    /// Close price
    #[serde(rename = "c", deserialize_with = "deserialize_string_to_f64")]
    #[schema(rename = "c", value_type = String)]
    pub close: f64,
    /// Candle interval (optional if upstream omits it)
    #[serde(rename = "i", default)]
    #[schema(rename = "i")]
    pub interval: Option<String>,
}

fn deserialize_string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_prices() {
        let json = r#"{"t":0,"T":59999,"o":"100.5","h":"101","l":"99.25","c":"100","i":"1m"}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.high, 101.0);
        assert_eq!(candle.low, 99.25);
        assert_eq!(candle.interval.as_deref(), Some("1m"));
    }

    #[test]
    fn non_finite_prices_survive_parsing() {
        let json = r#"{"t":0,"T":59999,"o":"NaN","h":"101","l":"99","c":"100"}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert!(candle.open.is_nan());
        assert!(candle.interval.is_none());
    }

    #[test]
    fn rejects_missing_price() {
        let json = r#"{"t":0,"T":59999,"o":"100","h":"101","c":"100"}"#;
        assert!(serde_json::from_str::<Candle>(json).is_err());
    }
}

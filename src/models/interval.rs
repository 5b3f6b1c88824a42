use validator::ValidationError;

pub const SUPPORTED_INTERVALS: [&str; 14] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "8h", "12h", "1d", "3d", "1w", "1M",
];

pub fn interval_ms(interval: &str) -> Option<u64> {
    match interval {
        "1m" => Some(60_000),
        "3m" => Some(180_000),
        "5m" => Some(300_000),
        "15m" => Some(900_000),
        "30m" => Some(1_800_000),
        "1h" => Some(3_600_000),
        "2h" => Some(7_200_000),
        "4h" => Some(14_400_000),
        "8h" => Some(28_800_000),
        "12h" => Some(43_200_000),
        "1d" => Some(86_400_000),
        "3d" => Some(259_200_000),
        "1w" => Some(604_800_000),
        "1M" => Some(2_592_000_000),
        _ => None,
    }
}

/// Check a labelled interval against the span `open_time..=close_time`.
pub fn check_interval_span(
    interval: &str,
    open_time: u64,
    close_time: u64,
) -> Result<(), ValidationError> {
    let Some(expected) = interval_ms(interval) else {
        let mut error = ValidationError::new("unsupported_interval");
        error.message = Some(
            format!(
                "interval must be one of: {}",
                SUPPORTED_INTERVALS.join(", ")
            )
            .into(),
        );
        return Err(error);
    };

    // Monthly candles vary in length
    if interval == "1M" || close_time < open_time {
        return Ok(());
    }

    let span = close_time - open_time + 1;
    if span == expected {
        return Ok(());
    }
    let mut error = ValidationError::new("interval_mismatch");
    error.message = Some(format!("{interval} candle spans {span}ms, expected {expected}ms").into());
    Err(error)
}

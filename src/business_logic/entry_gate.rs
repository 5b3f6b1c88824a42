use crate::business_logic::config::EntryConfig;
use crate::business_logic::targets;
use crate::models::bar::Bar;
use crate::models::decision::{EntryDecision, EntryFailure};
use crate::models::direction::Direction;
use crate::models::pattern::Pattern;

type StageResult = Result<(), (EntryFailure, String)>;

/// Ordered, short-circuiting entry checks. Holds only configuration; every
/// evaluation is a pure function of its arguments.
#[derive(Debug, Clone)]
pub struct EntryGate {
    config: EntryConfig,
    multipliers: [f64; 3],
}

impl EntryGate {
    pub fn new(config: EntryConfig, multipliers: [f64; 3]) -> Self {
        Self {
            config,
            multipliers,
        }
    }

    /// Decide whether `bar` opens a position on `pattern`.
    pub fn evaluate(
        &self,
        bar: &Bar,
        pattern: Option<&Pattern>,
        last_trade_close_ms: Option<u64>,
    ) -> EntryDecision {
        match self.run_stages(bar, pattern, last_trade_close_ms) {
            Ok(pattern) => self.build_levels(bar, pattern),
            Err((code, detail)) => {
                tracing::debug!("Entry rejected: {} ({})", code, detail);
                EntryDecision::reject(code, detail)
            }
        }
    }

    fn run_stages<'a>(
        &self,
        bar: &Bar,
        pattern: Option<&'a Pattern>,
        last_trade_close_ms: Option<u64>,
    ) -> Result<&'a Pattern, (EntryFailure, String)> {
        let pattern = self.check_pattern(pattern)?;
        check_breakout(bar, pattern)?;
        check_trend(bar, pattern.direction)?;
        self.check_momentum(bar)?;
        self.check_cooldown(bar, last_trade_close_ms)?;
        Ok(pattern)
    }

    fn check_pattern<'a>(
        &self,
        pattern: Option<&'a Pattern>,
    ) -> Result<&'a Pattern, (EntryFailure, String)> {
        let pattern =
            pattern.ok_or_else(|| (EntryFailure::InvalidPattern, "no pattern".to_string()))?;
        if !pattern.is_valid {
            return Err((
                EntryFailure::InvalidPattern,
                "pattern flagged invalid".to_string(),
            ));
        }
        if pattern.quality < self.config.min_quality {
            return Err((
                EntryFailure::InvalidPattern,
                format!(
                    "quality={} below min_quality={}",
                    pattern.quality, self.config.min_quality
                ),
            ));
        }
        Ok(pattern)
    }

    fn check_momentum(&self, bar: &Bar) -> StageResult {
        if !self.config.momentum_filter_enabled {
            return Ok(());
        }
        let required = self.config.momentum_atr_multiple * bar.atr;
        // NaN ranges or ATR fail the comparison and reject
        if bar.range() >= required {
            return Ok(());
        }
        Err((
            EntryFailure::InsufficientMomentum,
            format!(
                "range={} below {}x atr={} ({})",
                bar.range(),
                self.config.momentum_atr_multiple,
                bar.atr,
                required
            ),
        ))
    }

    fn check_cooldown(&self, bar: &Bar, last_trade_close_ms: Option<u64>) -> StageResult {
        let Some(last_close) = last_trade_close_ms else {
            return Ok(());
        };
        let elapsed = bar.close_time.saturating_sub(last_close);
        if elapsed >= self.config.cooldown_ms {
            return Ok(());
        }
        Err((
            EntryFailure::CooldownActive,
            format!(
                "{}ms since last trade close (min: {}ms)",
                elapsed, self.config.cooldown_ms
            ),
        ))
    }

    fn build_levels(&self, bar: &Bar, pattern: &Pattern) -> EntryDecision {
        let direction = pattern.direction;
        let buffer = self.config.stop_buffer_atr * bar.atr;
        let stop = direction.offset(pattern.protective_swing(), -buffer);

        match targets::compute(bar.close, stop, direction, &self.multipliers) {
            Some(levels) => EntryDecision::admit(levels),
            None => EntryDecision::reject(
                EntryFailure::InvalidLevels,
                format!(
                    "entry={}, stop={}, multipliers={:?}",
                    bar.close, stop, self.multipliers
                ),
            ),
        }
    }
}

fn check_breakout(bar: &Bar, pattern: &Pattern) -> StageResult {
    if pattern.direction.is_beyond(bar.close, pattern.neckline) {
        return Ok(());
    }
    Err((
        EntryFailure::NoBreakout,
        format!(
            "close={} not beyond neckline={} ({})",
            bar.close, pattern.neckline, pattern.direction
        ),
    ))
}

fn check_trend(bar: &Bar, direction: Direction) -> StageResult {
    if direction.is_beyond(bar.close, bar.slow_ma) {
        return Ok(());
    }
    Err((
        EntryFailure::TrendMisaligned,
        format!(
            "close={} not beyond slow_ma={} ({})",
            bar.close, bar.slow_ma, direction
        ),
    ))
}

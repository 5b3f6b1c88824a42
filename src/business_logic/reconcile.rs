use crate::models::audit::{AuditCategory, AuditEntry};
use crate::models::position::{ClosedTrade, ExitReason};

pub const EXIT_CORRECTION_CODE: &str = "FINAL_TARGET_NOT_REACHED";

/// Apply the reported fill to an engine-estimated closed trade.
///
/// A `FINAL_TARGET` exit whose fill sits short of the final target is
/// relabelled as a protective exit. Non-finite fills keep the engine's
/// estimate.
pub fn reconcile(
    mut trade: ClosedTrade,
    reported_price: f64,
    closed_at_ms: u64,
) -> (ClosedTrade, Option<AuditEntry>) {
    if !reported_price.is_finite() {
        tracing::warn!(
            "[{}] ignoring non-finite execution price {}, keeping estimate {}",
            trade.symbol,
            reported_price,
            trade.exit_price
        );
        return (trade, None);
    }

    trade.exit_price = reported_price;
    trade.closed_at_ms = closed_at_ms;
    trade.recompute_r_multiple();

    if trade.exit_reason != ExitReason::FinalTarget || trade.exit_reaches_final_target() {
        return (trade, None);
    }

    let detail = format!(
        "{} exit at {} short of final target {}; relabelled {}",
        trade.direction,
        reported_price,
        trade.targets[2],
        ExitReason::ProtectiveExit
    );
    tracing::warn!("[{}] exit correction: {}", trade.symbol, detail);

    trade.exit_reason = ExitReason::ProtectiveExit;
    let audit = AuditEntry::new(
        closed_at_ms,
        &trade.symbol,
        AuditCategory::ExitCorrection,
        EXIT_CORRECTION_CODE,
        detail,
    );
    (trade, Some(audit))
}

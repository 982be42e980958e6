use findora_core::Match;

/// Receives every committed high-confidence match
pub trait MatchNotifier: Send + Sync {
    fn notify(&self, record: &Match);
}

/// Logs high-confidence matches through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl MatchNotifier for LogNotifier {
    fn notify(&self, record: &Match) {
        tracing::info!(
            lost_item_id = %record.lost_item_id,
            found_item_id = %record.found_item_id,
            confidence = record.confidence,
            "high-confidence match"
        );
    }
}

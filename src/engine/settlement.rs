// 8.5 engine/settlement.rs: settlement entry points. the pass itself lives in
// the processor; the engine records the audit event.

use super::core::Engine;
use super::results::EngineError;
use crate::events::{EventPayload, SettlementCompletedEvent};
use crate::settlement::SettlementReport;
use crate::types::EventId;
use tracing::error;

impl Engine {
    pub async fn settle_event(&self, event_id: &EventId) -> Result<SettlementReport, EngineError> {
        let report = self.settlement.settle_event(event_id).await?;
        self.record_settlement(event_id, &report);
        Ok(report)
    }

    /// Runs passes for several events concurrently; one failure does not stop the others.
    pub async fn settle_events(&self, event_ids: &[EventId]) -> Vec<(EventId, Result<SettlementReport, EngineError>)> {
        let results = self.settlement.settle_events(event_ids).await;

        results
            .into_iter()
            .map(|(event_id, result)| {
                let result = match result {
                    Ok(report) => {
                        self.record_settlement(&event_id, &report);
                        Ok(report)
                    }
                    Err(e) => {
                        error!(event = %event_id, error = %e, "settlement pass failed");
                        Err(EngineError::from(e))
                    }
                };
                (event_id, result)
            })
            .collect()
    }

    pub fn is_settling(&self, event_id: &EventId) -> bool {
        self.settlement.is_in_flight(event_id)
    }

    fn record_settlement(&self, event_id: &EventId, report: &SettlementReport) {
        if report.settled == 0 {
            return;
        }
        self.emit_event(EventPayload::SettlementCompleted(SettlementCompletedEvent {
            event_id: event_id.clone(),
            settled: report.settled,
            unresolved: report.unresolved,
            total_delta: report.total_delta(),
        }));
    }
}

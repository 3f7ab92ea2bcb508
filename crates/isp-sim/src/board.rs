//! Shared property board.
//!
//! Pipelines publish their per-request 3A decisions here; peers wait on
//! it to satisfy cross-pipeline dependencies.

use isp_iq::{AecUpdate, AwbUpdate};
use multi_stats::{PipelineId, RequestId, StatsProperty};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::timeout;
use tracing::debug;

/// Latest published value of one property
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Publication {
    pub request_id: RequestId,
    pub aec: AecUpdate,
    pub awb: AwbUpdate,
}

#[derive(Debug, Default)]
pub struct PropertyBoard {
    entries: RwLock<HashMap<(PipelineId, StatsProperty), Publication>>,
    notify: Notify,
}

impl PropertyBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `publication` and wake all waiters.
    ///
    /// Publications never move backwards; an older request is ignored.
    pub async fn publish(&self, pipeline: PipelineId, property: StatsProperty, publication: Publication) {
        {
            let mut entries = self.entries.write().await;
            let slot = entries.entry((pipeline, property)).or_insert(publication);
            if publication.request_id >= slot.request_id {
                *slot = publication;
            }
        }
        debug!(
            "Pipeline {} published {:?} for request {}",
            pipeline, property, publication.request_id
        );
        self.notify.notify_waiters();
    }

    pub async fn latest(&self, pipeline: PipelineId, property: StatsProperty) -> Option<Publication> {
        self.entries.read().await.get(&(pipeline, property)).copied()
    }

    /// Wait until `pipeline` has published `property` for `request_id` or
    /// later. Returns `None` when `within` elapses first.
    pub async fn wait_for(
        &self,
        pipeline: PipelineId,
        property: StatsProperty,
        request_id: RequestId,
        within: Duration,
    ) -> Option<Publication> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                // Register before checking so a publish in between is not missed.
                notified.as_mut().enable();
                if let Some(publication) = self.latest(pipeline, property).await {
                    if publication.request_id >= request_id {
                        return publication;
                    }
                }
                notified.await;
            }
        };
        timeout(within, wait).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn publication(request_id: RequestId) -> Publication {
        Publication {
            request_id,
            aec: AecUpdate::default(),
            awb: AwbUpdate::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_publication() {
        let board = PropertyBoard::new();
        let start = tokio::time::Instant::now();
        let result = board
            .wait_for(0, StatsProperty::AecFrameControl, 3, Duration::from_millis(50))
            .await;
        assert!(result.is_none());
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_matching_publish() {
        let board = Arc::new(PropertyBoard::new());
        let publisher = board.clone();
        tokio::spawn(async move {
            publisher.publish(0, StatsProperty::AecFrameControl, publication(2)).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(0, StatsProperty::AecFrameControl, publication(3)).await;
        });

        let result = board
            .wait_for(0, StatsProperty::AecFrameControl, 3, Duration::from_millis(50))
            .await;
        assert_eq!(result.map(|p| p.request_id), Some(3));
    }

    #[tokio::test]
    async fn test_older_publication_ignored() {
        let board = PropertyBoard::new();
        board.publish(1, StatsProperty::AwbFrameControl, publication(5)).await;
        board.publish(1, StatsProperty::AwbFrameControl, publication(4)).await;
        let latest = board.latest(1, StatsProperty::AwbFrameControl).await.unwrap();
        assert_eq!(latest.request_id, 5);
        assert!(board.latest(1, StatsProperty::AecFrameControl).await.is_none());
    }
}

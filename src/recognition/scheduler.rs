// SPDX-License-Identifier: GPL-3.0-only

//! Periodic driver for [`RecognitionPipeline::tick`]
//!
//! Ticks at the pipeline's interval while requests are pending and suspends
//! itself once the queue drains, resuming on the next enqueue. Each tick runs
//! on the blocking pool and is awaited before the next one, so decodes never
//! overlap.

use super::pipeline::RecognitionPipeline;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

#[derive(Debug)]
pub struct Scheduler {
    pipeline: Arc<RecognitionPipeline>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Start ticking on the current tokio runtime
    pub fn spawn(pipeline: Arc<RecognitionPipeline>) -> Self {
        let handle = tokio::spawn(run(Arc::clone(&pipeline)));
        Self { pipeline, handle }
    }

    pub fn pipeline(&self) -> &Arc<RecognitionPipeline> {
        &self.pipeline
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop ticking and discard pending and in-flight work
    ///
    /// No event is emitted for any request after this returns.
    pub async fn shutdown(self) {
        self.pipeline.shutdown();
        self.handle.abort();
        if let Err(e) = self.handle.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "Recognition scheduler ended abnormally");
        }
        debug!("Recognition scheduler stopped");
    }
}

async fn run(pipeline: Arc<RecognitionPipeline>) {
    let period = pipeline.tick_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if pipeline.is_shut_down() {
            break;
        }

        if pipeline.pending() == 0 {
            trace!("Recognition queue drained, scheduler suspended");
            pipeline.wait_for_work().await;
            if pipeline.is_shut_down() {
                break;
            }
            // Resume a full period after the wake-up enqueue
            ticker.reset();
            continue;
        }

        ticker.tick().await;

        let worker = Arc::clone(&pipeline);
        match tokio::task::spawn_blocking(move || worker.tick()).await {
            Ok(Some(request_id)) => trace!(request_id, "Recognition tick complete"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Recognition tick panicked"),
        }
    }

    debug!("Recognition scheduler loop exited");
}

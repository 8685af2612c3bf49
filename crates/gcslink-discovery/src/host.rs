//! Host event loop.
//!
//! Polls every registered source on a fixed tick and runs its handler.
//! Backends answer an idle source with no replies, so polling a source
//! that has nothing pending is harmless.

use crate::dnssd::DnsSd;
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineStats};
use crate::table::{EventTable, Handler};
use gcslink_client::OutboundTransport;
use std::future::Future;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Drives a [`Pipeline`] from the host event table
pub struct HostLoop<D: DnsSd, T, X> {
    table: T,
    pipeline: Pipeline<D, T, X>,
}

impl<D, T, X> HostLoop<D, T, X>
where
    D: DnsSd,
    T: EventTable,
    X: OutboundTransport,
{
    /// `table` must be the table the pipeline registers into.
    pub fn new(table: T, pipeline: Pipeline<D, T, X>) -> Self {
        Self { table, pipeline }
    }

    /// Run every registered handler once.
    ///
    /// Sources registered during this pass are picked up on the next one.
    /// Returns the number of handlers run; only a lost browse is an error.
    pub fn poll_once(&mut self) -> Result<usize> {
        let mut dispatched = 0;

        for source in self.table.sources() {
            // an earlier handler this pass may have spent it
            let Some(registration) = self.table.get(source) else {
                continue;
            };

            match registration.handler {
                Handler::ProcessResult => {
                    dispatched += 1;
                    match self.pipeline.process_result(source) {
                        Ok(()) => {}
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            error!(
                                source = %source,
                                stage = %registration.stage,
                                transient = e.is_transient(),
                                error = %e,
                                "Discovery handler failed"
                            )
                        }
                    }
                }
            }
        }

        Ok(dispatched)
    }

    /// Start discovery and poll until `shutdown` resolves.
    ///
    /// Every outstanding query is deregistered on the way out, whether the
    /// loop ended by request or by a lost browse.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        if !self.pipeline.is_running() {
            self.pipeline.start()?;
        }

        let mut ticker = tokio::time::interval(self.pipeline.config().poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    match self.poll_once() {
                        Ok(0) => {}
                        Ok(n) => debug!(handlers = n, "Polled discovery sources"),
                        Err(e) => {
                            error!(error = %e, "Discovery stopped");
                            break Err(e);
                        }
                    }
                }
            }
        };

        self.pipeline.shutdown();
        outcome.map(|()| self.pipeline.stats())
    }

    pub fn pipeline(&self) -> &Pipeline<D, T, X> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline<D, T, X> {
        &mut self.pipeline
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

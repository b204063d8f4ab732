use std::time::Duration;

use anyhow::anyhow;
use common::SettlementReport;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::driver::SettlementDriver;
use crate::error::LedgerResult;

pub type Responder<T> = oneshot::Sender<LedgerResult<T>>;

pub enum SettlementRequest {
    RunPass {
        responder: Responder<SettlementReport>,
    },
}

/// Owns the driver and serves pass requests one at a time, so two passes
/// never overlap.
pub struct SettlementManager {
    work_queue: mpsc::Receiver<SettlementRequest>,
    driver: SettlementDriver,
}

impl SettlementManager {
    pub fn new(work_queue: mpsc::Receiver<SettlementRequest>, driver: SettlementDriver) -> Self {
        Self { work_queue, driver }
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            match request {
                SettlementRequest::RunPass { responder } => {
                    // we do not care if the receiver has already disappeared
                    responder.send(self.driver.run_pass().await).ok();
                }
            }
        }
        info!("settlement manager stopped");
    }
}

/// Asks for a pass through `requester` and waits for its report.
pub async fn request_pass(
    requester: &mpsc::Sender<SettlementRequest>,
) -> anyhow::Result<SettlementReport> {
    let (responder, report) = oneshot::channel();
    requester
        .send(SettlementRequest::RunPass { responder })
        .await
        .map_err(|_| anyhow!("settlement manager is not running"))?;
    Ok(report.await??)
}

/// Requests a pass every `period`, starting immediately. Stops once the
/// manager has gone away.
pub fn spawn_scheduler(
    period: Duration,
    requester: mpsc::Sender<SettlementRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if requester.is_closed() {
                break;
            }
            match request_pass(&requester).await {
                Ok(report) => info!(
                    settled = report.wagers_settled,
                    failed = report.wagers_failed,
                    "scheduled settlement pass completed"
                ),
                Err(e) => {
                    error!("scheduled settlement pass failed: {:#}", e);
                    if requester.is_closed() {
                        break;
                    }
                }
            }
        }
        info!("settlement scheduler stopped");
    })
}

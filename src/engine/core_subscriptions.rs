use futures::Stream;
use tokio::runtime::Builder;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::TrainerHandle;
use crate::analysis::TapResult;
use crate::session::SessionSnapshot;
use crate::telemetry::{self, MetricEvent};

impl TrainerHandle {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    pub fn snapshot_receiver(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn tap_receiver(&self) -> broadcast::Receiver<TapResult> {
        self.tap_tx.subscribe()
    }

    pub fn subscribe_snapshots(&self) -> mpsc::UnboundedReceiver<SessionSnapshot> {
        forward(self.snapshot_tx.subscribe(), "snapshots")
    }

    pub fn subscribe_taps(&self) -> mpsc::UnboundedReceiver<TapResult> {
        forward(self.tap_tx.subscribe(), "taps")
    }

    pub fn subscribe_telemetry(&self) -> mpsc::UnboundedReceiver<MetricEvent> {
        forward(telemetry::hub().collector().subscribe(), "telemetry")
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub fn snapshot_stream(&self) -> impl Stream<Item = SessionSnapshot> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_snapshots())
    }

    pub fn tap_stream(&self) -> impl Stream<Item = TapResult> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_taps())
    }

    pub fn telemetry_stream(&self) -> impl Stream<Item = MetricEvent> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_telemetry())
    }
}

/// Pump a broadcast receiver into an unbounded channel on a helper thread.
///
/// Lagged receivers skip the missed items and keep going; the pump ends when
/// either side closes.
fn forward<T: Clone + Send + 'static>(
    mut broadcast_rx: broadcast::Receiver<T>,
    label: &'static str,
) -> mpsc::UnboundedReceiver<T> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let rt = match Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(err) => {
                log::error!("[TrainerHandle] Failed to start {} pump: {}", label, err);
                return;
            }
        };
        rt.block_on(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(item) => {
                        if tx.send(item).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("[TrainerHandle] {} subscriber lagged by {}", label, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    });

    rx
}

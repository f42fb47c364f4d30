//! Change listener task of a collection cache.
//!
//! Every notification on a watched table triggers a full refresh. Whatever
//! is already queued when the listener wakes up is folded into the same
//! refresh, and refreshes run one at a time.

use std::sync::Weak;
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamMap;

use cinesync_core::store::ChangeEvent;

use super::cache::Inner;
use super::resource::Resource;

type Notification = Result<ChangeEvent, BroadcastStreamRecvError>;

pub(crate) fn spawn<R: Resource>(
    inner: Weak<Inner<R>>,
    receivers: Vec<(&'static str, broadcast::Receiver<ChangeEvent>)>,
    debounce: Duration,
) -> JoinHandle<()> {
    let mut streams = StreamMap::new();
    for (table, receiver) in receivers {
        streams.insert(table, BroadcastStream::new(receiver));
    }
    tokio::spawn(run(inner, streams, debounce))
}

async fn run<R: Resource>(
    inner: Weak<Inner<R>>,
    mut streams: StreamMap<&'static str, BroadcastStream<ChangeEvent>>,
    debounce: Duration,
) {
    while let Some((_, notification)) = streams.next().await {
        log_notification::<R>(&notification);

        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
        }

        let mut coalesced = 0usize;
        while let Some(Some((_, notification))) = streams.next().now_or_never() {
            log_notification::<R>(&notification);
            coalesced += 1;
        }
        if coalesced > 0 {
            tracing::debug!(table = R::TABLE, coalesced, "Coalesced queued notifications");
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        // Failures are logged by refresh; keep listening.
        let _ = inner.refresh().await;
    }
    tracing::debug!(table = R::TABLE, "Change listener stopped");
}

fn log_notification<R: Resource>(notification: &Notification) {
    match notification {
        Ok(event) => {
            let id = if event.table == R::TABLE {
                event.affected_id(R::PRIMARY_KEY).cloned()
            } else {
                None
            };
            tracing::info!(
                table = R::TABLE,
                source = %event.table,
                kind = event.kind.as_str(),
                id = ?id,
                "Change received"
            );
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(
                table = R::TABLE,
                skipped,
                "Change notifications lagged, refreshing anyway"
            );
        }
    }
}

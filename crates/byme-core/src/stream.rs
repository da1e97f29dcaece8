// ── Reactive device stream ──
//
// Subscription handle over the published device table.

use std::sync::Arc;

use tokio::sync::watch;

use crate::store::DeviceMap;

/// A subscription to the device table.
///
/// Gives point-in-time snapshot access and change notification via
/// [`changed`](Self::changed).
pub struct DeviceStream {
    current: Arc<DeviceMap>,
    receiver: watch::Receiver<Arc<DeviceMap>>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<DeviceMap>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<DeviceMap> {
        &self.current
    }

    /// Wait for the next publish. `None` once the project is dropped.
    pub async fn changed(&mut self) -> Option<Arc<DeviceMap>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }
}

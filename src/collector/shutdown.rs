//! Process-wide shutdown flag shared by every collector loop.

use std::time::Duration;

use tokio::sync::watch;

/// Owning side of the shutdown flag.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Cloneable observer of the shutdown flag, one per loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Creates a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    /// Flips the flag. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested, or when the trigger is dropped.
    pub async fn triggered(&mut self) {
        // An Err means the trigger is gone, which also ends the loops.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    /// Sleeps for `duration` unless shutdown arrives first.
    ///
    /// Returns `true` when the caller should stop.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        let interrupted = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.triggered() => true,
        };
        interrupted || self.is_triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_shutdown() {
        let (_trigger, mut signal) = channel();
        assert!(!signal.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_trigger() {
        let (trigger, mut signal) = channel();
        let waiter = tokio::spawn(async move { signal.sleep(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.trigger();

        let stopped = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("sleep did not observe shutdown")
            .expect("task panicked");
        assert!(stopped);
        assert!(trigger.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_trigger_stops_loops() {
        let (trigger, mut signal) = channel();
        drop(trigger);
        let stopped = tokio::time::timeout(Duration::from_secs(2), signal.sleep(Duration::from_secs(60)))
            .await
            .expect("sleep did not observe dropped trigger");
        assert!(stopped);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_flag() {
        let (trigger, _signal) = channel();
        trigger.trigger();
        assert!(trigger.signal().is_triggered());
    }
}

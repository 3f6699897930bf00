//! Trailing-edge debounce for search input.
//!
//! Values pushed faster than the quiet window collapse into one; only the
//! last value is emitted, once no new value arrived for the full window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the timer task; `emit` runs with each settled value.
    pub fn spawn<F>(window: Duration, mut emit: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let task = tokio::spawn(async move {
            while let Some(mut pending) = rx.recv().await {
                loop {
                    match tokio::time::timeout(window, rx.recv()).await {
                        Ok(Some(next)) => pending = next,
                        // Sender gone: flush what we have.
                        Ok(None) => {
                            emit(pending);
                            return;
                        }
                        Err(_) => {
                            emit(pending);
                            break;
                        }
                    }
                }
            }
        });
        Self { tx, task }
    }

    /// Returns false once the debouncer has shut down.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }

    /// Stop accepting values; a pending value is still emitted.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::warn!("Debounce task ended abnormally: {}", e);
        }
    }
}

/// Channel-shaped variant: settled values arrive on the returned receiver.
pub fn debounced<T: Send + 'static>(window: Duration) -> (Debouncer<T>, mpsc::UnboundedReceiver<T>) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let debouncer = Debouncer::spawn(window, move |value| {
        let _ = out_tx.send(value);
    });
    (debouncer, out_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn keystrokes_inside_the_window_collapse_into_one_call() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let debouncer = Debouncer::spawn(Duration::from_millis(500), move |q: String| seen.lock().unwrap().push(q));

        for q in ["a", "al", "ali", "alic", "alice"] {
            debouncer.push(q.to_string());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(calls.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*calls.lock().unwrap(), vec!["alice".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_emit_separately() {
        let (debouncer, mut settled) = debounced(Duration::from_millis(500));
        debouncer.push("first");
        tokio::time::sleep(Duration::from_millis(600)).await;
        debouncer.push("second");
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(settled.recv().await, Some("first"));
        assert_eq!(settled.recv().await, Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_flushes_the_pending_value() {
        let (debouncer, mut settled) = debounced(Duration::from_millis(500));
        debouncer.push(1);
        debouncer.push(2);
        debouncer.finish().await;
        assert_eq!(settled.recv().await, Some(2));
        assert_eq!(settled.recv().await, None);
    }
}

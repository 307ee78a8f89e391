/*
 * ‌
 * Fedlink Rust SDK
 * ​
 * Copyright (C) 2023 - 2026 Fedlink Labs
 * ​
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * ‍
 */

use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::watch;

use crate::Error;

static NEVER: Lazy<(watch::Sender<bool>, watch::Receiver<bool>)> =
    Lazy::new(|| watch::channel(false));

/// The trigger half of a [`Shutdown`] signal.
///
/// Dropping the trigger does *not* shut anything down; sessions keep running
/// until [`ShutdownSignal::trigger`] is called or the process exits.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    /// A fresh, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self { tx: watch::channel(false).0 }
    }

    /// Get a [`Shutdown`] observer for this signal.
    #[must_use]
    pub fn subscribe(&self) -> Shutdown {
        Shutdown { rx: self.tx.subscribe() }
    }

    /// Mark the signal as triggered, aborting every pending [`Shutdown::sleep`].
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer for process termination, checked between messages and inside every
/// suspension point of the session loop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A signal that never triggers.
    #[must_use]
    pub fn never() -> Self {
        Self { rx: NEVER.1.clone() }
    }

    /// Whether the signal has triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Return early with [`Error::Interrupted`] if the signal has triggered.
    pub(crate) fn check(&self) -> crate::Result<()> {
        if self.is_triggered() {
            return Err(Error::Interrupted);
        }

        Ok(())
    }

    /// Sleep for `duration`, waking up immediately with [`Error::Interrupted`]
    /// when the signal triggers.
    pub(crate) async fn sleep(&mut self, duration: Duration) -> crate::Result<()> {
        self.check()?;

        let deadline = tokio::time::Instant::now() + duration;

        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => return Ok(()),
                changed = self.rx.changed() => match changed {
                    Ok(()) if *self.rx.borrow() => return Err(Error::Interrupted),
                    Ok(()) => {}
                    // the trigger half is gone; nothing can interrupt this sleep anymore
                    Err(_) => {
                        tokio::time::sleep_until(deadline).await;
                        return Ok(());
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::ShutdownSignal;
    use crate::{
        Error,
        Shutdown,
    };

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_trigger() {
        let signal = ShutdownSignal::new();
        let mut shutdown = signal.subscribe();

        shutdown.sleep(Duration::from_secs(3)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_aborts_sleep() {
        let signal = ShutdownSignal::new();
        let mut shutdown = signal.subscribe();

        let sleeper = tokio::spawn(async move { shutdown.sleep(Duration::from_secs(3600)).await });

        tokio::task::yield_now().await;
        signal.trigger();

        assert_matches!(sleeper.await.unwrap(), Err(Error::Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn triggered_signal_fails_fast() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        let mut shutdown = signal.subscribe();

        assert!(shutdown.is_triggered());
        assert_matches!(shutdown.sleep(Duration::from_secs(1)).await, Err(Error::Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn never_sleeps_through() {
        let mut shutdown = Shutdown::never();

        shutdown.sleep(Duration::from_secs(3)).await.unwrap();
        assert!(!shutdown.is_triggered());
    }
}

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

use std::time::{
    Duration,
    Instant,
};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_core::Future;

use crate::Shutdown;

#[derive(Debug)]
pub(crate) enum Error {
    /// An error that may be resolved after backoff is applied (connection issues for example)
    Transient(crate::Error),

    /// An error that *cannot* be resolved.
    Permanent(crate::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Snapshot of the invoker's progress, handed to the observability hooks.
#[derive(Debug)]
pub(crate) struct RetryEvent<'a> {
    /// 1-based attempt counter.
    pub(crate) attempt: usize,

    /// Time spent since the first attempt started.
    pub(crate) elapsed: Duration,

    /// The wait about to be applied; `None` for give-up and success events.
    pub(crate) wait: Option<Duration>,

    /// The error of the attempt that just failed, if any.
    pub(crate) error: Option<&'a crate::Error>,
}

type Hook = Box<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Durably retry a fallible action with exponential backoff until it succeeds,
/// a ceiling is hit, or shutdown is triggered.
///
/// The wait sequence is non-decreasing up to `max_interval`; uniform jitter is
/// applied per attempt by the underlying generator.
pub(crate) struct RetryInvoker {
    initial_interval: Duration,
    max_interval: Duration,
    max_attempts: Option<usize>,
    max_elapsed_time: Option<Duration>,
    on_backoff: Option<Hook>,
    on_giveup: Option<Hook>,
    on_success: Option<Hook>,
}

impl RetryInvoker {
    pub(crate) fn new(max_attempts: Option<usize>, max_elapsed_time: Option<Duration>) -> Self {
        Self {
            initial_interval: Duration::from_millis(backoff::default::INITIAL_INTERVAL_MILLIS),
            max_interval: Duration::from_millis(backoff::default::MAX_INTERVAL_MILLIS),
            max_attempts,
            max_elapsed_time,
            on_backoff: None,
            on_giveup: None,
            on_success: None,
        }
    }

    /// Called before each backoff sleep.
    pub(crate) fn on_backoff(
        mut self,
        hook: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_backoff = Some(Box::new(hook));
        self
    }

    /// Called once when a ceiling is hit and the last error is re-raised.
    pub(crate) fn on_giveup(
        mut self,
        hook: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_giveup = Some(Box::new(hook));
        self
    }

    /// Called when an action succeeds on a second or later attempt.
    pub(crate) fn on_success(
        mut self,
        hook: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Run `f` until success or give-up.
    ///
    /// Transient failures back off and retry; permanent failures propagate
    /// immediately. Give-up surfaces as [`crate::Error::TimedOut`] wrapping the
    /// last transient error. The inter-attempt sleep aborts with
    /// [`crate::Error::Interrupted`] when `shutdown` triggers.
    pub(crate) async fn invoke<F, Fut, O>(
        &self,
        shutdown: &mut Shutdown,
        mut f: F,
    ) -> crate::Result<O>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<O>> + Send,
    {
        let started = Instant::now();

        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match f().await {
                Ok(it) => {
                    if attempt > 1 {
                        if let Some(hook) = &self.on_success {
                            hook(&RetryEvent {
                                attempt,
                                elapsed: started.elapsed(),
                                wait: None,
                                error: None,
                            });
                        }
                    }

                    return Ok(it);
                }
                Err(Error::Permanent(e)) => return Err(e),
                Err(Error::Transient(e)) => e,
            };

            let wait = backoff.next_backoff().expect("`max_elapsed_time` is hardwired to None");
            let elapsed = started.elapsed();

            let exhausted_attempts = self.max_attempts.map_or(false, |max| attempt >= max);
            let exhausted_time = self.max_elapsed_time.map_or(false, |max| elapsed + wait > max);

            if exhausted_attempts || exhausted_time {
                if let Some(hook) = &self.on_giveup {
                    hook(&RetryEvent { attempt, elapsed, wait: None, error: Some(&error) });
                }

                return Err(crate::Error::TimedOut(Box::new(error)));
            }

            if let Some(hook) = &self.on_backoff {
                hook(&RetryEvent { attempt, elapsed, wait: Some(wait), error: Some(&error) });
            }

            let wait_ms = wait.as_millis();
            log::warn!("Backing off for {wait_ms}ms after failure of attempt {attempt} due to {error:?}");

            shutdown.sleep(wait).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicUsize,
        Ordering,
    };
    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::RetryInvoker;
    use crate::retry;
    use crate::{
        Error,
        Shutdown,
    };

    fn transient() -> retry::Error {
        retry::Error::Transient(Error::Interrupted)
    }

    #[tokio::test(start_paused = true)]
    async fn first_try_success_skips_hooks() {
        let successes = Arc::new(AtomicUsize::new(0));

        let invoker = RetryInvoker::new(None, None).on_success({
            let successes = Arc::clone(&successes);
            move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            }
        });

        let result = invoker.invoke(&mut Shutdown::never(), || async { Ok(42) }).await.unwrap();

        assert_eq!(result, 42);
        assert_eq!(successes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let attempts = AtomicUsize::new(0);
        let backoffs = Arc::new(AtomicUsize::new(0));
        let successes = Arc::new(AtomicUsize::new(0));

        let invoker = RetryInvoker::new(None, None)
            .on_backoff({
                let backoffs = Arc::clone(&backoffs);
                move |event| {
                    assert!(event.wait.is_some());
                    backoffs.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_success({
                let successes = Arc::clone(&successes);
                move |event| {
                    assert_eq!(event.attempt, 3);
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            });

        let result = invoker
            .invoke(&mut Shutdown::never(), || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(transient())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(backoffs.load(Ordering::SeqCst), 2);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicUsize::new(0);
        let giveups = Arc::new(AtomicUsize::new(0));

        let invoker = RetryInvoker::new(Some(3), None).on_giveup({
            let giveups = Arc::clone(&giveups);
            move |_| {
                giveups.fetch_add(1, Ordering::SeqCst);
            }
        });

        let result: crate::Result<()> = invoker
            .invoke(&mut Shutdown::never(), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert_matches!(result, Err(Error::TimedOut(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(giveups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_wait_exceeds_max_elapsed_time() {
        // the first computed wait is at least 250ms, so a 1ms budget trips
        // the `elapsed + wait > max` check on the very first failure.
        let invoker = RetryInvoker::new(None, Some(Duration::from_millis(1)));

        let result: crate::Result<()> =
            invoker.invoke(&mut Shutdown::never(), || async { Err(transient()) }).await;

        assert_matches!(result, Err(Error::TimedOut(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_propagates_immediately() {
        let attempts = AtomicUsize::new(0);

        let invoker = RetryInvoker::new(None, None);

        let result: crate::Result<()> = invoker
            .invoke(&mut Shutdown::never(), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(retry::Error::Permanent(Error::protocol("bad frame"))) }
            })
            .await;

        assert_matches!(result, Err(Error::Protocol(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}

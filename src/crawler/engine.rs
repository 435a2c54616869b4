//! Per-seed crawl engine
//!
//! A single engine drives one seed to completion: a frontier channel feeds
//! the main loop with batches of discovered URLs, workers fetch them under
//! a semaphore that bounds concurrency, and new-found links flow back into
//! the frontier. The engine terminates when the frontier has been idle for
//! the configured quiet period with nothing left in flight, when the URL
//! budget is exhausted, or on cancellation.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::emitter::ResultEmitter;
use super::politeness::PolitenessPolicy;
use crate::config::Settings;
use crate::fetcher::Fetcher;

pub(crate) struct CrawlEngine {
    seed: Url,
    settings: Arc<Settings>,
    fetcher: Arc<Fetcher>,
    policy: Arc<PolitenessPolicy>,
    emitter: ResultEmitter,
    cancel: CancellationToken,
}

impl CrawlEngine {
    pub(crate) fn new(
        seed: Url,
        settings: Arc<Settings>,
        fetcher: Arc<Fetcher>,
        policy: Arc<PolitenessPolicy>,
        emitter: ResultEmitter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            seed,
            settings,
            fetcher,
            policy,
            emitter,
            cancel,
        }
    }

    /// Crawls the seed's domain to completion.
    ///
    /// Every cycle of the main loop handles one frontier batch; workers
    /// push the links they discover back in, keeping the loop going until
    /// the domain is exhausted. Each batch resets the quiet-period timer.
    pub(crate) async fn run(self) {
        let concurrency = self.settings.concurrency.max(1);
        let (frontier_tx, mut frontier_rx) = mpsc::channel::<Vec<Url>>(concurrency);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        // URLs admitted to the frontier but not yet disposed of, counting
        // the seed itself.
        let in_flight = Arc::new(AtomicI64::new(1));

        // Kickstart with the seed before the loop takes over the receiver.
        if frontier_tx.send(vec![self.seed.clone()]).await.is_err() {
            return;
        }

        let host = self.seed.host_str().unwrap_or_default().to_string();
        if self
            .policy
            .load_robots(&self.fetcher, &self.settings.user_agent)
            .await
        {
            tracing::info!("found a valid {}/robots.txt", host);
        } else {
            tracing::info!("no valid {}/robots.txt found", host);
        }

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut depth: u64 = 0;
        let mut stop = false;

        while !stop {
            tokio::select! {
                batch = frontier_rx.recv() => {
                    let Some(batch) = batch else { break };
                    for link in batch {
                        // Skip already visited links and ones the rules of
                        // the domain disallow
                        if !self.policy.allowed(&link).await {
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            continue;
                        }
                        workers.push(self.spawn_worker(
                            link,
                            stop,
                            Arc::clone(&semaphore),
                            frontier_tx.clone(),
                            Arc::clone(&in_flight),
                        ));
                        // Every link admitted from the frontier counts
                        // against the URL budget
                        if self.settings.max_depth > 0 {
                            depth += 1;
                            if depth >= self.settings.max_depth {
                                tracing::debug!("URL budget reached for {}", host);
                                stop = true;
                            }
                        }
                    }
                }
                _ = tokio::time::sleep(self.settings.crawling_timeout) => {
                    // Quiet period elapsed with no new batch: stop once the
                    // remaining links have all been disposed of
                    if in_flight.load(Ordering::SeqCst) <= 0 {
                        stop = true;
                    }
                }
                _ = self.cancel.cancelled() => {
                    tracing::debug!("crawl of {} canceled", host);
                    // Return right away; outstanding workers run to
                    // completion on their own, bounded by the fetch timeout
                    return;
                }
            }
        }

        // Dropping the receiver fails any worker still pushing children,
        // unblocking it for the drain below.
        drop(frontier_rx);
        for worker in workers {
            let _ = worker.await;
        }
    }

    fn spawn_worker(
        &self,
        link: Url,
        stopping: bool,
        semaphore: Arc<Semaphore>,
        frontier: mpsc::Sender<Vec<Url>>,
        in_flight: Arc<AtomicI64>,
    ) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let policy = Arc::clone(&self.policy);
        let emitter = self.emitter.clone();

        tokio::spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed while workers exist
                Err(_) => {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            };

            let (response_time, outcome) = fetcher.fetch_links(link.as_str()).await;
            policy.update_last_delay(response_time).await;

            match outcome {
                Err(err) => tracing::warn!("{}", err),
                Ok(links) => {
                    if !stopping && !links.is_empty() {
                        in_flight.fetch_add(links.len() as i64, Ordering::SeqCst);
                        // Hand the result downstream, then feed the frontier
                        // for the next cycle
                        emitter.emit(&link, &links);
                        // A failed send only means the engine is already
                        // shutting down
                        let _ = frontier.send(links).await;
                    }
                }
            }

            // Sleep while still holding the permit: the politeness delay
            // gates the next acquisition by any worker of this domain
            tokio::time::sleep(policy.crawl_delay().await).await;
            drop(permit);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

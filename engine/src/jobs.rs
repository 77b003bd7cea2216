//! Background batch jobs.
//!
//! Jobs run detached from the request cycle and share state with
//! in-flight requests only through the cache and the store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use styledeck_store::ProductEmbeddings;

use crate::engine::Styledeck;
use crate::error::Result;

/// Coerce a concrete `Send` future into a boxed trait object.
///
/// Awaiting the boxed form means the enclosing `async fn` holds a
/// `Pin<Box<dyn Future + Send>>` across the await rather than the
/// concrete nested future. That keeps the enclosing future `Send`
/// without the compiler having to discharge the higher-ranked `Send`
/// bound that `tokio::spawn` otherwise imposes on the nested future's
/// borrowed arguments. Behavior is unchanged.
fn send_boxed<'a, F>(fut: F) -> Pin<Box<dyn Future<Output = F::Output> + Send + 'a>>
where
    F: Future + Send + 'a,
{
    Box::pin(fut)
}

impl Styledeck {
    /// One pass of the embedding backlog sweep: fetch products still
    /// missing embeddings, batch-encode them, and persist the rows
    /// where both vectors landed. Products whose image failed stay
    /// pending for the next pass. Returns the number persisted.
    pub async fn sweep_pending(&self, batch_size: i64) -> Result<usize> {
        let pending = send_boxed(styledeck_retry::execute(
            move || self.store().pending_products(batch_size),
            self.db_policy(),
        ))
        .await?;

        if pending.is_empty() {
            debug!("no pending products to process");
            return Ok(0);
        }

        info!("processing batch of {} products", pending.len());

        let titles: Vec<String> = pending.iter().map(|p| p.title.clone()).collect();
        let image_urls: Vec<String> = pending.iter().map(|p| p.image_url.clone()).collect();

        let batch = send_boxed(self.generator().encode_batch(&titles, &image_urls)).await?;

        let mut rows = Vec::new();
        for (i, product) in pending.iter().enumerate() {
            let text = batch.texts.get(i);
            let image = batch.images.get(i).and_then(|slot| slot.embedding());

            match (text, image) {
                (Some(text), Some(image)) => rows.push(ProductEmbeddings {
                    id: product.id,
                    image: image.clone(),
                    text: text.clone(),
                }),
                _ => warn!("leaving product {} for the next sweep", product.id),
            }
        }

        if rows.is_empty() {
            return Ok(0);
        }

        let updated = send_boxed(styledeck_retry::execute(
            || self.store().batch_update_embeddings(&rows),
            self.db_policy(),
        ))
        .await?;

        Ok(updated)
    }
}

/// Run the backlog sweep on an interval until the handle is aborted.
pub fn spawn_sweeper(
    engine: Arc<Styledeck>,
    interval: Duration,
    batch_size: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match engine.sweep_pending(batch_size).await {
                Ok(0) => debug!("embedding sweep found nothing to do"),
                Ok(updated) => info!("embedding sweep persisted {updated} products"),
                Err(err) => warn!("embedding sweep failed: {err}"),
            }
        }
    })
}

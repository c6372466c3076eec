//! Bounded, deduplicated supply of genomes for the first tier.
//!
//! Two sources feed one output queue: explicit enqueues (breeders, recycled
//! and crossed genomes) and background generation by the factory. Enqueued
//! genomes are preferred. A hash is "in flight" from the moment a source
//! accepts it until a consumer takes it, and is never queued twice.

use crate::engines::generation::{Genome, GenomeFactory};
use crate::engines::pipeline::stage::{join_blocking, StageExit};
use crate::error::{EqforgeError, Result};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Sources {
    priority_rx: mpsc::Receiver<Arc<Genome>>,
    output_tx: mpsc::Sender<Arc<Genome>>,
}

pub struct GenomeProducer {
    factory: Arc<GenomeFactory>,
    capacity: usize,
    priority_tx: mpsc::Sender<Arc<Genome>>,
    sources: Mutex<Option<Sources>>,
    output_rx: tokio::sync::Mutex<mpsc::Receiver<Arc<Genome>>>,
    in_flight: Mutex<HashSet<String>>,
}

impl GenomeProducer {
    pub fn new(factory: Arc<GenomeFactory>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EqforgeError::Contract(
                "Producer capacity must be at least 1".to_string(),
            ));
        }
        let (priority_tx, priority_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);
        Ok(Self {
            factory,
            capacity,
            priority_tx,
            sources: Mutex::new(Some(Sources {
                priority_rx,
                output_tx,
            })),
            output_rx: tokio::sync::Mutex::new(output_rx),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn factory(&self) -> &Arc<GenomeFactory> {
        &self.factory
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, hash: &str) -> bool {
        self.in_flight.lock().contains(hash)
    }

    fn claim(&self, hash: &str) -> bool {
        self.in_flight.lock().insert(hash.to_string())
    }

    fn release(&self, hash: &str) {
        self.in_flight.lock().remove(hash);
    }

    /// Queues `genome`, waiting while the queue is full. Returns false when
    /// its hash is already in flight or the producer has shut down.
    pub async fn enqueue(&self, genome: Arc<Genome>) -> bool {
        if !self.claim(genome.hash()) {
            return false;
        }
        let hash = genome.hash().to_string();
        if self.priority_tx.send(genome).await.is_err() {
            self.release(&hash);
            return false;
        }
        true
    }

    /// Like [`GenomeProducer::enqueue`] but gives up instead of waiting.
    pub fn try_enqueue(&self, genome: Arc<Genome>) -> bool {
        if !self.claim(genome.hash()) {
            return false;
        }
        let hash = genome.hash().to_string();
        match self.priority_tx.try_send(genome) {
            Ok(()) => true,
            Err(_) => {
                self.release(&hash);
                false
            }
        }
    }

    /// Takes the next queued genome; `None` once the producer is exhausted
    /// and drained.
    pub async fn next(&self) -> Option<Arc<Genome>> {
        let genome = self.output_rx.lock().await.recv().await?;
        self.release(genome.hash());
        Some(genome)
    }

    fn generate_into(&self, tx: mpsc::Sender<Arc<Genome>>) -> Result<()> {
        loop {
            let Some(genome) = self.factory.generate()? else {
                return Ok(());
            };
            if !self.claim(genome.hash()) {
                continue;
            }
            let hash = genome.hash().to_string();
            if tx.blocking_send(genome).is_err() {
                self.release(&hash);
                return Ok(());
            }
        }
    }

    /// Merges both sources into the output queue until generation is
    /// exhausted and no enqueued genome is waiting.
    pub async fn run(self: Arc<Self>) -> Result<StageExit> {
        let sources = self.sources.lock().take();
        let Some(Sources {
            mut priority_rx,
            output_tx,
        }) = sources
        else {
            return Err(EqforgeError::Contract(
                "Producer is already running".to_string(),
            ));
        };

        let (generated_tx, mut generated_rx) = mpsc::channel(self.capacity);
        let generator = {
            let producer = Arc::clone(&self);
            tokio::task::spawn_blocking(move || producer.generate_into(generated_tx))
        };
        let mut generator = Some(generator);

        loop {
            let genome = if generator.is_some() {
                tokio::select! {
                    biased;
                    Some(genome) = priority_rx.recv() => genome,
                    generated = generated_rx.recv() => match generated {
                        Some(genome) => genome,
                        None => {
                            if let Some(task) = generator.take() {
                                join_blocking("producer", task).await?;
                            }
                            info!(
                                "Genome generation exhausted after {} genomes",
                                self.factory.generated()
                            );
                            continue;
                        }
                    },
                }
            } else {
                match priority_rx.try_recv() {
                    Ok(genome) => genome,
                    Err(_) => break,
                }
            };
            let hash = genome.hash().to_string();
            if output_tx.send(genome).await.is_err() {
                self.release(&hash);
                debug!("Producer output closed");
                return Ok(StageExit::Completed);
            }
        }
        Ok(StageExit::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactoryConfig;
    use crate::genes::Catalog;
    use std::time::Duration;

    fn producer(capacity: usize) -> Arc<GenomeProducer> {
        let factory = GenomeFactory::new(
            Catalog::from_symbols(&["+", "*"]).unwrap(),
            FactoryConfig::default(),
        )
        .unwrap();
        Arc::new(GenomeProducer::new(Arc::new(factory), capacity).unwrap())
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_refused() {
        let producer = producer(4);
        let genome = producer.factory().register_gene("(a + b)".parse().unwrap()).unwrap();
        assert!(producer.try_enqueue(Arc::clone(&genome)));
        assert!(!producer.try_enqueue(Arc::clone(&genome)));
        assert!(!producer.enqueue(genome).await);
        assert_eq!(producer.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_try_enqueue_refuses_when_full() {
        let producer = producer(1);
        let factory = Arc::clone(producer.factory());
        assert!(producer.try_enqueue(factory.register_gene("(a + b)".parse().unwrap()).unwrap()));
        assert!(!producer.try_enqueue(factory.register_gene("(a*b)".parse().unwrap()).unwrap()));
        assert!(!producer.is_in_flight("(a*b)"));
    }

    #[tokio::test]
    async fn test_enqueued_genomes_come_first() {
        let producer = producer(4);
        let genome = producer.factory().register_gene("(a*a*b)".parse().unwrap()).unwrap();
        assert!(producer.enqueue(Arc::clone(&genome)).await);
        tokio::spawn(Arc::clone(&producer).run());
        let first = tokio::time::timeout(Duration::from_secs(5), producer.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.hash(), genome.hash());
        assert!(!producer.is_in_flight(genome.hash()));
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let producer = producer(2);
        tokio::spawn(Arc::clone(&producer).run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            Arc::clone(&producer).run().await,
            Err(EqforgeError::Contract(_))
        ));
    }
}

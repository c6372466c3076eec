use crate::engines::generation::{Genome, GenomeFactory};
use crate::engines::pipeline::producer::GenomeProducer;
use crate::engines::pipeline::stage::{join_blocking, StageExit};
use crate::error::Result;
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Grows the search frontier: every batch a tier sends is expanded into
/// reduced forms, variations and mutations, which go back to the producer.
pub struct Breeders {
    factory: Arc<GenomeFactory>,
    producer: Arc<GenomeProducer>,
}

impl Breeders {
    pub fn new(factory: Arc<GenomeFactory>, producer: Arc<GenomeProducer>) -> Self {
        Self { factory, producer }
    }

    pub async fn breed(&self, batch: Vec<Arc<Genome>>) -> Result<usize> {
        let factory = Arc::clone(&self.factory);
        let offspring = join_blocking(
            "breeders",
            tokio::task::spawn_blocking(move || factory.expand_all(&batch)),
        )
        .await?;
        let mut queued = 0;
        for genome in offspring {
            if self.producer.enqueue(genome).await {
                queued += 1;
            }
        }
        Ok(queued)
    }

    pub async fn run(self, mut batches: mpsc::Receiver<Vec<Arc<Genome>>>) -> Result<StageExit> {
        while let Some(batch) = batches.recv().await {
            let size = batch.len();
            let queued = self.breed(batch).await?;
            debug!("Bred {} genomes into {} new candidates", size, queued);
        }
        Ok(StageExit::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactoryConfig;
    use crate::genes::Catalog;

    #[tokio::test]
    async fn test_breed_queues_expansions() {
        let factory = Arc::new(
            GenomeFactory::new(Catalog::from_symbols(&["+", "*"]).unwrap(), FactoryConfig::default()).unwrap(),
        );
        let producer = Arc::new(GenomeProducer::new(Arc::clone(&factory), 16).unwrap());
        let breeders = Breeders::new(Arc::clone(&factory), Arc::clone(&producer));
        let parent = factory.register_gene("(a + a + b)".parse().unwrap()).unwrap();

        let queued = breeders.breed(vec![parent]).await.unwrap();
        assert!(queued >= 1);
        assert!(producer.is_in_flight("(2a + b)"));
        assert_eq!(producer.in_flight(), queued);
    }
}

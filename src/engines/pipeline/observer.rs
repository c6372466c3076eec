use crate::types::TopGenome;
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Receives every improving genome posted by the network.
pub trait TopGenomeObserver: Send + 'static {
    fn on_top_genome(&mut self, top: &TopGenome);

    /// The observer fell behind and `skipped` posts were lost.
    fn on_lagged(&mut self, skipped: u64) {
        warn!("Top genome observer skipped {} posts", skipped);
    }

    fn on_closed(&mut self) {}
}

pub struct LogObserver;

impl TopGenomeObserver for LogObserver {
    fn on_top_genome(&mut self, top: &TopGenome) {
        let reduced = top
            .genome
            .reduced()
            .map(|r| r.hash().to_string())
            .unwrap_or_else(|| top.genome.hash().to_string());
        info!(
            "Top genome for '{}' from tier {}: {} => {} ({})",
            top.problem_id, top.tier, top.genome, reduced, top.fitness
        );
    }
}

/// Forwards posts to an unbounded channel, e.g. for a UI or a test.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<TopGenome>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<TopGenome>) -> Self {
        Self { sender }
    }
}

impl TopGenomeObserver for ChannelObserver {
    fn on_top_genome(&mut self, top: &TopGenome) {
        let _ = self.sender.send(top.clone());
    }
}

/// Drives `observer` from `stream` until the network drops its sender.
pub fn spawn_observer<O: TopGenomeObserver>(
    mut stream: broadcast::Receiver<TopGenome>,
    mut observer: O,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match stream.recv().await {
                Ok(top) => observer.on_top_genome(&top),
                Err(RecvError::Lagged(skipped)) => observer.on_lagged(skipped),
                Err(RecvError::Closed) => {
                    observer.on_closed();
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::Fitness;
    use crate::engines::generation::Genome;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_channel_observer_forwards_posts() {
        let (top_tx, top_rx) = broadcast::channel(4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_observer(top_rx, ChannelObserver::new(tx));

        top_tx
            .send(TopGenome {
                problem_id: "p".to_string(),
                genome: Arc::new(Genome::new("(a)".parse().unwrap())),
                fitness: Fitness::sample(0.5, false),
                tier: 0,
            })
            .unwrap();
        drop(top_tx);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.genome.hash(), "(a)");
        handle.await.unwrap();
    }
}

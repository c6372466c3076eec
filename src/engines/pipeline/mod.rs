pub mod breeders;
pub mod network;
pub mod observer;
pub mod producer;
pub mod stage;
pub mod tier;

pub use breeders::Breeders;
pub use network::PipelineNetwork;
pub use observer::{spawn_observer, ChannelObserver, LogObserver, TopGenomeObserver};
pub use producer::GenomeProducer;
pub use stage::{spawn_stage, ControlEvent, StageExit, StageHandle, StopSignal};
pub use tier::{Tier, TierInput};

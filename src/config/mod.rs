pub mod factory;
pub mod manager;
pub mod pipeline;
pub mod sampling;
pub mod traits;

pub use factory::FactoryConfig;
pub use manager::{AppConfig, ConfigManager};
pub use pipeline::{PipelineConfig, MIN_POOL_SIZE_FLOOR};
pub use sampling::SamplingConfig;
pub use traits::{ConfigManifest, ConfigSection, FieldManifest};

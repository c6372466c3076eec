use thiserror::Error;

#[derive(Error, Debug)]
pub enum EqforgeError {
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Reduction of {gene} did not settle after {passes} passes")]
    ReductionDiverged { gene: String, passes: usize },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Genome producer exhausted before convergence")]
    ProducerExhausted,

    #[error("Stage '{stage}' faulted: {source}")]
    StageFaulted {
        stage: String,
        #[source]
        source: Box<EqforgeError>,
    },

    #[error("Stage '{0}' panicked")]
    StagePanicked(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl EqforgeError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        EqforgeError::Parse {
            position,
            message: message.into(),
        }
    }

    /// Wraps an error raised inside a pipeline stage, keeping the original cause.
    pub fn in_stage(stage: impl Into<String>, source: EqforgeError) -> Self {
        EqforgeError::StageFaulted {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Walks through stage wrappers to the error that started the fault.
    pub fn root_cause(&self) -> &EqforgeError {
        match self {
            EqforgeError::StageFaulted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, EqforgeError>;

use thiserror::Error;
use uuid::Uuid;

/// The closed error taxonomy for this engine. Every public engine
/// operation returns `Result<T, EngineError>`; the facade never panics
/// or propagates a bare string.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed on {element_id}: {message}")]
    Validation { element_id: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous match: {0} candidates for {1}")]
    Ambiguous(usize, String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("instance {0} is locked by another caller")]
    Locked(Uuid),

    #[error("instance {0} is not in the expected state for this operation: {1}")]
    WrongState(Uuid, String),

    #[error("unhandled BPMN error '{code}' terminated instance {instance_id}")]
    UnhandledBpmnError { instance_id: Uuid, code: String },

    #[error("definition load failed: {0}")]
    DefinitionLoad(String),

    #[error("script evaluation failed: {0}")]
    Script(String),
}

/// The tri-state result of a lookup that is supposed to match exactly
/// one record. This
/// replaces the source's "raise if not exactly one" convention with an
/// explicit sum type so callers decide what "not found" vs "ambiguous"
/// means for them.
#[derive(Debug)]
pub enum LookupResult<T> {
    Found(T),
    NotFound,
    Ambiguous(Vec<T>),
}

impl<T> LookupResult<T> {
    pub fn from_vec(mut matches: Vec<T>) -> Self {
        match matches.len() {
            0 => LookupResult::NotFound,
            1 => LookupResult::Found(matches.pop().unwrap()),
            _ => LookupResult::Ambiguous(matches),
        }
    }

    pub fn into_single(self, what: &str) -> Result<T, EngineError> {
        match self {
            LookupResult::Found(v) => Ok(v),
            LookupResult::NotFound => Err(EngineError::NotFound(what.to_string())),
            LookupResult::Ambiguous(v) => Err(EngineError::Ambiguous(v.len(), what.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

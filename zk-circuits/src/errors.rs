use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZkError {
    #[error("invalid merkle depth: {0}")]
    InvalidDepth(usize),

    #[error("merkle tree full: capacity {capacity}, got {got} leaves")]
    TreeFull { capacity: usize, got: usize },

    #[error("leaf index {index} out of range ({len} leaves)")]
    LeafOutOfRange { index: usize, len: usize },

    #[error("witness does not satisfy the circuit")]
    Unsatisfied,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("proof verification failed")]
    VerificationFailed,

    #[error("arkworks error: {0}")]
    Ark(String),
}

use thiserror::Error;

use crate::tuple::Tuple;

/// Error returned by reservoir operations.
#[derive(Debug, Error)]
pub enum ReservoirError<T> {
    /// The reservoir already holds as many tuples as its capacity allows. The
    /// rejected tuple is handed back to the producer.
    #[error("Reservoir capacity exceeded")]
    CapacityExceeded(Tuple<T>),

    /// A data tuple is pending but no sink has been registered.
    #[error("Data tuple pending with no sink registered")]
    IllegalState,
}

impl<T> ReservoirError<T> {
    /// Returns the rejected tuple, if any.
    pub fn into_inner(self) -> Option<Tuple<T>> {
        match self {
            Self::CapacityExceeded(t) => Some(t),
            Self::IllegalState => None,
        }
    }
}

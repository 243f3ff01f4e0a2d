use thiserror::Error;

/// Recoverable runtime errors.
///
/// Protocol violations (a second concurrent joiner, operating on a destroyed
/// mutex or condition) and scheduler deadlock are programming errors with no
/// safe recovery; those panic instead of returning a variant here.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The sleep registry was configured with a capacity and every slot is
    /// already taken by a sleeping thread.
    #[error("sleep registry full: {capacity} threads already sleeping")]
    SleepRegistryFull { capacity: usize },
}

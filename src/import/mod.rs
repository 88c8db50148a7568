pub mod csv;

pub use csv::{parse_train_csv, CsvTrainSource, TrainColumn};

use crate::error::ImportError;
use crate::models::Train;

/// Anything that can hand the dispatcher a timetable
pub trait TrainSource {
    /// # Errors
    ///
    /// Returns an `ImportError` if the timetable cannot be read.
    fn load_trains(&self) -> Result<Vec<Train>, ImportError>;
}

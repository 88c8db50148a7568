mod history;
mod train;

pub use history::{HistoryEntry, InMemoryHistory, TrainHistory};
pub use train::{ApproachDirection, Train, TrainStatus};

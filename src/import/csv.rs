use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::{
    BASELINE_SPEED_KMH, DEFAULT_BLOCK_CLEARANCE_MINUTES, DEFAULT_JUNCTION_CLEARANCE_MINUTES,
    DEFAULT_TRAIN_CAPACITY,
};
use crate::error::ImportError;
use crate::models::{ApproachDirection, Train};

use super::TrainSource;

const DEFAULT_ARRIVAL: &str = "06:00";
const DEFAULT_TIMETABLE_PRIORITY: i64 = 2;

/// Columns a timetable may carry. Headers are matched case-insensitively
/// and a few common spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainColumn {
    TrainId,
    TrainName,
    ArrivalTime,
    DepartureTime,
    BlockId,
    ApproachDir,
    NextJunction,
    NextBlock,
    DistanceToJunction,
    MaxSpeed,
    ClearanceMin,
    JunctionClearanceMin,
    Priority,
    Passengers,
    DistanceKm,
    TravelTimeHr,
    TrainCapacity,
    IsPeakHour,
}

impl TrainColumn {
    #[must_use]
    pub fn from_header(header: &str) -> Option<Self> {
        let normalized = header.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let column = match normalized.as_str() {
            "train_id" | "train_no" | "train_number" | "id" => Self::TrainId,
            "train_name" | "name" => Self::TrainName,
            "arrival_time" | "arrival" => Self::ArrivalTime,
            "departure_time" | "departure" => Self::DepartureTime,
            "block_id" | "block" => Self::BlockId,
            "approach_dir" | "direction" | "dir" => Self::ApproachDir,
            "next_junction" | "junction" => Self::NextJunction,
            "next_block" => Self::NextBlock,
            "distance_to_junction" => Self::DistanceToJunction,
            "max_speed" | "speed" => Self::MaxSpeed,
            "clearance_min" | "clearance" => Self::ClearanceMin,
            "junction_clearance_min" | "junction_clearance" => Self::JunctionClearanceMin,
            "priority" | "priority_level" => Self::Priority,
            "passengers" => Self::Passengers,
            "distance_km" | "distance" => Self::DistanceKm,
            "travel_time_hr" | "travel_time" => Self::TravelTimeHr,
            "train_capacity" | "capacity" => Self::TrainCapacity,
            "is_peak_hour" | "peak_hour" => Self::IsPeakHour,
            _ => return None,
        };
        Some(column)
    }
}

/// A header row resolved to column positions
struct ColumnMap(HashMap<TrainColumn, usize>);

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            match TrainColumn::from_header(header) {
                Some(column) => {
                    map.entry(column).or_insert(idx);
                }
                None => log::debug!("Ignoring unknown timetable column {header:?}"),
            }
        }
        Self(map)
    }

    /// Trimmed, non-empty cell for `column`
    fn text<'r>(&self, record: &'r csv::StringRecord, column: TrainColumn) -> Option<&'r str> {
        let idx = *self.0.get(&column)?;
        record.get(idx).map(str::trim).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, record: &csv::StringRecord, column: TrainColumn, row: usize) -> Option<T> {
        let raw = self.text(record, column)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Row {row}: ignoring unreadable {column:?} value {raw:?}");
                None
            }
        }
    }
}

fn parse_peak_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}

/// Read a timetable with a header row into trains in their ingestion state.
///
/// Absent cells take defaults: the row number as id, `06:00` arrival,
/// departure equal to arrival, 80 km/h, `BLK_<id>` block, `UP` direction,
/// 3 and 5 minute clearances, capacity 800 and priority 2. Unreadable
/// numbers are logged and defaulted; an unknown direction is left unset so
/// the detectors skip the train.
///
/// # Errors
///
/// Returns `ImportError::Csv` if the content is not valid CSV, or
/// `ImportError::InvalidRow` if a train id appears twice.
pub fn parse_train_csv(content: &str) -> Result<Vec<Train>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let columns = ColumnMap::from_headers(reader.headers()?);
    let mut trains: Vec<Train> = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let train = train_from_record(&columns, &record, row);
        if trains.iter().any(|t| t.train_id == train.train_id) {
            return Err(ImportError::InvalidRow {
                row,
                reason: format!("duplicate train id {}", train.train_id),
            });
        }
        trains.push(train);
    }

    log::info!("Parsed {} trains from timetable", trains.len());
    Ok(trains)
}

fn train_from_record(columns: &ColumnMap, record: &csv::StringRecord, row: usize) -> Train {
    use TrainColumn as C;

    let train_id = columns
        .text(record, C::TrainId)
        .map_or_else(|| row.to_string(), ToString::to_string);
    let arrival = columns.text(record, C::ArrivalTime).unwrap_or(DEFAULT_ARRIVAL);
    let block_id = columns
        .text(record, C::BlockId)
        .map_or_else(|| format!("BLK_{train_id}"), ToString::to_string);
    let approach_dir = match columns.text(record, C::ApproachDir) {
        None => Some(ApproachDirection::Up),
        Some(raw) => match raw.parse() {
            Ok(dir) => Some(dir),
            Err(err) => {
                log::warn!("Row {row}: {err}");
                None
            }
        },
    };

    let mut train = Train::new(train_id, arrival, block_id, ApproachDirection::Up);
    train.approach_dir = approach_dir;
    if let Some(departure) = columns.text(record, C::DepartureTime) {
        train.departure_time = departure.to_string();
    }
    train.train_name = columns.text(record, C::TrainName).map(ToString::to_string);
    train.next_junction = columns.text(record, C::NextJunction).map(ToString::to_string);
    train.next_block = columns.text(record, C::NextBlock).map(ToString::to_string);
    train.distance_to_junction = columns.parse(record, C::DistanceToJunction, row).unwrap_or(0.0);
    train.max_speed = columns.parse(record, C::MaxSpeed, row).unwrap_or(BASELINE_SPEED_KMH);
    train.clearance_min = Some(
        columns
            .parse(record, C::ClearanceMin, row)
            .unwrap_or(DEFAULT_BLOCK_CLEARANCE_MINUTES),
    );
    train.junction_clearance_min = Some(
        columns
            .parse(record, C::JunctionClearanceMin, row)
            .unwrap_or(DEFAULT_JUNCTION_CLEARANCE_MINUTES),
    );
    train.priority = Some(
        columns
            .parse(record, C::Priority, row)
            .unwrap_or(DEFAULT_TIMETABLE_PRIORITY),
    );
    train.passengers = columns.parse(record, C::Passengers, row);
    train.distance_km = columns.parse(record, C::DistanceKm, row);
    train.travel_time_hr = columns.parse(record, C::TravelTimeHr, row);
    train.train_capacity = Some(
        columns
            .parse(record, C::TrainCapacity, row)
            .unwrap_or(DEFAULT_TRAIN_CAPACITY),
    );
    train.is_peak_hour = columns
        .text(record, C::IsPeakHour)
        .is_some_and(parse_peak_flag);
    train
}

/// Timetable held in memory or read from a CSV file
#[derive(Debug, Clone)]
pub enum CsvTrainSource {
    Text(String),
    File(PathBuf),
}

impl CsvTrainSource {
    #[must_use]
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }
}

impl TrainSource for CsvTrainSource {
    fn load_trains(&self) -> Result<Vec<Train>, ImportError> {
        match self {
            Self::Text(content) => parse_train_csv(content),
            Self::File(path) => {
                let content = std::fs::read_to_string(path)?;
                parse_train_csv(&content)
            }
        }
    }
}

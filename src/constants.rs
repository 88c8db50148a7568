/// Block clearance used when a train carries no `clearance_min`
pub const DEFAULT_BLOCK_CLEARANCE_MINUTES: f64 = 3.0;

/// Junction clearance used when a train carries no `junction_clearance_min`
pub const DEFAULT_JUNCTION_CLEARANCE_MINUTES: f64 = 5.0;

/// Following gap below which a same-direction train must take the loop line
pub const LOOP_LINE_FOLLOW_GAP_MINUTES: i64 = 5;

/// How long a freshly resolved train is hidden from the loop-line detector
pub const RESOLVED_GRACE_SECONDS: i64 = 5 * 60;

/// Speed assumed for junction projection when a train has no usable `max_speed`
pub const FALLBACK_JUNCTION_SPEED_KMH: f64 = 60.0;

/// Line speed the delay-reduction policy measures suggested speeds against
pub const BASELINE_SPEED_KMH: f64 = 80.0;

/// Number of accepted resolutions kept in the performance history
pub const RESOLUTION_HISTORY_CAPACITY: usize = 50;

// Severity cut-offs as a fraction of the required clearance
pub const BLOCK_CRITICAL_RATIO: f64 = 0.33;
pub const BLOCK_HIGH_RATIO: f64 = 0.67;
pub const JUNCTION_CRITICAL_RATIO: f64 = 0.3;
pub const JUNCTION_HIGH_RATIO: f64 = 0.6;

// Decision request defaults for missing capability data
pub const DEFAULT_PRIORITY_LEVEL: i64 = 1;
pub const DEFAULT_PASSENGERS: u32 = 600;
pub const DEFAULT_DISTANCE_KM: f64 = 300.0;
pub const DEFAULT_TRAVEL_TIME_HR: f64 = 5.0;
pub const DEFAULT_TRAIN_CAPACITY: u32 = 800;

// Decision response defaults
pub const DEFAULT_SUGGESTED_SPEED_KMH: f64 = 60.0;
pub const DEFAULT_CONFIDENCE: f64 = 75.0;

/// Endpoint of the decision service when nothing else is configured
pub const DEFAULT_DECISION_ENDPOINT: &str = "http://localhost:5000/ai-suggest";

/// Upper bound on a single decision service round trip
pub const DEFAULT_DECISION_TIMEOUT_SECS: u64 = 10;

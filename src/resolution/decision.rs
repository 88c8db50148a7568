//! Wire contract of the external decision service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Decision;
use crate::config::EngineSettings;
use crate::constants::{
    DEFAULT_DISTANCE_KM, DEFAULT_PASSENGERS, DEFAULT_PRIORITY_LEVEL, DEFAULT_TRAIN_CAPACITY,
    DEFAULT_TRAVEL_TIME_HR,
};
use crate::error::DecisionError;
use crate::models::Train;

/// Fields a gateway refuses to act without, in the order they are checked
pub const REQUIRED_FIELDS: [&str; 7] = [
    "priority_train",
    "affected_train",
    "passengers",
    "distance_km",
    "travel_time_hr",
    "train_capacity",
    "is_peak_hour",
];

const fn default_level() -> i64 {
    DEFAULT_PRIORITY_LEVEL
}

const fn default_passengers() -> u32 {
    DEFAULT_PASSENGERS
}

const fn default_distance() -> f64 {
    DEFAULT_DISTANCE_KM
}

const fn default_travel_time() -> f64 {
    DEFAULT_TRAVEL_TIME_HR
}

const fn default_capacity() -> u32 {
    DEFAULT_TRAIN_CAPACITY
}

/// Normalized question put to the decision service about one conflict pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub priority_train: String,
    pub affected_train: String,

    #[serde(default = "default_level")]
    pub priority_train_level: i64,
    #[serde(default = "default_level")]
    pub affected_train_level: i64,

    #[serde(default = "default_passengers")]
    pub priority_train_passengers: u32,
    #[serde(default = "default_passengers")]
    pub affected_train_passengers: u32,
    #[serde(default = "default_distance")]
    pub priority_train_distance: f64,
    #[serde(default = "default_distance")]
    pub affected_train_distance: f64,
    #[serde(default = "default_travel_time")]
    pub priority_train_travel_time: f64,
    #[serde(default = "default_travel_time")]
    pub affected_train_travel_time: f64,
    #[serde(default = "default_capacity")]
    pub priority_train_capacity: u32,
    #[serde(default = "default_capacity")]
    pub affected_train_capacity: u32,

    pub passengers: u32,
    pub distance_km: f64,
    pub travel_time_hr: f64,
    pub train_capacity: u32,
    /// 0 or 1 on the wire
    pub is_peak_hour: u8,
    #[serde(default)]
    pub delay: i64,
}

impl DecisionRequest {
    /// Build the request for a canonical pair.
    ///
    /// Non-positive counts are treated as missing. Shared fields prefer the
    /// priority train, then the affected train, then the default.
    #[must_use]
    pub fn for_pair(priority: &Train, affected: &Train) -> Self {
        let passengers = |t: &Train| t.passengers.filter(|&p| p > 0);
        let distance = |t: &Train| t.distance_km.filter(|&d| d > 0.0);
        let travel_time = |t: &Train| t.travel_time_hr.filter(|&h| h > 0.0);
        let capacity = |t: &Train| t.train_capacity.filter(|&c| c > 0);

        let delay = [priority.delay, affected.delay]
            .into_iter()
            .find(|&d| d != 0)
            .unwrap_or(0);

        Self {
            priority_train: priority.train_id.clone(),
            affected_train: affected.train_id.clone(),
            priority_train_level: priority.priority.unwrap_or(DEFAULT_PRIORITY_LEVEL),
            affected_train_level: affected.priority.unwrap_or(DEFAULT_PRIORITY_LEVEL),
            priority_train_passengers: passengers(priority).unwrap_or(DEFAULT_PASSENGERS),
            affected_train_passengers: passengers(affected).unwrap_or(DEFAULT_PASSENGERS),
            priority_train_distance: distance(priority).unwrap_or(DEFAULT_DISTANCE_KM),
            affected_train_distance: distance(affected).unwrap_or(DEFAULT_DISTANCE_KM),
            priority_train_travel_time: travel_time(priority).unwrap_or(DEFAULT_TRAVEL_TIME_HR),
            affected_train_travel_time: travel_time(affected).unwrap_or(DEFAULT_TRAVEL_TIME_HR),
            priority_train_capacity: capacity(priority).unwrap_or(DEFAULT_TRAIN_CAPACITY),
            affected_train_capacity: capacity(affected).unwrap_or(DEFAULT_TRAIN_CAPACITY),
            passengers: passengers(priority)
                .or_else(|| passengers(affected))
                .unwrap_or(DEFAULT_PASSENGERS),
            distance_km: distance(priority)
                .or_else(|| distance(affected))
                .unwrap_or(DEFAULT_DISTANCE_KM),
            travel_time_hr: travel_time(priority)
                .or_else(|| travel_time(affected))
                .unwrap_or(DEFAULT_TRAVEL_TIME_HR),
            train_capacity: capacity(priority)
                .or_else(|| capacity(affected))
                .unwrap_or(DEFAULT_TRAIN_CAPACITY),
            is_peak_hour: u8::from(priority.is_peak_hour || affected.is_peak_hour),
            delay,
        }
    }
}

/// What the decision service answered. Every field is optional on the wire;
/// the adapter fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_train: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduced_train: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecisionResponse {
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Anything that can answer a `DecisionRequest`
#[allow(async_fn_in_trait)]
pub trait DecisionService {
    /// Ask for a recommendation.
    ///
    /// # Errors
    ///
    /// Returns a `DecisionError` if the service cannot be reached or its
    /// answer cannot be read.
    async fn suggest(&self, request: &DecisionRequest) -> Result<DecisionResponse, DecisionError>;
}

/// Decision service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpDecisionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDecisionService {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.decision_endpoint.clone())
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl DecisionService for HttpDecisionService {
    async fn suggest(&self, request: &DecisionRequest) -> Result<DecisionResponse, DecisionError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            log::error!("Decision service at {} returned {status}", self.endpoint);
            return Err(DecisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Check a raw gateway payload and read it as a `DecisionRequest`.
///
/// A field that is absent or null counts as missing. `delay` is filled in
/// with 0 when absent.
///
/// # Errors
///
/// Returns `DecisionError::MissingField` naming the first missing required
/// field, or `DecisionError::InvalidRequest` if a field has the wrong type.
pub fn validate_payload(mut payload: Value) -> Result<DecisionRequest, DecisionError> {
    for field in REQUIRED_FIELDS {
        if matches!(payload.get(field), None | Some(Value::Null)) {
            return Err(DecisionError::MissingField(field));
        }
    }

    if let Some(object) = payload.as_object_mut() {
        let delay = object.entry("delay").or_insert(Value::from(0));
        if delay.is_null() {
            *delay = Value::from(0);
        }
    }

    serde_json::from_value(payload).map_err(DecisionError::InvalidRequest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApproachDirection;
    use serde_json::json;

    fn full_payload() -> Value {
        json!({
            "priority_train": "12951",
            "affected_train": "12953",
            "passengers": 900,
            "distance_km": 400.0,
            "travel_time_hr": 6.5,
            "train_capacity": 1000,
            "is_peak_hour": 1
        })
    }

    #[test]
    fn test_request_defaults_for_sparse_trains() {
        let a = Train::new("A", "06:00", "B1", ApproachDirection::Up);
        let b = Train::new("B", "06:02", "B1", ApproachDirection::Down);
        let request = DecisionRequest::for_pair(&a, &b);
        assert_eq!(request.priority_train_level, 1);
        assert_eq!(request.affected_train_level, 1);
        assert_eq!(request.passengers, 600);
        assert_eq!(request.distance_km, 300.0);
        assert_eq!(request.travel_time_hr, 5.0);
        assert_eq!(request.train_capacity, 800);
        assert_eq!(request.is_peak_hour, 0);
        assert_eq!(request.delay, 0);
    }

    #[test]
    fn test_shared_fields_prefer_priority_then_affected() {
        let mut a = Train::new("A", "06:00", "B1", ApproachDirection::Up);
        let mut b = Train::new("B", "06:02", "B1", ApproachDirection::Down);
        a.passengers = Some(0);
        b.passengers = Some(450);
        a.distance_km = Some(120.0);
        b.distance_km = Some(700.0);
        b.delay = 7;
        b.is_peak_hour = true;

        let request = DecisionRequest::for_pair(&a, &b);
        assert_eq!(request.passengers, 450);
        assert_eq!(request.priority_train_passengers, 600);
        assert_eq!(request.affected_train_passengers, 450);
        assert_eq!(request.distance_km, 120.0);
        assert_eq!(request.delay, 7);
        assert_eq!(request.is_peak_hour, 1);
    }

    #[test]
    fn test_validate_accepts_full_payload() {
        let request = validate_payload(full_payload()).expect("payload is complete");
        assert_eq!(request.priority_train, "12951");
        assert_eq!(request.delay, 0);
        assert_eq!(request.priority_train_level, 1);
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let mut payload = full_payload();
        payload.as_object_mut().expect("object").remove("is_peak_hour");
        let err = validate_payload(payload).expect_err("is_peak_hour is required");
        assert_eq!(err.to_string(), "Missing required field: is_peak_hour");
    }

    #[test]
    fn test_validate_treats_null_as_missing() {
        let mut payload = full_payload();
        payload["passengers"] = Value::Null;
        let err = validate_payload(payload).expect_err("null passengers");
        assert!(matches!(err, DecisionError::MissingField("passengers")));
    }

    #[test]
    fn test_validate_rejects_wrong_types() {
        let mut payload = full_payload();
        payload["distance_km"] = json!("far");
        let err = validate_payload(payload).expect_err("distance_km is a string");
        assert!(matches!(err, DecisionError::InvalidRequest(_)));
        assert!(err.to_string().starts_with("Invalid decision request"));
    }

    #[test]
    fn test_http_service_uses_configured_endpoint() {
        let service = HttpDecisionService::from_settings(&EngineSettings::default());
        assert_eq!(service.endpoint(), "http://localhost:5000/ai-suggest");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let service = HttpDecisionService::new("http://127.0.0.1:1/ai-suggest");
        let a = Train::new("A", "06:00", "B1", ApproachDirection::Up);
        let b = Train::new("B", "06:02", "B1", ApproachDirection::Down);
        let result = service.suggest(&DecisionRequest::for_pair(&a, &b)).await;
        assert!(matches!(result, Err(DecisionError::Transport(_))));
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: DecisionResponse =
            serde_json::from_str(r#"{"success": true, "decision": "HOLD_TRAIN"}"#).expect("parse");
        assert!(response.success);
        assert_eq!(response.decision, Some(Decision::HoldTrain));
        assert_eq!(response.suggested_speed, None);
    }
}

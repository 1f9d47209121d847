//! Request validation for observation-window uploads.
//!
//! An upload is one JSON batch covering a fixed observation window
//! (nominally 6 seconds at 25 Hz = 150 samples). Validation is pure and
//! all-or-nothing: any invalid field rejects the whole batch before
//! anything touches storage. Errors are reported as a map from field
//! name to message so clients see exactly which field failed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum accepted length of a device identifier, in characters.
pub const MAX_DEVICE_ID_LEN: usize = 64;

/// Maximum accepted length of an SOS session identifier, in characters.
pub const MAX_SOS_ID_LEN: usize = 128;

/// One validated sensor reading within a window.
///
/// The time label is an opaque client-supplied string. The documented
/// format is `YYYY-MM-DD HH:MM:SS.mmm`, but only "non-blank" is enforced;
/// the label is stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReading {
    pub time: String,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub ppg_green: i64,
    pub ppg_ir: Option<i64>,
    pub ppg_red: Option<i64>,
}

/// A validated, normalized ingest request.
///
/// Optional fields that were absent from the upload stay `None`; nothing
/// is defaulted at this layer.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub device_id: String,
    pub sos_id: Option<String>,
    pub window_sec: Option<i64>,
    pub hz: Option<i64>,
    pub samples: Vec<SampleReading>,
}

/// Field-keyed validation errors. Serialized as-is into the 400 response
/// body, e.g. `{"samples": "At least 1 sample is required."}`.
pub type ValidationErrors = BTreeMap<String, String>;

/// Validate a decoded request body.
///
/// Returns the normalized request, or a map of field-level errors with
/// one message per failing field (first failure wins). Has no side
/// effects.
pub fn validate(body: &Value) -> Result<IngestRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let obj = match body.as_object() {
        Some(obj) => obj,
        None => {
            errors.insert(
                "non_field_errors".to_string(),
                "Invalid data. Expected a JSON object.".to_string(),
            );
            return Err(errors);
        }
    };

    let device_id = match obj.get("device_id") {
        None | Some(Value::Null) => {
            errors.insert(
                "device_id".to_string(),
                "This field is required.".to_string(),
            );
            String::new()
        }
        Some(Value::String(s)) => {
            if s.trim().is_empty() {
                errors.insert(
                    "device_id".to_string(),
                    "This field may not be blank.".to_string(),
                );
            } else if s.chars().count() > MAX_DEVICE_ID_LEN {
                errors.insert(
                    "device_id".to_string(),
                    format!(
                        "Ensure this field has no more than {} characters.",
                        MAX_DEVICE_ID_LEN
                    ),
                );
            }
            s.clone()
        }
        Some(_) => {
            errors.insert("device_id".to_string(), "Not a valid string.".to_string());
            String::new()
        }
    };

    let sos_id = match obj.get("sos_id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            if s.chars().count() > MAX_SOS_ID_LEN {
                errors.insert(
                    "sos_id".to_string(),
                    format!(
                        "Ensure this field has no more than {} characters.",
                        MAX_SOS_ID_LEN
                    ),
                );
            }
            Some(s.clone())
        }
        Some(_) => {
            errors.insert("sos_id".to_string(), "Not a valid string.".to_string());
            None
        }
    };

    let window_sec = optional_integer(obj.get("window_sec"), "window_sec", &mut errors);
    let hz = optional_integer(obj.get("hz"), "hz", &mut errors);

    let samples = match obj.get("samples") {
        None | Some(Value::Null) => {
            errors.insert("samples".to_string(), "This field is required.".to_string());
            Vec::new()
        }
        Some(Value::Array(entries)) => {
            if entries.is_empty() {
                errors.insert(
                    "samples".to_string(),
                    "At least 1 sample is required.".to_string(),
                );
                Vec::new()
            } else {
                let mut samples = Vec::with_capacity(entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    match validate_sample(i, entry) {
                        Ok(sample) => samples.push(sample),
                        Err(message) => {
                            errors.entry("samples".to_string()).or_insert(message);
                        }
                    }
                }
                samples
            }
        }
        Some(_) => {
            errors.insert(
                "samples".to_string(),
                "Expected a list of sample objects.".to_string(),
            );
            Vec::new()
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(IngestRequest {
        device_id,
        sos_id,
        window_sec,
        hz,
        samples,
    })
}

/// Validate one entry of the samples array.
fn validate_sample(i: usize, entry: &Value) -> Result<SampleReading, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| format!("sample[{i}] must be an object."))?;

    let time = match obj.get("time") {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(format!("sample[{i}].time is required.")),
    };
    if time.trim().is_empty() {
        return Err(format!("sample[{i}].time is empty."));
    }

    let axis = |field: &str| -> Result<f64, String> {
        obj.get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("sample[{i}].{field} must be a number."))
    };
    let ax = axis("ax")?;
    let ay = axis("ay")?;
    let az = axis("az")?;

    let ppg_green = obj
        .get("ppg_green")
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("sample[{i}].ppg_green must be an integer."))?;

    let optional_ppg = |field: &str| -> Result<Option<i64>, String> {
        match obj.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| format!("sample[{i}].{field} must be an integer.")),
        }
    };
    let ppg_ir = optional_ppg("ppg_ir")?;
    let ppg_red = optional_ppg("ppg_red")?;

    Ok(SampleReading {
        time,
        ax,
        ay,
        az,
        ppg_green,
        ppg_ir,
        ppg_red,
    })
}

/// Read an optional top-level integer field, recording an error for
/// non-integer values. Absent and null both mean "unset".
fn optional_integer(
    value: Option<&Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<i64> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_i64() {
            Some(n) => Some(n),
            None => {
                errors.insert(field.to_string(), "A valid integer is required.".to_string());
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(time: &str) -> Value {
        json!({
            "time": time,
            "ax": 0.186416, "ay": 0.066368, "az": -0.93696,
            "ppg_green": 37457
        })
    }

    fn valid_body() -> Value {
        json!({
            "device_id": "SM-L300_ABC123",
            "sos_id": "SOS_20260206_0001",
            "window_sec": 6,
            "hz": 25,
            "samples": [sample("2026-02-06 06:45:00.000"), sample("2026-02-06 06:45:00.040")]
        })
    }

    #[test]
    fn test_valid_request() {
        let req = validate(&valid_body()).expect("should validate");
        assert_eq!(req.device_id, "SM-L300_ABC123");
        assert_eq!(req.sos_id.as_deref(), Some("SOS_20260206_0001"));
        assert_eq!(req.window_sec, Some(6));
        assert_eq!(req.hz, Some(25));
        assert_eq!(req.samples.len(), 2);
        assert_eq!(req.samples[0].time, "2026-02-06 06:45:00.000");
        assert_eq!(req.samples[0].ppg_green, 37457);
        assert_eq!(req.samples[0].ppg_ir, None);
        assert_eq!(req.samples[0].ppg_red, None);
    }

    #[test]
    fn test_optional_fields_stay_unset() {
        let body = json!({
            "device_id": "dev-1",
            "samples": [sample("00:00:00.000")]
        });
        let req = validate(&body).expect("should validate");
        assert_eq!(req.sos_id, None);
        assert_eq!(req.window_sec, None);
        assert_eq!(req.hz, None);
    }

    #[test]
    fn test_missing_device_id() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("device_id");
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors["device_id"], "This field is required.");
    }

    #[test]
    fn test_device_id_too_long() {
        let mut body = valid_body();
        body["device_id"] = json!("x".repeat(MAX_DEVICE_ID_LEN + 1));
        let errors = validate(&body).unwrap_err();
        assert_eq!(
            errors["device_id"],
            "Ensure this field has no more than 64 characters."
        );
    }

    #[test]
    fn test_empty_samples_rejected() {
        let mut body = valid_body();
        body["samples"] = json!([]);
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors["samples"], "At least 1 sample is required.");
    }

    #[test]
    fn test_blank_time_names_failing_index() {
        let mut body = valid_body();
        body["samples"] = json!([sample("2026-02-06 06:45:00.000"), sample("   ")]);
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors["samples"], "sample[1].time is empty.");
    }

    #[test]
    fn test_missing_axis_names_failing_index() {
        let mut bad = sample("2026-02-06 06:45:00.000");
        bad.as_object_mut().unwrap().remove("ay");
        let mut body = valid_body();
        body["samples"] = json!([sample("2026-02-06 06:45:00.000"), bad]);
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors["samples"], "sample[1].ay must be a number.");
    }

    #[test]
    fn test_first_sample_failure_wins() {
        let mut body = valid_body();
        body["samples"] = json!([sample(""), sample("   ")]);
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors["samples"], "sample[0].time is empty.");
    }

    #[test]
    fn test_optional_ppg_round_trip() {
        let mut with_ppg = sample("t0");
        with_ppg["ppg_ir"] = json!(1201);
        with_ppg["ppg_red"] = json!(880);
        let mut body = valid_body();
        body["samples"] = json!([with_ppg, sample("t1")]);
        let req = validate(&body).expect("should validate");
        assert_eq!(req.samples[0].ppg_ir, Some(1201));
        assert_eq!(req.samples[0].ppg_red, Some(880));
        assert_eq!(req.samples[1].ppg_ir, None);
        assert_eq!(req.samples[1].ppg_red, None);
    }

    #[test]
    fn test_null_ppg_is_unset() {
        let mut entry = sample("t0");
        entry["ppg_ir"] = Value::Null;
        let mut body = valid_body();
        body["samples"] = json!([entry]);
        let req = validate(&body).expect("should validate");
        assert_eq!(req.samples[0].ppg_ir, None);
    }

    #[test]
    fn test_non_integer_ppg_green_rejected() {
        let mut entry = sample("t0");
        entry["ppg_green"] = json!(1.5);
        let mut body = valid_body();
        body["samples"] = json!([entry]);
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors["samples"], "sample[0].ppg_green must be an integer.");
    }

    #[test]
    fn test_non_object_body_rejected() {
        let errors = validate(&json!([1, 2, 3])).unwrap_err();
        assert!(errors.contains_key("non_field_errors"));
    }

    #[test]
    fn test_multiple_field_errors_reported_together() {
        let body = json!({ "hz": "fast" });
        let errors = validate(&body).unwrap_err();
        assert_eq!(errors["device_id"], "This field is required.");
        assert_eq!(errors["hz"], "A valid integer is required.");
        assert_eq!(errors["samples"], "This field is required.");
    }
}

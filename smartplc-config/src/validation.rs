//! Custom validation functions for configuration.
//!
//! The catalogue check runs once at startup and rejects the configuration as
//! a whole; there is no partially initialised signal set.

use std::borrow::Cow;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

use crate::signals::{tags, SignalSpec};

fn invalid(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

static TAG_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("^[A-Za-z][A-Za-z0-9_]*$").ok());
static DIRECT_ADDRESS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^%[IQM][XBWD]\d+(\.\d+)?$").ok());

fn pattern(re: &'static Lazy<Option<Regex>>) -> Result<&'static Regex, ValidationError> {
    Lazy::force(re)
        .as_ref()
        .ok_or_else(|| ValidationError::new("invalid_regex"))
}

/// Validate that a tag name is an identifier (`AI_01_TankLevel`).
pub fn validate_tag_name(name: &str) -> Result<(), ValidationError> {
    if pattern(&TAG_NAME)?.is_match(name) {
        Ok(())
    } else {
        Err(invalid("invalid_tag_name", format!("'{name}' is not a valid tag name")))
    }
}

/// Validate an IEC 61131-3 direct address such as `%IX0.3` or `%QW1`.
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    if pattern(&DIRECT_ADDRESS)?.is_match(address) {
        Ok(())
    } else {
        Err(invalid(
            "invalid_address",
            format!("'{address}' is not an IEC 61131-3 address"),
        ))
    }
}

/// Validate log level names.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate a single catalogue entry in isolation.
pub fn validate_signal(spec: &SignalSpec) -> Result<(), ValidationError> {
    validate_tag_name(&spec.name)?;
    validate_address(&spec.address)?;

    let name = &spec.name;
    if spec.kind.is_digital() {
        if spec.has_thresholds() {
            return Err(invalid(
                "digital_threshold",
                format!("{name}: thresholds are only allowed on analog signals"),
            ));
        }
        return Ok(());
    }

    let (min, max) = spec.range();
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(invalid(
            "invalid_range",
            format!("{name}: range [{min}, {max}] is empty or not finite"),
        ));
    }
    if !(min..=max).contains(&spec.initial) {
        return Err(invalid(
            "initial_out_of_range",
            format!("{name}: initial value {} outside [{min}, {max}]", spec.initial),
        ));
    }
    for threshold in [spec.warning_threshold, spec.alarm_threshold]
        .into_iter()
        .flatten()
    {
        if !(min..=max).contains(&threshold) {
            return Err(invalid(
                "threshold_out_of_range",
                format!("{name}: threshold {threshold} outside [{min}, {max}]"),
            ));
        }
    }
    if let (Some(warning), Some(alarm)) = (spec.warning_threshold, spec.alarm_threshold) {
        if warning > alarm {
            return Err(invalid(
                "threshold_order",
                format!("{name}: warning threshold {warning} above alarm threshold {alarm}"),
            ));
        }
    }
    Ok(())
}

/// Validate the full catalogue: every entry, unique names, and the
/// signals the process models bind to.
pub fn validate_catalogue(signals: &[SignalSpec]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(signals.len());
    for spec in signals {
        validate_signal(spec)?;
        if !seen.insert(spec.name.as_str()) {
            return Err(invalid(
                "duplicate_signal",
                format!("signal '{}' is defined twice", spec.name),
            ));
        }
    }

    for (name, kind) in tags::REQUIRED {
        match signals.iter().find(|s| s.name == *name) {
            None => {
                return Err(invalid(
                    "missing_signal",
                    format!("required signal '{name}' is missing"),
                ))
            }
            Some(spec) if spec.kind != *kind => {
                return Err(invalid(
                    "wrong_kind",
                    format!("signal '{name}' must be {}", kind.short_code()),
                ))
            }
            Some(_) => {}
        }
    }
    for (name, kind) in tags::OPTIONAL {
        if let Some(spec) = signals.iter().find(|s| s.name == *name) {
            if spec.kind != *kind {
                return Err(invalid(
                    "wrong_kind",
                    format!("signal '{name}' must be {}", kind.short_code()),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::default_catalogue;

    fn catalogue_with(edit: impl FnOnce(&mut Vec<SignalSpec>)) -> Vec<SignalSpec> {
        let mut catalogue = default_catalogue();
        edit(&mut catalogue);
        catalogue
    }

    fn find<'a>(catalogue: &'a mut [SignalSpec], name: &str) -> &'a mut SignalSpec {
        catalogue.iter_mut().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn default_catalogue_passes() {
        validate_catalogue(&default_catalogue()).expect("built-in catalogue is valid");
    }

    #[test]
    fn duplicate_names_fail() {
        let catalogue = catalogue_with(|c| {
            let copy = c[0].clone();
            c.push(copy);
        });
        let err = validate_catalogue(&catalogue).unwrap_err();
        assert_eq!(err.code, "duplicate_signal");
    }

    #[test]
    fn inverted_range_fails() {
        let catalogue = catalogue_with(|c| {
            let level = find(c, tags::TANK_LEVEL);
            level.range_min = Some(100.0);
            level.range_max = Some(0.0);
        });
        assert_eq!(validate_catalogue(&catalogue).unwrap_err().code, "invalid_range");
    }

    #[test]
    fn warning_above_alarm_fails() {
        let catalogue = catalogue_with(|c| {
            find(c, tags::TANK_LEVEL).warning_threshold = Some(99.0);
        });
        assert_eq!(validate_catalogue(&catalogue).unwrap_err().code, "threshold_order");
    }

    #[test]
    fn missing_model_binding_fails() {
        let catalogue = catalogue_with(|c| c.retain(|s| s.name != tags::PUMP));
        assert_eq!(validate_catalogue(&catalogue).unwrap_err().code, "missing_signal");
    }

    #[test]
    fn wrong_binding_kind_fails() {
        let catalogue = catalogue_with(|c| {
            find(c, tags::MOTOR).kind = crate::SignalKind::DigitalInput;
        });
        assert_eq!(validate_catalogue(&catalogue).unwrap_err().code, "wrong_kind");
    }

    #[test]
    fn optional_bindings_are_kind_checked() {
        let without = catalogue_with(|c| c.retain(|s| s.name != tags::MOTOR_SPEED));
        assert!(validate_catalogue(&without).is_ok());

        let wrong = catalogue_with(|c| {
            find(c, tags::MOTOR_SPEED).kind = crate::SignalKind::AnalogInput;
        });
        assert_eq!(validate_catalogue(&wrong).unwrap_err().code, "wrong_kind");
    }

    #[test]
    fn thresholds_on_digital_fail() {
        let catalogue = catalogue_with(|c| {
            find(c, tags::PUMP).alarm_threshold = Some(1.0);
        });
        assert_eq!(validate_catalogue(&catalogue).unwrap_err().code, "digital_threshold");
    }

    #[test]
    fn addresses() {
        assert!(validate_address("%IX0.0").is_ok());
        assert!(validate_address("%QW12").is_ok());
        assert!(validate_address("IX0.0").is_err());
        assert!(validate_address("%ZX0").is_err());
    }

    #[test]
    fn tag_names() {
        assert!(validate_tag_name("AI_01_TankLevel").is_ok());
        assert!(validate_tag_name("01_bad").is_err());
        assert!(validate_tag_name("has space").is_err());
    }
}

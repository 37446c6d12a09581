//! Validator/filter stage
//!
//! Per record: receive, validate (optionally inverted), then emit on pass and
//! drop or fail on failure. Every evaluated record is counted exactly once as
//! evaluated and exactly once as either valid or invalid.

use crate::error::TransformError;
use crate::schema::Schema;
use crate::transform::{Emitted, Transform};
use dataplug_format::{Counter, Record, StageKind};
use smallvec::smallvec;
use tracing::warn;

/// Policies applied by [`RecordValidator`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Negate the validation result
    pub invert: bool,
    /// Raise a terminal error on the first failing record instead of dropping it
    pub fail: bool,
    /// Fill schema defaults before validating
    pub use_defaults: bool,
    /// Strip properties forbidden by `additionalProperties: false`
    pub remove_additional: bool,
}

impl ValidatorOptions {
    /// Options used by the `filter` command
    pub fn filter(invert: bool, fail: bool) -> Self {
        Self {
            invert,
            fail,
            use_defaults: true,
            remove_additional: true,
        }
    }

    /// Options used by the `scan` command
    pub fn scan(invert: bool, fail: bool) -> Self {
        Self {
            invert,
            fail,
            use_defaults: true,
            remove_additional: false,
        }
    }
}

/// Counters updated by the validator
#[derive(Debug, Clone, Default)]
pub struct ValidationCounters {
    /// Records evaluated (`filtered` or `scanned`)
    pub evaluated: Counter,
    /// Records that passed
    pub valid: Counter,
    /// Records that failed
    pub invalid: Counter,
}

/// Transform stage that validates records against a schema
#[derive(Debug)]
pub struct RecordValidator {
    schema: Schema,
    options: ValidatorOptions,
    counters: ValidationCounters,
}

impl RecordValidator {
    /// Create a validator stage
    pub fn new(schema: Schema, options: ValidatorOptions, counters: ValidationCounters) -> Self {
        Self {
            schema,
            options,
            counters,
        }
    }

    /// Counters updated by this stage
    pub fn counters(&self) -> &ValidationCounters {
        &self.counters
    }
}

impl Transform for RecordValidator {
    fn kind(&self) -> StageKind {
        StageKind::Validator
    }

    fn apply(&mut self, mut record: Record) -> Result<Emitted, TransformError> {
        self.schema.prepare(
            &mut record,
            self.options.use_defaults,
            self.options.remove_additional,
        );

        let errors = self.schema.errors(&record);
        let passed = errors.is_empty() != self.options.invert;

        self.counters.evaluated.inc();
        if passed {
            self.counters.valid.inc();
            return Ok(smallvec![record]);
        }
        self.counters.invalid.inc();

        let details = if errors.is_empty() {
            "record is valid against the schema while validation is inverted".to_string()
        } else {
            errors.join("; ")
        };
        warn!(details = %details, "Invalid data");

        if self.options.fail {
            return Err(TransformError::Invalid { details });
        }
        Ok(Emitted::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::compile(json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "a": {"type": "integer"},
                "tag": {"type": "string", "default": "none"}
            },
            "required": ["a"]
        }))
        .unwrap()
    }

    fn run(options: ValidatorOptions, records: &[Record]) -> (Vec<Record>, ValidationCounters) {
        let counters = ValidationCounters::default();
        let mut validator = RecordValidator::new(schema(), options, counters.clone());
        let mut out = Vec::new();
        for record in records {
            out.extend(validator.apply(record.clone()).unwrap());
        }
        (out, counters)
    }

    #[test]
    fn drops_invalid_records_and_counts_both() {
        let (out, counters) = run(
            ValidatorOptions::filter(false, false),
            &[json!({"a": 1}), json!({"a": "x"})],
        );
        assert_eq!(out, vec![json!({"a": 1, "tag": "none"})]);
        assert_eq!(counters.evaluated.get(), 2);
        assert_eq!(counters.valid.get(), 1);
        assert_eq!(counters.invalid.get(), 1);
    }

    #[test]
    fn invert_emits_the_complement() {
        let records = [json!({"a": 1}), json!({"a": "x"}), json!({"b": 2})];
        let (passed, _) = run(ValidatorOptions::scan(false, false), &records);
        let (inverted, counters) = run(ValidatorOptions::scan(true, false), &records);
        assert_eq!(passed.len() + inverted.len(), records.len());
        assert_eq!(inverted.len(), 2);
        assert_eq!(counters.valid.get(), 2);
        assert_eq!(counters.invalid.get(), 1);
    }

    #[test]
    fn fail_policy_raises_with_details() {
        let counters = ValidationCounters::default();
        let mut validator = RecordValidator::new(
            schema(),
            ValidatorOptions::filter(false, true),
            counters.clone(),
        );
        assert!(validator.apply(json!({"a": 1})).is_ok());
        let err = validator.apply(json!({"a": "x"})).unwrap_err();
        match err {
            TransformError::Invalid { details } => assert!(details.contains("/a")),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(counters.invalid.get(), 1);
        assert_eq!(counters.evaluated.get(), 2);
    }

    #[test]
    fn filter_strips_additional_but_scan_keeps_it() {
        let record = json!({"a": 1, "extra": true});
        let (filtered, _) = run(ValidatorOptions::filter(false, false), &[record.clone()]);
        assert_eq!(filtered, vec![json!({"a": 1, "tag": "none"})]);

        // Without stripping the extra property makes the record invalid.
        let (scanned, counters) = run(ValidatorOptions::scan(false, false), &[record]);
        assert!(scanned.is_empty());
        assert_eq!(counters.invalid.get(), 1);
    }

    #[test]
    fn defaults_are_filled_only_when_enabled() {
        let options = ValidatorOptions {
            use_defaults: false,
            ..ValidatorOptions::filter(false, false)
        };
        let (out, _) = run(options, &[json!({"a": 1, "extra": true})]);
        assert_eq!(out, vec![json!({"a": 1})]);
    }

    proptest! {
        #[test]
        fn every_record_is_counted_once(
            values in proptest::collection::vec(prop_oneof![
                any::<i64>().prop_map(|n| json!({"a": n})),
                "[a-z]{0,4}".prop_map(|s| json!({"a": s})),
                Just(json!({})),
            ], 0..40),
            invert in any::<bool>(),
        ) {
            let (out, counters) = run(ValidatorOptions::filter(invert, false), &values);
            prop_assert_eq!(counters.evaluated.get(), values.len() as u64);
            prop_assert_eq!(counters.valid.get() + counters.invalid.get(), values.len() as u64);
            prop_assert_eq!(out.len() as u64, counters.valid.get());
        }
    }
}

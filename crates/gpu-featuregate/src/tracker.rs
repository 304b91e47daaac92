//! Feature-gate drift tracker (spec §4.10): when the external API server
//! drops fields of published resource slices for features it doesn't
//! support, this module classifies the drop, disables what it can work
//! around, and emits events exactly once per (scope, feature, device)
//! transition.

use std::collections::HashSet;

/// Features this system knows how to degrade gracefully without. Anything
/// else reported dropped is surfaced as an unknown-feature warning instead
/// (spec §4.10 "known... unknown").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    /// MIG/time-slice partitioning support. Losing this means the pool can
    /// only publish whole-card offers (spec §4.10 "ExclusiveFallback").
    Partitionable,
    TimeSlicing,
    Mps,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Partitionable => "partitionable",
            Feature::TimeSlicing => "time-slicing",
            Feature::Mps => "mps",
        }
    }

    /// Classifies a field name reported dropped by the API server. `None`
    /// means the feature is unknown to this system (spec §4.10 "unknown
    /// (surfaced as a warning)").
    pub fn classify(name: &str) -> Option<Feature> {
        match name {
            "partitionable" => Some(Feature::Partitionable),
            "time-slicing" => Some(Feature::TimeSlicing),
            "mps" => Some(Feature::Mps),
            _ => None,
        }
    }
}

/// Records an event against one object (spec §6 "Events"). The concrete
/// event-recording client (the orchestration API's event sink) is an
/// out-of-scope collaborator (spec §1); this trait is the whole interface
/// the tracker needs.
pub trait EventRecorder {
    fn record(&self, object_name: &str, reason: &str, message: &str);
}

/// Outcome of observing one round of dropped fields, for logging/tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObserveOutcome {
    pub newly_disabled: Vec<Feature>,
    pub unknown_fields: Vec<String>,
}

/// Tracks which known features are disabled per scope (a pool's
/// `namespace/name` or `name` key) and which (scope, feature, device)
/// triples have already been notified, so a repeated identical drop report
/// emits no new events (spec §4.10, scenario S6).
#[derive(Default)]
pub struct FeatureGateTracker {
    disabled: HashSet<(String, Feature)>,
    notified: HashSet<(String, Feature, String)>,
}

impl FeatureGateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff `feature` is currently disabled for `scope`.
    pub fn is_disabled(&self, scope: &str, feature: Feature) -> bool {
        self.disabled.contains(&(scope.to_string(), feature))
    }

    /// Observes one reconcile's worth of dropped-field names for `scope`,
    /// classifying each, disabling known features, and emitting events for
    /// every affected device not already notified for this (scope,
    /// feature) pair (spec §4.10: "exactly once per feature transition").
    pub fn observe(
        &mut self,
        scope: &str,
        dropped_fields: &[String],
        affected_devices: &[String],
        events: &dyn EventRecorder,
    ) -> ObserveOutcome {
        let mut outcome = ObserveOutcome::default();

        for field in dropped_fields {
            match Feature::classify(field) {
                Some(feature) => {
                    let was_disabled = self.disabled.insert((scope.to_string(), feature));
                    if was_disabled {
                        outcome.newly_disabled.push(feature);
                    }
                    for device in affected_devices {
                        let key = (scope.to_string(), feature, device.clone());
                        if self.notified.insert(key) {
                            events.record(
                                device,
                                "FeatureGateDisabled",
                                &format!("feature {:?} disabled on {scope}", feature.as_str()),
                            );
                            if feature == Feature::Partitionable {
                                events.record(
                                    device,
                                    "ExclusiveFallback",
                                    "partitioning unavailable; only whole-card offers will be published",
                                );
                            }
                        }
                    }
                }
                None => outcome.unknown_fields.push(field.clone()),
            }
        }

        outcome
    }
}

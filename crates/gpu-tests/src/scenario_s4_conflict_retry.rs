//! S4: a transient `Conflict` from the API server during a reconcile is
//! merged into a 100-microsecond requeue rather than surfaced as an error,
//! and a second pass (as the workqueue would drive) succeeds cleanly (spec
//! §8 scenarios, spec §4.1 "Result merging rules").

//! Property tests for the JSON-Patch construction and reconcile-result merge
//! rules (spec §8, testable properties 2 and 3): exercised here with
//! `proptest`-generated inputs rather than the hand-picked fixtures each
//! originating crate's unit tests use, to sweep a much larger input space.

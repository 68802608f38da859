//! Structured telemetry for contract violations.
//!
//! Instead of scattering `tracing::warn!` calls, misuse and broken invariants
//! are reported as structured [`Violation`]s that can be:
//!
//! - Logged via tracing (default)
//! - Collected programmatically for testing
//! - Sent to custom observers (metrics, crash reporting, ...)
//!
//! # Example
//!
//! ```
//! use rps_referee::telemetry::{CollectingObserver, ViolationKind};
//! use std::sync::Arc;
//!
//! let observer = Arc::new(CollectingObserver::new());
//! // ... hand the observer to SessionBuilder::with_violation_observer ...
//! assert!(!observer.has_violation(ViolationKind::Scoring));
//! ```

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Severity of a violation, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Unexpected but recoverable; the operation continued with a fallback.
    Warning,
    /// The operation was refused or degraded.
    Error,
    /// An internal invariant is broken; state may be corrupted.
    Critical,
}

impl ViolationSeverity {
    /// Returns a string representation suitable for log fields and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subsystem a violation was detected in.
///
/// # Forward Compatibility
///
/// New categories may be added; always include a wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ViolationKind {
    /// Malformed classifier samples (NaN or out-of-range confidence).
    Stabilizer,
    /// Illegal round transitions.
    RoundLifecycle,
    /// Scoring a match that is already decided.
    Scoring,
    /// Timer bookkeeping problems.
    Scheduler,
    /// Configuration constraint violated at runtime.
    Configuration,
    /// A type's runtime invariant check failed.
    ///
    /// Only checked in debug builds or with the `paranoid` feature.
    Invariant,
    /// A collaborator (camera, classifier) misbehaved.
    Collaborator,
    /// Internal logic error; indicates a bug in this crate.
    InternalError,
}

impl ViolationKind {
    /// Returns a string representation suitable for log fields and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stabilizer => "stabilizer",
            Self::RoundLifecycle => "round_lifecycle",
            Self::Scoring => "scoring",
            Self::Scheduler => "scheduler",
            Self::Configuration => "configuration",
            Self::Invariant => "invariant",
            Self::Collaborator => "collaborator",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded violation with everything needed to diagnose it.
///
/// # Example
///
/// ```
/// use rps_referee::telemetry::{Violation, ViolationKind, ViolationSeverity};
///
/// let violation = Violation::new(
///     ViolationSeverity::Error,
///     ViolationKind::Scoring,
///     "outcome applied to a finished match",
///     "scoring.rs:42",
/// )
/// .with_round(3)
/// .with_context("player_score", "2");
///
/// assert_eq!(violation.round, Some(3));
/// assert!(violation.to_string().contains("round=3"));
/// ```
#[derive(Debug, Clone, serde::Serialize)]
pub struct Violation {
    /// The severity level of this violation.
    pub severity: ViolationSeverity,
    /// The subsystem where the violation occurred.
    pub kind: ViolationKind,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Source location where the violation was detected (file:line).
    pub location: &'static str,
    /// The 1-based round number, if the violation happened inside a round.
    pub round: Option<u32>,
    /// Additional structured context as key-value pairs.
    pub context: BTreeMap<String, String>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        severity: ViolationSeverity,
        kind: ViolationKind,
        message: impl Into<String>,
        location: &'static str,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location,
            round: None,
            context: BTreeMap::new(),
        }
    }

    /// Attaches the round the violation happened in. `None` leaves it unset.
    #[must_use]
    pub fn with_round(mut self, round: impl Into<Option<u32>>) -> Self {
        self.round = round.into();
        self
    }

    /// Adds a context key-value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Serializes this violation to a JSON string.
    ///
    /// Returns `None` if serialization fails.
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Serializes this violation to a pretty-printed JSON string.
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json_pretty(&self) -> Option<String> {
        serde_json::to_string_pretty(self).ok()
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {} (at {}",
            self.severity, self.kind, self.message, self.location
        )?;
        if let Some(round) = self.round {
            write!(f, ", round={round}")?;
        }
        if !self.context.is_empty() {
            write!(f, ", context={:?}", self.context)?;
        }
        write!(f, ")")
    }
}

/// Receives violations as they are detected.
///
/// # Example
///
/// ```
/// use rps_referee::telemetry::{Violation, ViolationObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl ViolationObserver for Counter {
///     fn on_violation(&self, _violation: &Violation) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
#[cfg(feature = "sync-send")]
pub trait ViolationObserver: Send + Sync {
    /// Called when a violation is detected. Keep this quick.
    fn on_violation(&self, violation: &Violation);
}

#[cfg(not(feature = "sync-send"))]
/// Receives violations as they are detected.
pub trait ViolationObserver {
    /// Called when a violation is detected. Keep this quick.
    fn on_violation(&self, violation: &Violation);
}

/// Default observer: logs violations through `tracing`.
///
/// Warnings go to `warn!`, everything more severe to `error!`. The kind,
/// location, round and context become structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ViolationObserver for TracingObserver {
    fn on_violation(&self, violation: &Violation) {
        let Violation {
            severity,
            kind,
            message,
            location,
            round,
            context,
        } = violation;
        if *severity == ViolationSeverity::Warning {
            tracing::warn!(kind = kind.as_str(), location, ?round, ?context, "{message}");
        } else {
            tracing::error!(
                severity = severity.as_str(),
                kind = kind.as_str(),
                location,
                ?round,
                ?context,
                "{message}"
            );
        }
    }
}

/// Observer that stores every violation, for tests.
///
/// # Example
///
/// ```
/// use rps_referee::telemetry::{CollectingObserver, Violation, ViolationKind, ViolationObserver, ViolationSeverity};
///
/// let observer = CollectingObserver::new();
/// observer.on_violation(&Violation::new(
///     ViolationSeverity::Warning,
///     ViolationKind::Stabilizer,
///     "confidence is NaN",
///     "test.rs:1",
/// ));
///
/// assert_eq!(observer.len(), 1);
/// assert!(observer.has_violation(ViolationKind::Stabilizer));
/// ```
#[derive(Debug, Default)]
pub struct CollectingObserver {
    violations: Mutex<Vec<Violation>>,
}

impl CollectingObserver {
    /// Creates an observer with nothing collected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything collected so far, oldest first.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        self.violations.lock().clone()
    }

    /// Number of collected violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.lock().len()
    }

    /// True if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.lock().is_empty()
    }

    /// True if at least one violation of `kind` was collected.
    #[must_use]
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.lock().iter().any(|v| v.kind == kind)
    }

    /// The collected violations of `kind`.
    #[must_use]
    pub fn violations_of_kind(&self, kind: ViolationKind) -> Vec<Violation> {
        let violations = self.violations.lock();
        violations.iter().filter(|v| v.kind == kind).cloned().collect()
    }

    /// Forgets everything collected so far.
    pub fn clear(&self) {
        self.violations.lock().clear();
    }
}

impl ViolationObserver for CollectingObserver {
    fn on_violation(&self, violation: &Violation) {
        self.violations.lock().push(violation.clone());
    }
}

/// Counts violations per kind and forwards each one to the [`TracingObserver`].
///
/// Useful for a long-running front end that wants to surface "the classifier
/// produced 12 malformed samples this match" without keeping every record.
///
/// ```
/// use rps_referee::telemetry::{TallyObserver, Violation, ViolationKind, ViolationObserver, ViolationSeverity};
///
/// let tally = TallyObserver::new();
/// for _ in 0..2 {
///     tally.on_violation(&Violation::new(
///         ViolationSeverity::Warning,
///         ViolationKind::Stabilizer,
///         "confidence is NaN",
///         "demo.rs:1",
///     ));
/// }
/// assert_eq!(tally.count(ViolationKind::Stabilizer), 2);
/// assert_eq!(tally.total(), 2);
/// ```
#[derive(Debug, Default)]
pub struct TallyObserver {
    counts: Mutex<BTreeMap<ViolationKind, usize>>,
}

impl TallyObserver {
    /// Creates an observer with every count at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Violations of `kind` seen so far.
    #[must_use]
    pub fn count(&self, kind: ViolationKind) -> usize {
        self.counts.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Violations of any kind seen so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }

    /// Non-zero counts, ordered by kind.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ViolationKind, usize)> {
        self.counts.lock().iter().map(|(k, n)| (*k, *n)).collect()
    }
}

impl ViolationObserver for TallyObserver {
    fn on_violation(&self, violation: &Violation) {
        *self.counts.lock().entry(violation.kind).or_insert(0) += 1;
        TracingObserver.on_violation(violation);
    }
}

/// Sends `violation` to `observer`, or to the [`TracingObserver`] if there is none.
pub fn report_to_observer<O: ViolationObserver + ?Sized>(
    observer: Option<&Arc<O>>,
    violation: &Violation,
) {
    match observer {
        Some(observer) => observer.on_violation(violation),
        None => TracingObserver.on_violation(violation),
    }
}

/// Reports a violation through the [`TracingObserver`], recording file and line.
///
/// ```text
/// report_violation!(severity, kind, "message");
/// report_violation!(severity, kind, "message with {}", args);
/// ```
#[macro_export]
macro_rules! report_violation {
    ($severity:expr, $kind:expr, $msg:literal) => {{
        use $crate::telemetry::ViolationObserver as _;
        $crate::telemetry::TracingObserver.on_violation(&$crate::telemetry::Violation::new(
            $severity,
            $kind,
            $msg,
            concat!(file!(), ":", line!()),
        ));
    }};

    ($severity:expr, $kind:expr, $fmt:literal, $($arg:tt)+) => {{
        use $crate::telemetry::ViolationObserver as _;
        $crate::telemetry::TracingObserver.on_violation(&$crate::telemetry::Violation::new(
            $severity,
            $kind,
            format!($fmt, $($arg)+),
            concat!(file!(), ":", line!()),
        ));
    }};
}

/// Reports a violation through an `Option<Arc<dyn ViolationObserver>>`,
/// falling back to the [`TracingObserver`] when it is `None`.
///
/// A leading `round = expr` (a `u32` or `Option<u32>`) tags the violation with
/// the round it happened in.
///
/// ```
/// use rps_referee::{report_violation_to, telemetry::{CollectingObserver, ViolationKind, ViolationObserver, ViolationSeverity}};
/// use std::sync::Arc;
///
/// let collector = Arc::new(CollectingObserver::new());
/// let observer: Option<Arc<dyn ViolationObserver>> = Some(collector.clone());
///
/// report_violation_to!(&observer, ViolationSeverity::Warning, ViolationKind::Stabilizer,
///     "confidence {} out of range", 1.4);
/// report_violation_to!(&observer, round = 2, ViolationSeverity::Warning,
///     ViolationKind::Collaborator, "camera lost");
///
/// let violations = collector.violations();
/// assert_eq!(violations[0].round, None);
/// assert_eq!(violations[1].round, Some(2));
/// ```
#[macro_export]
macro_rules! report_violation_to {
    ($observer:expr, round = $round:expr, $severity:expr, $kind:expr, $msg:literal) => {{
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            $msg,
            concat!(file!(), ":", line!()),
        )
        .with_round($round);
        $crate::telemetry::report_to_observer($observer.as_ref(), &violation);
    }};

    ($observer:expr, round = $round:expr, $severity:expr, $kind:expr, $fmt:literal, $($arg:tt)+) => {{
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            format!($fmt, $($arg)+),
            concat!(file!(), ":", line!()),
        )
        .with_round($round);
        $crate::telemetry::report_to_observer($observer.as_ref(), &violation);
    }};

    ($observer:expr, $severity:expr, $kind:expr, $($rest:tt)+) => {
        $crate::report_violation_to!($observer, round = ::core::option::Option::<u32>::None, $severity, $kind, $($rest)+)
    };
}

/// Asserts that an observer collected no violations.
#[macro_export]
macro_rules! assert_no_violations {
    ($observer:expr) => {{
        let violations = $observer.violations();
        assert!(
            violations.is_empty(),
            "Expected no violations, but found {}:\n{:#?}",
            violations.len(),
            violations
        );
    }};
}

/// Asserts that an observer collected a violation of the given kind.
#[macro_export]
macro_rules! assert_violation {
    ($observer:expr, $kind:expr) => {{
        assert!(
            $observer.has_violation($kind),
            "Expected violation of kind {:?}, but found: {:#?}",
            $kind,
            $observer.violations()
        );
    }};
}

// ==========================================
// Runtime Invariant Checking
// ==========================================

/// Describes which invariant of which type is broken.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InvariantViolation {
    /// Name of the type whose invariant was violated.
    pub type_name: &'static str,
    /// Description of the violated invariant.
    pub invariant: String,
    /// Additional diagnostic context.
    pub details: Option<String>,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    #[must_use]
    pub fn new(type_name: &'static str, invariant: impl Into<String>) -> Self {
        Self {
            type_name,
            invariant: invariant.into(),
            details: None,
        }
    }

    /// Adds additional details to the violation.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.invariant)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Types that can verify their own internal invariants.
///
/// ```
/// use rps_referee::telemetry::{InvariantChecker, InvariantViolation};
///
/// struct Tally {
///     wins: u32,
///     rounds: u32,
/// }
///
/// impl InvariantChecker for Tally {
///     fn check_invariants(&self) -> Result<(), InvariantViolation> {
///         if self.wins > self.rounds {
///             return Err(InvariantViolation::new("Tally", "more wins than rounds"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait InvariantChecker {
    /// Returns `Ok(())` if all invariants hold, or the first broken one.
    fn check_invariants(&self) -> Result<(), InvariantViolation>;
}

/// Checks invariants in debug builds (or with `paranoid`) and reports failures
/// as critical violations. Compiles to nothing otherwise.
#[macro_export]
#[cfg(any(debug_assertions, feature = "paranoid"))]
macro_rules! debug_check_invariants {
    ($expr:expr) => {{
        use $crate::telemetry::InvariantChecker as _;
        if let Err(violation) = $expr.check_invariants() {
            $crate::report_violation!(
                $crate::telemetry::ViolationSeverity::Critical,
                $crate::telemetry::ViolationKind::Invariant,
                "{}",
                violation
            );
        }
    }};

    ($expr:expr, $context:expr) => {{
        use $crate::telemetry::InvariantChecker as _;
        if let Err(violation) = $expr.check_invariants() {
            $crate::report_violation!(
                $crate::telemetry::ViolationSeverity::Critical,
                $crate::telemetry::ViolationKind::Invariant,
                "{} [context: {}]",
                violation,
                $context
            );
        }
    }};
}

/// No-op version for release builds without `paranoid`.
#[macro_export]
#[cfg(not(any(debug_assertions, feature = "paranoid")))]
macro_rules! debug_check_invariants {
    ($expr:expr) => {{}};
    ($expr:expr, $context:expr) => {{}};
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample(kind: ViolationKind, severity: ViolationSeverity) -> Violation {
        Violation::new(severity, kind, "test", "test.rs:1")
    }

    #[test]
    fn severity_ordering() {
        assert!(ViolationSeverity::Warning < ViolationSeverity::Error);
        assert!(ViolationSeverity::Error < ViolationSeverity::Critical);
    }

    #[test]
    fn kind_labels_are_snake_case() {
        assert_eq!(ViolationKind::RoundLifecycle.as_str(), "round_lifecycle");
        assert_eq!(ViolationKind::InternalError.to_string(), "internal_error");
    }

    #[test]
    fn display_includes_round_and_context() {
        let violation = sample(ViolationKind::Scoring, ViolationSeverity::Error)
            .with_round(4)
            .with_context("cpu_score", "2");
        let text = violation.to_string();
        assert!(text.starts_with("[error/scoring] test (at test.rs:1"));
        assert!(text.contains("round=4"));
        assert!(text.contains("cpu_score"));
    }

    #[test]
    fn collecting_observer_filters_by_kind() {
        let observer = CollectingObserver::new();
        observer.on_violation(&sample(ViolationKind::Stabilizer, ViolationSeverity::Warning));
        observer.on_violation(&sample(ViolationKind::Scoring, ViolationSeverity::Error));

        assert_eq!(observer.len(), 2);
        assert_eq!(observer.violations_of_kind(ViolationKind::Scoring).len(), 1);
        assert!(!observer.has_violation(ViolationKind::Scheduler));

        observer.clear();
        assert!(observer.is_empty());
    }

    #[test]
    fn tally_counts_per_kind() {
        let tally = TallyObserver::new();
        for _ in 0..3 {
            tally.on_violation(&sample(ViolationKind::Stabilizer, ViolationSeverity::Warning));
        }
        tally.on_violation(&sample(ViolationKind::Collaborator, ViolationSeverity::Warning));

        assert_eq!(tally.count(ViolationKind::Stabilizer), 3);
        assert_eq!(tally.count(ViolationKind::Scoring), 0);
        assert_eq!(tally.total(), 4);
        assert_eq!(
            tally.snapshot(),
            [(ViolationKind::Stabilizer, 3), (ViolationKind::Collaborator, 1)]
        );
    }

    #[test]
    fn report_violation_to_uses_observer() {
        let collector = Arc::new(CollectingObserver::new());
        let observer: Option<Arc<dyn ViolationObserver>> = Some(collector.clone());

        crate::report_violation_to!(
            &observer,
            ViolationSeverity::Warning,
            ViolationKind::Collaborator,
            "camera stopped {} times",
            2
        );

        crate::report_violation_to!(
            &observer,
            round = Some(3),
            ViolationSeverity::Error,
            ViolationKind::Scoring,
            "late outcome"
        );

        let violations = collector.violations();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].message, "camera stopped 2 times");
        assert_eq!(violations[0].round, None);
        assert!(violations[0].location.contains("telemetry.rs"));
        assert_eq!(violations[1].round, Some(3));
    }

    #[test]
    fn report_violation_to_none_falls_back_to_tracing() {
        let observer: Option<Arc<dyn ViolationObserver>> = None;
        crate::report_violation_to!(
            &observer,
            ViolationSeverity::Warning,
            ViolationKind::Collaborator,
            "no observer"
        );
    }

    #[test]
    fn violation_serializes_round_and_kind() {
        let violation = sample(ViolationKind::RoundLifecycle, ViolationSeverity::Warning).with_round(1);
        let json = serde_json::to_string(&violation).unwrap();
        assert!(json.contains(r#""kind":"round_lifecycle""#));
        assert!(json.contains(r#""round":1"#));
    }

    #[test]
    fn invariant_violation_display() {
        let violation = InvariantViolation::new("MatchState", "score above threshold")
            .with_details("player_score=3");
        assert_eq!(
            violation.to_string(),
            "MatchState: score above threshold (player_score=3)"
        );
    }
}

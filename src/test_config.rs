//! Shared configuration for property-based tests.

/// Number of cases each proptest runs.
///
/// Under Miri the count drops to 5 to keep interpretation times reasonable.
///
/// ```ignore
/// use crate::test_config::case_count;
///
/// proptest! {
///     #![proptest_config(ProptestConfig {
///         cases: case_count(),
///         ..ProptestConfig::default()
///     })]
///     #[test]
///     fn my_property(value in any::<u32>()) { /* ... */ }
/// }
/// ```
#[must_use]
pub const fn case_count() -> u32 {
    if cfg!(miri) {
        5
    } else {
        256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_count_depends_on_miri() {
        if cfg!(miri) {
            assert_eq!(case_count(), 5);
        } else {
            assert_eq!(case_count(), 256);
        }
    }
}

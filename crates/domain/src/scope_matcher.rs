//! Scope matching
//!
//! Decides whether a granted scope set authorizes a required capability.
//! A requirement `resource:action` is satisfied by the verbatim scope, by
//! `resource:*`, or by the global `*`. No other wildcard form exists.

/// Check whether `granted` authorizes `required`
///
/// # Examples
///
/// ```
/// use domain::has_scope;
///
/// assert!(has_scope(&["leads:*"], "leads:delete"));
/// assert!(!has_scope(&["leads:read"], "leads:write"));
/// assert!(has_scope(&["*"], "anything:anything"));
/// ```
pub fn has_scope<S: AsRef<str>>(granted: &[S], required: &str) -> bool {
    let resource = required.split_once(':').map_or(required, |(r, _)| r);

    granted.iter().any(|scope| {
        let scope = scope.as_ref();
        scope == required
            || scope == "*"
            || scope
                .strip_suffix(":*")
                .is_some_and(|granted_resource| granted_resource == resource)
    })
}

/// Check that every candidate is an exact member of `vocabulary`
///
/// Candidates are never matched through wildcards here: a wildcard is only
/// valid if the vocabulary lists it literally.
pub fn all_valid<S: AsRef<str>>(candidates: &[S], vocabulary: &[&str]) -> bool {
    first_unknown(candidates, vocabulary).is_none()
}

/// Return the first candidate that is not in `vocabulary`
pub fn first_unknown<'a, S: AsRef<str>>(candidates: &'a [S], vocabulary: &[&str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|candidate| !vocabulary.contains(candidate))
}

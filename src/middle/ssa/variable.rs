//! SSA variable names have the form `base$version`. Temporaries have an empty
//! base (`$index$1`) and a function's declared outputs use the `ret` version
//! (`y$ret`).

/// Splits a name at its first `$` into the base name and the version part.
/// Names without a `$` are all base.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.split_once('$') {
        Some((base, version)) => (base, version),
        None => (name, ""),
    }
}

pub fn base_name(name: &str) -> &str {
    split_name(name).0
}

/// Temporaries introduced by the compiler rather than by the user.
pub fn is_anonymous(name: &str) -> bool {
    name.starts_with('$')
}

/// Externally visible function outputs, which must keep their name.
pub fn is_return_name(name: &str) -> bool {
    !is_anonymous(name) && split_name(name).1 == "ret"
}

pub fn make_name(base: &str, version: &str) -> String {
    format!("{base}${version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_named_and_temporary_variables() {
        assert_eq!(split_name("A$1"), ("A", "1"));
        assert_eq!(split_name("$index$1"), ("", "index$1"));
        assert_eq!(split_name("y$ret"), ("y", "ret"));

        assert!(is_anonymous("$index$1"));
        assert!(!is_anonymous("A$1"));

        assert!(is_return_name("y$ret"));
        assert!(!is_return_name("$ret"));
        assert!(!is_return_name("y$2"));
    }
}

//! Cell and variable name policy.
//!
//! Every name that enters the engine — a cell name at the workbook boundary
//! or a variable inside a formula — passes through the same gate: the base
//! identifier shape `[A-Za-z_][A-Za-z0-9_]*`, a caller-supplied normalizer,
//! and a caller-supplied validator applied to the normalized spelling.
//! Names are stored normalized; two names denote the same cell iff their
//! normalized forms are byte-equal.

/// Maps a raw name to its stored spelling (e.g. uppercasing).
pub type Normalizer = Box<dyn Fn(&str) -> String>;

/// Accepts or rejects a normalized name.
pub type Validator = Box<dyn Fn(&str) -> bool>;

/// Returns true if `s` has the base identifier shape: a letter or underscore
/// followed by letters, digits, or underscores.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Normalization and validation policy shared by the workbook and its
/// formulas.
///
/// The engine assumes only that `normalizer` is a function; callers should
/// keep it idempotent (`normalize(normalize(x)) == normalize(x)`) so that
/// stored names survive a second pass through the boundary.
pub struct NamePolicy {
    normalizer: Normalizer,
    validator: Validator,
}

impl NamePolicy {
    pub fn new(normalizer: Normalizer, validator: Validator) -> Self {
        Self {
            normalizer,
            validator,
        }
    }

    /// Identity normalizer, accept-everything validator.
    pub fn permissive() -> Self {
        Self::new(Box::new(|s| s.to_string()), Box::new(|_| true))
    }

    /// Apply the normalizer.
    pub fn normalize(&self, name: &str) -> String {
        (self.normalizer)(name)
    }

    /// Apply the validator to an already-normalized name.
    pub fn allows(&self, normalized: &str) -> bool {
        (self.validator)(normalized)
    }

    /// Full acceptance check for a raw name.
    ///
    /// The raw text must have the identifier shape, and the normalized form
    /// must keep that shape and pass the validator. Returns the normalized
    /// name on success.
    pub fn check(&self, raw: &str) -> Option<String> {
        if !is_identifier(raw) {
            return None;
        }
        let normalized = self.normalize(raw);
        if is_identifier(&normalized) && self.allows(&normalized) {
            Some(normalized)
        } else {
            None
        }
    }
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl std::fmt::Debug for NamePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamePolicy").finish_non_exhaustive()
    }
}

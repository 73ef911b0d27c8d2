use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// Built-in name normalizers selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    /// `UserID` → `userid`.
    #[default]
    Lower,
    /// `user_id` → `USER_ID`.
    Upper,
    /// Declared name used as-is.
    Exact,
    /// `UserId` → `user_id`.
    Snake,
}

/// Maps a field's declared name to the canonical name matched against columns.
///
/// Cheap to clone; the function itself is shared.
#[derive(Clone)]
pub struct NameNormalizer {
    label: &'static str,
    func: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl NameNormalizer {
    /// Custom normalizer. `label` only shows up in logs and `Debug` output.
    pub fn new<F>(label: &'static str, func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            label,
            func: Arc::new(func),
        }
    }

    pub fn from_case(case: NameCase) -> Self {
        match case {
            NameCase::Lower => Self::new("lower", |name| name.to_lowercase()),
            NameCase::Upper => Self::new("upper", |name| name.to_uppercase()),
            NameCase::Exact => Self::new("exact", str::to_string),
            NameCase::Snake => Self::new("snake", to_snake_case),
        }
    }

    pub fn normalize(&self, name: &str) -> String {
        (self.func)(name)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::from_case(NameCase::Lower)
    }
}

impl fmt::Debug for NameNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameNormalizer").field("label", &self.label).finish()
    }
}

/// `UserID` → `user_id`, `HTTPStatus` → `http_status`, `already_snake` unchanged.
fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p == '_' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_cases() {
        assert_eq!(NameNormalizer::from_case(NameCase::Lower).normalize("UserID"), "userid");
        assert_eq!(NameNormalizer::from_case(NameCase::Upper).normalize("user_id"), "USER_ID");
        assert_eq!(NameNormalizer::from_case(NameCase::Exact).normalize("UserID"), "UserID");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("UserId"), "user_id");
        assert_eq!(to_snake_case("HTTPStatus"), "http_status");
        assert_eq!(to_snake_case("UserID"), "user_id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("Addr2Line"), "addr2_line");
    }

    #[test]
    fn test_custom_normalizer() {
        let n = NameNormalizer::new("prefixed", |name| format!("t_{name}"));
        assert_eq!(n.normalize("id"), "t_id");
        assert_eq!(n.label(), "prefixed");
    }
}

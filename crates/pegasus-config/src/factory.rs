//! Selection of pluggable implementations by property value.
//!
//! Every pluggable subsystem declares a closed table of the implementation
//! names it knows. The property value is matched against that table,
//! case-insensitively; anything else is a [`FactoryError`].

use crate::error::FactoryError;

/// A closed registry entry: the accepted name and what it selects.
pub type Registration<K> = (&'static str, K);

/// Resolves `requested` against `registry`.
pub fn select<K: Copy>(
    module: &str,
    requested: &str,
    registry: &[Registration<K>],
) -> Result<K, FactoryError> {
    let wanted = requested.trim();
    registry
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let known: Vec<&str> = registry.iter().map(|(name, _)| *name).collect();
            FactoryError::new(
                module,
                wanted,
                format!("unknown implementation, expected one of: {}", known.join(", ")),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Backend {
        Text,
        Yaml,
    }

    const REGISTRY: &[Registration<Backend>] = &[("Text", Backend::Text), ("YAML", Backend::Yaml)];

    #[test]
    fn test_select_is_case_insensitive() {
        assert_eq!(select("catalog", "yaml", REGISTRY).unwrap(), Backend::Yaml);
        assert_eq!(select("catalog", " Text ", REGISTRY).unwrap(), Backend::Text);
    }

    #[test]
    fn test_unknown_names_list_alternatives() {
        let err = select("catalog", "Database", REGISTRY).unwrap_err();
        assert_eq!(err.implementation, "Database");
        assert!(err.to_string().contains("Text, YAML"));
    }
}

//! Environment composition for service launches.
//!
//! Every service runs with the host environment as the base layer, the
//! config-wide `[environment]` table applied over it, and the service's own
//! `environment` table applied last. Later layers win key-for-key.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

/// Composes the full launch environment from ordered override layers.
///
/// The base layer is the supervisor's own ambient environment; each entry in
/// `layers` overrides identically-named keys from everything before it.
pub fn compose(layers: &[&HashMap<String, String>]) -> HashMap<String, String> {
    merge(ambient(), layers)
}

fn merge(
    base: HashMap<String, String>,
    layers: &[&HashMap<String, String>],
) -> HashMap<String, String> {
    let mut env = base;
    for layer in layers {
        for (key, value) in layer.iter() {
            env.insert(key.clone(), value.clone());
        }
    }
    env
}

// Ambient entries that are not valid Unicode cannot be represented in the
// config model; they are skipped rather than failing the launch.
fn ambient() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Parses a `KEY=VALUE` override as passed to `--env`.
///
/// Splits on the first `=` only, so values containing `=` survive intact.
pub fn parse_entry(entry: &str) -> Result<(String, String)> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid env entry `{}`, expected KEY=VALUE", entry))?;
    if key.is_empty() {
        return Err(anyhow!("invalid env entry `{}`, empty key", entry));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn later_layers_win() {
        let base = map(&[("A", "1")]);
        let global = map(&[("A", "2"), ("B", "1")]);
        let service = map(&[("B", "2"), ("C", "1")]);
        let env = merge(base, &[&global, &service]);
        assert_eq!(env.get("A").map(String::as_str), Some("2"));
        assert_eq!(env.get("B").map(String::as_str), Some("2"));
        assert_eq!(env.get("C").map(String::as_str), Some("1"));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn base_keys_survive_when_not_overridden() {
        let base = map(&[("HOME", "/root"), ("PATH", "/bin")]);
        let service = map(&[("PATH", "/usr/bin")]);
        let env = merge(base, &[&service]);
        assert_eq!(env.get("HOME").map(String::as_str), Some("/root"));
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin"));
    }

    #[test]
    fn compose_includes_ambient() {
        // PATH is set in any reasonable test environment.
        let env = compose(&[]);
        assert!(env.contains_key("PATH"));
    }

    #[test]
    fn parse_entry_splits_on_first_equals() {
        let (key, value) = parse_entry("DATABASE_URL=postgres://u:p@host?a=b").unwrap();
        assert_eq!(key, "DATABASE_URL");
        assert_eq!(value, "postgres://u:p@host?a=b");
    }

    #[test]
    fn parse_entry_rejects_missing_separator() {
        assert!(parse_entry("NOT_AN_ENTRY").is_err());
        assert!(parse_entry("=value").is_err());
    }
}

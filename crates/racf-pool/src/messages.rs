//! Human-readable message lookup for pool failures.

/// Resolves a message key plus positional arguments into display text.
///
/// Templates use `{0}`, `{1}`, ... placeholders. Implementations backed by a
/// localized bundle can be plugged into the registry.
pub trait MessageCatalog: Send + Sync {
    fn get_message(&self, key: &str, args: &[String]) -> String;
}

/// Built-in English templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessages;

impl DefaultMessages {
    fn template(key: &str) -> Option<&'static str> {
        let template = match key {
            "RACF_POOL_EXHAUSTED" => "No connection is available for host {0}",
            "RACF_POOL_UNKNOWN_SESSION" => {
                "Session {0} was not obtained from the pool for host {1}"
            }
            "RACF_POOL_ACTIVATION_FAILED" => "Slot {0} (user {1}) could not log in: {2}",
            "RACF_POOL_TEST_FAILED" => "Connection test failed for host {0}:\n{1}",
            "RACF_POOL_RETIRED" => "The pool for host {0} has been replaced or removed",
            "RACF_POOL_GATE_CLOSED" => "The pool for host {0} is shutting down",
            _ => return None,
        };
        Some(template)
    }
}

impl MessageCatalog for DefaultMessages {
    fn get_message(&self, key: &str, args: &[String]) -> String {
        match Self::template(key) {
            Some(template) => format_template(template, args),
            None if args.is_empty() => key.to_string(),
            None => format!("{key}: {}", args.join(", ")),
        }
    }
}

/// Substitute `{n}` placeholders with `args[n]`. Unknown indices are left as-is.
pub fn format_template(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        match after[..close].parse::<usize>().ok().and_then(|i| args.get(i)) {
            Some(arg) => out.push_str(arg),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

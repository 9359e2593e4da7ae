use crate::error::Result;
use crate::policy::Policy;

/// Render the policy as pretty-printed JSON. Ordered containers underneath
/// make the output byte-identical across runs.
pub fn render(policy: &Policy) -> Result<String> {
    let mut json = serde_json::to_string_pretty(policy)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{CapabilitySet, Policy};
    use std::collections::BTreeMap;

    #[test]
    fn deterministic_output() {
        let mut caps = CapabilitySet::new();
        caps.record_module("path");
        caps.record_module("fs");
        caps.record_global("console");
        let packages = BTreeMap::from([("demo".to_string(), caps)]);
        let policy = Policy::from_packages(&packages, false);

        let first = render(&policy).unwrap();
        let second = render(&policy).unwrap();
        assert_eq!(first, second);
        // Sorted ascending regardless of insertion order.
        assert!(first.find("\"fs\"").unwrap() < first.find("\"path\"").unwrap());
    }
}

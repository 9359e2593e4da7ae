use crate::policy::diff::{PolicyDiff, SetDelta};

/// Render a policy diff as a console report, grouped by package. Additions
/// are the interesting part of a review: a dependency acquiring powers it
/// did not have before.
pub fn render_diff(diff: &PolicyDiff) -> String {
    let mut output = String::new();

    if diff.is_empty() {
        output.push_str("\n  Policy unchanged.\n\n");
        return output;
    }

    output.push_str(&format!(
        "\n  Policy changes in {} package(s):\n\n",
        diff.packages.len()
    ));

    for (name, delta) in &diff.packages {
        output.push_str(&format!("  {}\n", name));
        push_delta(&mut output, "modules", &delta.modules);
        push_delta(&mut output, "globals", &delta.globals);
        push_delta(&mut output, "module members", &delta.module_members);
        push_delta(&mut output, "global members", &delta.global_members);
        output.push('\n');
    }

    output
}

fn push_delta(output: &mut String, label: &str, delta: &SetDelta) {
    for entry in &delta.added {
        output.push_str(&format!("    + {} {}\n", label, entry));
    }
    for entry in &delta.removed {
        output.push_str(&format!("    - {} {}\n", label, entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::diff::diff;
    use crate::policy::{CapabilitySet, Policy};
    use std::collections::BTreeMap;

    #[test]
    fn unchanged_report() {
        let report = render_diff(&PolicyDiff::default());
        assert!(report.contains("unchanged"));
    }

    #[test]
    fn addition_is_listed_with_package() {
        let old = Policy::default();
        let mut caps = CapabilitySet::new();
        caps.record_module("child_process");
        let packages = BTreeMap::from([("evil-pad".to_string(), caps)]);
        let new = Policy::from_packages(&packages, false);

        let report = render_diff(&diff(&old, &new));
        assert!(report.contains("evil-pad"));
        assert!(report.contains("+ modules child_process"));
    }
}

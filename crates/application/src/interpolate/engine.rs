//! Placeholder substitution over templates and variable maps

use std::collections::HashMap;

use missio_domain::ResolvedValue;

use super::builtins::resolve_builtin;
use super::parser::find_placeholders;

/// Upper bound on [`interpolate_values`] passes. Cycles between variables
/// stabilize (and stop changing) or hit this cap rather than looping forever.
pub const MAX_PASSES: usize = 10;

/// Replaces `{{name}}` placeholders in `template` using `variables` and the
/// built-in dynamic values.
///
/// One left-to-right scan: substituted values are not re-scanned, so a value
/// that still contains a placeholder (a stabilized self-reference, say) is
/// inserted verbatim. Unknown names are left in place.
#[must_use]
pub fn interpolate(template: &str, variables: &HashMap<String, String>) -> String {
    substitute_once(template, variables, None)
}

/// Resolves placeholders inside the variable map itself.
///
/// Each value is substituted against every *other* entry in the map; a
/// variable referencing its own name keeps that placeholder untouched, which
/// breaks direct self-reference cycles. Passes repeat until the map is
/// stable or [`MAX_PASSES`] is reached.
pub fn interpolate_values(variables: &mut HashMap<String, ResolvedValue>) {
    for _ in 0..MAX_PASSES {
        let snapshot: HashMap<String, String> = variables
            .iter()
            .map(|(name, resolved)| (name.clone(), resolved.value.clone()))
            .collect();

        let mut changed = false;
        for (name, resolved) in variables.iter_mut() {
            let next = substitute_once(&resolved.value, &snapshot, Some(name.as_str()));
            if next != resolved.value {
                resolved.value = next;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
}

/// One left-to-right substitution pass. `exclude` names a variable whose own
/// placeholder must be skipped (self-reference).
fn substitute_once(
    template: &str,
    variables: &HashMap<String, String>,
    exclude: Option<&str>,
) -> String {
    let refs = find_placeholders(template);
    if refs.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;

    for reference in refs {
        out.push_str(&template[cursor..reference.span.start]);
        cursor = reference.span.end;

        if exclude == Some(reference.name.as_str()) {
            out.push_str(&template[reference.span.clone()]);
        } else if let Some(builtin) = resolve_builtin(&reference.name) {
            out.push_str(&builtin);
        } else if let Some(value) = variables.get(&reference.name) {
            out.push_str(value);
        } else {
            out.push_str(&template[reference.span.clone()]);
        }
    }

    out.push_str(&template[cursor..]);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use missio_domain::VariableSource;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn resolved(pairs: &[(&str, &str)]) -> HashMap<String, ResolvedValue> {
        pairs
            .iter()
            .map(|(k, v)| {
                (
                    (*k).to_string(),
                    ResolvedValue {
                        value: (*v).to_string(),
                        source: VariableSource::Environment,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_replaces_known_placeholders() {
        let result = interpolate(
            "{{scheme}}://{{host}}/api",
            &vars(&[("scheme", "https"), ("host", "example.com")]),
        );
        assert_eq!(result, "https://example.com/api");
    }

    #[test]
    fn test_leaves_unknown_placeholders_in_place() {
        let result = interpolate("{{known}}/{{unknown}}", &vars(&[("known", "a")]));
        assert_eq!(result, "a/{{unknown}}");
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let result = interpolate(
            "{{url}}",
            &vars(&[("url", "{{scheme}}://{{host}}"), ("scheme", "https"), ("host", "x.io")]),
        );
        assert_eq!(result, "{{scheme}}://{{host}}");
    }

    #[test]
    fn test_stabilized_self_reference_stays_verbatim() {
        // A map entry like this is legal after map interpolation; expanding
        // it again here would grow the suffix once per scan.
        let result = interpolate("{{x}}", &vars(&[("x", "{{x}}-suffix")]));
        assert_eq!(result, "{{x}}-suffix");
    }

    #[test]
    fn test_builtin_guid_expands() {
        let result = interpolate("id-{{$guid}}", &HashMap::new());
        assert!(result.starts_with("id-"));
        assert!(uuid::Uuid::parse_str(&result[3..]).is_ok());
    }

    #[test]
    fn test_map_values_resolve_against_each_other() {
        let mut map = resolved(&[("base", "https://{{host}}"), ("host", "api.example.com")]);
        interpolate_values(&mut map);
        assert_eq!(map["base"].value, "https://api.example.com");
    }

    #[test]
    fn test_self_reference_is_left_untouched() {
        let mut map = resolved(&[("path", "{{path}}/v2")]);
        interpolate_values(&mut map);
        assert_eq!(map["path"].value, "{{path}}/v2");
    }

    #[test]
    fn test_mutual_cycle_terminates() {
        let mut map = resolved(&[("a", "{{b}}"), ("b", "{{a}}")]);
        interpolate_values(&mut map);
        // The cap stops the ping-pong; both end as one of the two forms.
        assert!(map["a"].value == "{{a}}" || map["a"].value == "{{b}}");
    }

    #[test]
    fn test_long_chain_resolves_fully() {
        let mut pairs: Vec<(String, String)> = (0..15)
            .map(|i| (format!("v{i}"), format!("{{{{v{}}}}}", i + 1)))
            .collect();
        pairs.push(("v15".to_string(), "end".to_string()));
        let mut map: HashMap<String, ResolvedValue> = pairs
            .into_iter()
            .map(|(k, v)| {
                (
                    k,
                    ResolvedValue {
                        value: v,
                        source: VariableSource::Global,
                    },
                )
            })
            .collect();

        interpolate_values(&mut map);
        assert_eq!(map["v0"].value, "end");
        assert_eq!(map["v10"].value, "end");
    }
}

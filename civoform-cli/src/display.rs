//! Plan and result rendering

use std::collections::HashMap;

use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use civoform_core::effect::Effect;
use civoform_core::interpreter::{ApplyResult, EffectOutcome};
use civoform_core::plan::Plan;
use civoform_core::resource::Value;
use civoform_core::schema::{ResourceSchema, enum_variant};

const SENSITIVE: &str = "(sensitive)";
const KNOWN_AFTER_APPLY: &str = "(known after apply)";

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", display_string(s)),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let items: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            entries.sort();
            format!("{{{}}}", entries.join(", "))
        }
        Value::ResourceRef(_, _) => KNOWN_AFTER_APPLY.to_string(),
        Value::UnresolvedIdent(ident, Some(member)) => format!("{}.{}", ident, member),
        Value::UnresolvedIdent(ident, None) => ident.clone(),
    }
}

/// `civo.loadbalancer.Algorithm.round_robin` shows as `round_robin`
fn display_string(s: &str) -> &str {
    let is_namespaced_enum = s.starts_with("civo.")
        && s.split('.').count() >= 3
        && !s.contains(char::is_whitespace);
    if is_namespaced_enum {
        enum_variant(s)
    } else {
        s
    }
}

/// Value as shown to the user, masked when the schema marks it sensitive
pub fn display_value(schema: Option<&ResourceSchema>, key: &str, value: &Value) -> String {
    if schema.is_some_and(|s| s.is_sensitive(key)) {
        SENSITIVE.to_string()
    } else {
        format_value(value)
    }
}

/// User-facing attribute names, `name` first then alphabetical
fn sorted_keys(attributes: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<_> = attributes.keys().filter(|k| !k.starts_with('_')).collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", _) => std::cmp::Ordering::Less,
        (_, "name") => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

/// Lines describing what an effect does to each attribute
pub fn attribute_lines(effect: &Effect, schema: Option<&ResourceSchema>) -> Vec<String> {
    let mut lines = Vec::new();
    match effect {
        Effect::Create(resource) => {
            for key in sorted_keys(&resource.attributes) {
                let value = display_value(schema, key, &resource.attributes[key]);
                lines.push(format!("{}: {}", key, value.green()));
            }
        }
        Effect::Update { from, to, changed, .. } | Effect::Replace { from, to, changed, .. } => {
            let replace = matches!(effect, Effect::Replace { .. });
            for key in changed {
                let Some(new) = to.attributes.get(key) else {
                    continue;
                };
                let old = from.attributes.get(key);
                let marker = if replace && schema.is_some_and(|s| s.is_force_new(key)) {
                    format!(" {}", "(forces replacement)".red())
                } else {
                    String::new()
                };

                let sensitive = schema.is_some_and(|s| s.is_sensitive(key));
                if let (false, Some(Value::String(old)), Value::String(new)) = (sensitive, old, new)
                    && (old.contains('\n') || new.contains('\n'))
                {
                    lines.push(format!("{}:{}", key, marker));
                    lines.extend(text_diff(old, new).into_iter().map(|l| format!("  {}", l)));
                    continue;
                }

                let old = old
                    .map(|v| display_value(schema, key, v))
                    .unwrap_or_else(|| "(none)".to_string());
                lines.push(format!(
                    "{}: {} → {}{}",
                    key,
                    old.red(),
                    display_value(schema, key, new).green(),
                    marker
                ));
            }
        }
        Effect::Delete { identifier, .. } => {
            lines.push(format!("id: {}", identifier.red()));
        }
    }
    lines
}

/// Line diff for multi-line strings such as scripts and keys
fn text_diff(old: &str, new: &str) -> Vec<String> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .map(|change| {
            let line = change.value().trim_end_matches('\n');
            match change.tag() {
                ChangeTag::Delete => format!("{} {}", "-".red(), line.red()),
                ChangeTag::Insert => format!("{} {}", "+".green(), line.green()),
                ChangeTag::Equal => format!("  {}", line),
            }
        })
        .collect()
}

fn colored_symbol(effect: &Effect) -> colored::ColoredString {
    match effect {
        Effect::Create(_) => "+".green().bold(),
        Effect::Update { .. } => "~".yellow().bold(),
        Effect::Replace { .. } => "-/+".magenta().bold(),
        Effect::Delete { .. } => "-".red().bold(),
    }
}

pub fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        let id = effect.resource_id();
        println!(
            "  {} {}.{}",
            colored_symbol(effect),
            id.resource_type.cyan().bold(),
            id.name.bold()
        );
        for line in attribute_lines(effect, schemas.get(&id.resource_type)) {
            println!("      {}", line);
        }
        println!();
    }

    let summary = plan.summary();
    println!(
        "Plan: {} to create, {} to update, {} to replace, {} to destroy.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red()
    );
}

fn outcome_verb(effect: &Effect) -> &'static str {
    match effect {
        Effect::Create(_) => "Create",
        Effect::Update { .. } => "Update",
        Effect::Replace { .. } => "Replace",
        Effect::Delete { .. } => "Delete",
    }
}

/// One line per executed effect; effects after a stop are not listed
pub fn print_outcomes(plan: &Plan, result: &ApplyResult) {
    for (effect, applied) in plan.effects().iter().zip(&result.outcomes) {
        let label = format!("{} {}", outcome_verb(effect), applied.id);
        match &applied.result {
            Ok(EffectOutcome::Skipped { reason }) => {
                println!("  {} {} ({})", "-".normal(), label, reason)
            }
            Ok(outcome) => {
                let identifier = outcome
                    .state()
                    .and_then(|s| s.identifier.as_deref())
                    .map(|i| format!(" [{}]", i))
                    .unwrap_or_default();
                println!("  {} {}{}", "✓".green(), label, identifier.dimmed());
            }
            Err(e) => println!("  {} {} - {}", "✗".red(), label, e),
        }
    }
}

/// Schema reference for `civoform schema`
pub fn print_schema(schema: &ResourceSchema) {
    let kind = if schema.is_data_source() {
        "data source"
    } else {
        "resource"
    };
    println!(
        "{} {}",
        format!("civo.{}", schema.resource_type).cyan().bold(),
        format!("({})", kind).dimmed()
    );
    if let Some(description) = &schema.description {
        println!("  {}", description);
    }

    let mut attributes: Vec<_> = schema.attributes.values().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));
    for attr in attributes {
        let mut flags = Vec::new();
        if attr.required {
            flags.push("required");
        } else if attr.is_computed_only() {
            flags.push("computed");
        } else {
            flags.push("optional");
        }
        if attr.force_new {
            flags.push("forces replacement");
        }
        if attr.sensitive {
            flags.push("sensitive");
        }
        let default = attr
            .default
            .as_ref()
            .map(|d| format!(" = {}", format_value(d)))
            .unwrap_or_default();
        println!(
            "  {}: {}{} {}",
            attr.name.bold(),
            attr.attr_type,
            default,
            format!("[{}]", flags.join(", ")).dimmed()
        );
        if let Some(description) = &attr.description {
            println!("      {}", description.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use civoform_core::resource::{Resource, ResourceId, State};
    use civoform_core::schema::{AttributeSchema, AttributeType};

    use super::*;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("instance")
            .attribute(AttributeSchema::new("hostname", AttributeType::String).required())
            .attribute(AttributeSchema::new("script", AttributeType::String).force_new())
            .attribute(
                AttributeSchema::new("initial_password", AttributeType::String)
                    .computed()
                    .sensitive(),
            )
    }

    #[test]
    fn formats_values() {
        assert_eq!(format_value(&Value::from("web")), "\"web\"");
        assert_eq!(
            format_value(&Value::from("civo.loadbalancer.Algorithm.round_robin")),
            "\"round_robin\""
        );
        assert_eq!(format_value(&Value::from("a.b.c d")), "\"a.b.c d\"");
        assert_eq!(
            format_value(&Value::List(vec![Value::Int(1), Value::Bool(true)])),
            "[1, true]"
        );
        assert_eq!(
            format_value(&Value::ResourceRef("net".into(), "id".into())),
            "(known after apply)"
        );
    }

    #[test]
    fn masks_sensitive_values() {
        let schema = schema();
        assert_eq!(
            display_value(Some(&schema), "initial_password", &Value::from("hunter2")),
            "(sensitive)"
        );
        assert_eq!(
            display_value(Some(&schema), "hostname", &Value::from("web")),
            "\"web\""
        );
        assert_eq!(
            display_value(None, "initial_password", &Value::from("x")),
            "\"x\""
        );
    }

    #[test]
    fn create_lists_user_attributes_name_first() {
        colored::control::set_override(false);
        let resource = Resource::new("volume", "data")
            .with_attribute("size_gb", Value::Int(20))
            .with_attribute("name", Value::from("data"))
            .with_attribute("_binding", Value::from("data"));
        let lines = attribute_lines(&Effect::Create(resource), None);
        assert_eq!(lines, vec!["name: \"data\"", "size_gb: 20"]);
    }

    #[test]
    fn replace_marks_forcing_attributes_and_diffs_scripts() {
        colored::control::set_override(false);
        let id = ResourceId::new("instance", "web");
        let mut attrs = HashMap::new();
        attrs.insert("script".to_string(), Value::from("apt update\napt install nginx\n"));
        let from = State::existing(id.clone(), attrs).with_identifier("i-1");
        let to = Resource::new("instance", "web")
            .with_attribute("script", Value::from("apt update\napt install caddy\n"));
        let effect = Effect::Replace {
            id,
            from,
            to,
            changed: vec!["script".to_string()],
        };

        let lines = attribute_lines(&effect, Some(&schema()));
        assert_eq!(lines[0], "script: (forces replacement)");
        assert!(lines.contains(&"    apt update".to_string()));
        assert!(lines.contains(&"  - apt install nginx".to_string()));
        assert!(lines.contains(&"  + apt install caddy".to_string()));
    }

    #[test]
    fn update_shows_old_and_new() {
        colored::control::set_override(false);
        let id = ResourceId::new("instance", "web");
        let mut attrs = HashMap::new();
        attrs.insert("hostname".to_string(), Value::from("web-1"));
        let effect = Effect::Update {
            id: id.clone(),
            from: State::existing(id, attrs).with_identifier("i-1"),
            to: Resource::new("instance", "web").with_attribute("hostname", Value::from("web-2")),
            changed: vec!["hostname".to_string()],
        };
        let lines = attribute_lines(&effect, Some(&schema()));
        assert_eq!(lines, vec!["hostname: \"web-1\" → \"web-2\""]);
    }
}

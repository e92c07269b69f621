//! Parser - Parse .cvf files
//!
//! Convert DSL to resources using pest

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;
use std::collections::HashMap;
use std::env;

use crate::resolver::{BindingMap, undefined_references};
use crate::resource::{Resource, ResourceId, Value};

#[derive(Parser)]
#[grammar = "parser/civoform.pest"]
struct CivoformParser;

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("Invalid expression at line {line}: {message}")]
    InvalidExpression { line: usize, message: String },

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Invalid resource type: {0}")]
    InvalidResourceType(String),

    #[error("Duplicate binding: {0}")]
    DuplicateBinding(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        ParseError::Syntax(Box::new(e))
    }
}

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub attributes: HashMap<String, Value>,
}

/// Backend configuration for state storage
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend type ("local" or "s3")
    pub backend_type: String,
    /// Backend-specific attributes
    pub attributes: HashMap<String, Value>,
}

/// Parse result
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub providers: Vec<ProviderConfig>,
    pub resources: Vec<Resource>,
    pub variables: HashMap<String, Value>,
    /// Backend configuration for state storage
    pub backend: Option<BackendConfig>,
}

impl ParsedFile {
    /// Provider block for `name`, if declared
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Parse context (variable scope)
#[derive(Default)]
struct ParseContext {
    variables: HashMap<String, Value>,
    /// Names bound to resources or data sources
    resource_bindings: HashMap<String, ResourceId>,
}

impl ParseContext {
    fn is_resource_binding(&self, name: &str) -> bool {
        self.resource_bindings.contains_key(name)
    }
}

fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

/// Parse a .cvf file
pub fn parse(input: &str) -> Result<ParsedFile, ParseError> {
    let pairs = CivoformParser::parse(Rule::file, input)?;

    let mut ctx = ParseContext::default();
    let mut parsed = ParsedFile::default();

    for pair in pairs {
        if pair.as_rule() != Rule::file {
            continue;
        }
        for inner in pair.into_inner() {
            if inner.as_rule() != Rule::statement {
                continue;
            }
            for stmt in inner.into_inner() {
                match stmt.as_rule() {
                    Rule::backend_block => {
                        let (backend_type, attributes) = parse_named_block(stmt, &ctx)?;
                        parsed.backend = Some(BackendConfig {
                            backend_type,
                            attributes,
                        });
                    }
                    Rule::provider_block => {
                        let (name, attributes) = parse_named_block(stmt, &ctx)?;
                        parsed.providers.push(ProviderConfig { name, attributes });
                    }
                    Rule::let_binding => {
                        let line = line_of(&stmt);
                        let mut inner = stmt.into_inner();
                        let name = inner.next().unwrap().as_str().to_string();
                        if ctx.variables.contains_key(&name) || ctx.is_resource_binding(&name) {
                            return Err(ParseError::DuplicateBinding(name));
                        }
                        let value_pair = inner.next().unwrap();
                        match value_pair.as_rule() {
                            Rule::resource_expr | Rule::read_expr => {
                                let resource = parse_resource(value_pair, &ctx, Some(&name))?;
                                ctx.resource_bindings
                                    .insert(name.clone(), resource.id.clone());
                                parsed.resources.push(resource);
                            }
                            _ => {
                                let value = parse_expression(value_pair, &ctx).map_err(|e| {
                                    match e {
                                        ParseError::InvalidExpression { message, .. } => {
                                            ParseError::InvalidExpression { line, message }
                                        }
                                        other => other,
                                    }
                                })?;
                                ctx.variables.insert(name, value);
                            }
                        }
                    }
                    Rule::resource_expr | Rule::read_expr => {
                        let resource = parse_resource(stmt, &ctx, None)?;
                        parsed.resources.push(resource);
                    }
                    _ => {}
                }
            }
        }
    }

    parsed.variables = ctx.variables;
    Ok(parsed)
}

fn parse_named_block(
    pair: Pair<Rule>,
    ctx: &ParseContext,
) -> Result<(String, HashMap<String, Value>), ParseError> {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();

    let mut attributes = HashMap::new();
    for attr_pair in inner {
        if attr_pair.as_rule() == Rule::attribute {
            let (key, value) = parse_attribute(attr_pair, ctx)?;
            attributes.insert(key, value);
        }
    }

    Ok((name, attributes))
}

fn parse_attribute(pair: Pair<Rule>, ctx: &ParseContext) -> Result<(String, Value), ParseError> {
    let mut attr_inner = pair.into_inner();
    let key = attr_inner.next().unwrap().as_str().to_string();
    let value = parse_expression(attr_inner.next().unwrap(), ctx)?;
    Ok((key, value))
}

/// Parse `civo.type { ... }` or `read civo.type { ... }`
fn parse_resource(
    pair: Pair<Rule>,
    ctx: &ParseContext,
    binding_name: Option<&str>,
) -> Result<Resource, ParseError> {
    let line = line_of(&pair);
    let (read_only, pair) = match pair.as_rule() {
        Rule::read_expr => (true, pair.into_inner().next().unwrap()),
        _ => (false, pair),
    };

    let mut inner = pair.into_inner();
    let namespaced_type = inner.next().unwrap().as_str().to_string();

    // civo.kubernetes_cluster -> provider "civo", type "kubernetes_cluster"
    let (provider, resource_type) = namespaced_type
        .split_once('.')
        .ok_or_else(|| ParseError::InvalidResourceType(namespaced_type.clone()))?;

    let mut attributes = parse_block_contents(inner, ctx)?;

    let resource_name = match binding_name {
        Some(binding) => binding.to_string(),
        None => match attributes.get("name") {
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(ParseError::InvalidExpression {
                    line,
                    message: format!(
                        "Anonymous {} must have a 'name' attribute",
                        namespaced_type
                    ),
                });
            }
        },
    };

    attributes.insert("_provider".to_string(), Value::String(provider.to_string()));
    attributes.insert("_type".to_string(), Value::String(namespaced_type.clone()));
    if let Some(binding) = binding_name {
        attributes.insert("_binding".to_string(), Value::String(binding.to_string()));
    }

    Ok(Resource {
        id: ResourceId::new(resource_type, resource_name),
        attributes,
        read_only,
    })
}

/// Parse block contents (attributes and nested blocks)
/// Nested blocks with the same name are collected into a list
fn parse_block_contents(
    pairs: Pairs<Rule>,
    ctx: &ParseContext,
) -> Result<HashMap<String, Value>, ParseError> {
    let mut attributes: HashMap<String, Value> = HashMap::new();
    let mut nested_blocks: HashMap<String, Vec<Value>> = HashMap::new();

    for content_pair in pairs {
        if content_pair.as_rule() != Rule::block_content {
            continue;
        }
        let inner = content_pair.into_inner().next().unwrap();
        match inner.as_rule() {
            Rule::attribute => {
                let (key, value) = parse_attribute(inner, ctx)?;
                attributes.insert(key, value);
            }
            Rule::nested_block => {
                let mut block_inner = inner.into_inner();
                let block_name = block_inner.next().unwrap().as_str().to_string();
                let block_attrs = parse_block_contents(block_inner, ctx)?;

                nested_blocks
                    .entry(block_name)
                    .or_default()
                    .push(Value::Map(block_attrs));
            }
            _ => {}
        }
    }

    // Convert nested blocks to list attributes
    for (name, blocks) in nested_blocks {
        attributes.insert(name, Value::List(blocks));
    }

    Ok(attributes)
}

fn parse_expression(pair: Pair<Rule>, ctx: &ParseContext) -> Result<Value, ParseError> {
    let inner = if pair.as_rule() == Rule::expression {
        pair.into_inner().next().unwrap()
    } else {
        pair
    };
    let line = line_of(&inner);

    match inner.as_rule() {
        Rule::env_var => {
            let var_name = parse_string(inner.into_inner().next().unwrap());
            match env::var(&var_name) {
                Ok(val) => Ok(Value::String(val)),
                Err(_) => Err(ParseError::EnvVarNotSet(var_name)),
            }
        }
        Rule::list => {
            let items: Result<Vec<Value>, ParseError> = inner
                .into_inner()
                .map(|item| parse_expression(item, ctx))
                .collect();
            Ok(Value::List(items?))
        }
        Rule::map => {
            let mut map = HashMap::new();
            for entry in inner.into_inner() {
                if entry.as_rule() == Rule::map_entry {
                    let mut entry_inner = entry.into_inner();
                    let key_pair = entry_inner.next().unwrap().into_inner().next().unwrap();
                    let key = match key_pair.as_rule() {
                        Rule::string => parse_string(key_pair),
                        _ => key_pair.as_str().to_string(),
                    };
                    let value = parse_expression(entry_inner.next().unwrap(), ctx)?;
                    map.insert(key, value);
                }
            }
            Ok(Value::Map(map))
        }
        Rule::boolean => Ok(Value::Bool(inner.as_str() == "true")),
        Rule::float => inner
            .as_str()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| ParseError::InvalidExpression {
                line,
                message: format!("invalid number '{}': {}", inner.as_str(), e),
            }),
        Rule::number => inner
            .as_str()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| ParseError::InvalidExpression {
                line,
                message: format!("invalid integer '{}': {}", inner.as_str(), e),
            }),
        Rule::string => Ok(Value::String(parse_string(inner))),
        Rule::reference => {
            let full_str = inner.as_str();
            let parts: Vec<&str> = full_str.split('.').collect();

            match parts.as_slice() {
                [name] => match ctx.variables.get(*name) {
                    Some(val) => Ok(val.clone()),
                    None if ctx.is_resource_binding(name) => Err(ParseError::InvalidExpression {
                        line,
                        message: format!(
                            "'{}' is a resource, reference one of its attributes (e.g. {}.id)",
                            name, name
                        ),
                    }),
                    // Bare identifiers may be enum variants (round_robin)
                    None => Ok(Value::UnresolvedIdent(name.to_string(), None)),
                },
                [binding, attr] => {
                    if ctx.variables.contains_key(*binding) {
                        Err(ParseError::InvalidExpression {
                            line,
                            message: format!(
                                "'{}' is not a resource, cannot access attribute '{}'",
                                binding, attr
                            ),
                        })
                    } else {
                        // Validated after the whole file is parsed
                        Ok(Value::ResourceRef(binding.to_string(), attr.to_string()))
                    }
                }
                // 3+ part identifier is a namespaced enum (civo.loadbalancer.Algorithm.round_robin)
                _ => Ok(Value::String(full_str.to_string())),
            }
        }
        _ => Ok(Value::String(inner.as_str().to_string())),
    }
}

fn parse_string(pair: Pair<Rule>) -> String {
    let s = pair.as_str();
    // Remove quotes
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Resolve resource references in a ParsedFile
///
/// References to attributes written in the configuration are replaced by
/// their values. References to attributes only known after apply (such as
/// `id`) stay in place. References to unknown bindings are an error.
pub fn resolve_resource_refs(parsed: &mut ParsedFile) -> Result<(), ParseError> {
    if let Some((_, binding)) = undefined_references(&parsed.resources).into_iter().next() {
        return Err(ParseError::UndefinedVariable(binding));
    }

    let binding_map: BindingMap = parsed
        .resources
        .iter()
        .filter_map(|r| {
            r.binding()
                .map(|b| (b.to_string(), r.attributes.clone()))
        })
        .collect();

    for resource in &mut parsed.resources {
        crate::resolver::resolve_resource(resource, &binding_map);
    }

    Ok(())
}

/// Parse a .cvf file and resolve resource references
pub fn parse_and_resolve(input: &str) -> Result<ParsedFile, ParseError> {
    let mut parsed = parse(input)?;
    resolve_resource_refs(&mut parsed)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_provider_and_backend_blocks() {
        let input = r#"
            provider civo {
                region = "LON1"
            }

            backend local {
                path = "state.json"
            }
        "#;

        let result = parse(input).unwrap();
        assert_eq!(result.providers.len(), 1);
        assert_eq!(result.providers[0].name, "civo");
        assert_eq!(
            result.provider("civo").unwrap().attributes.get("region"),
            Some(&Value::String("LON1".to_string()))
        );
        let backend = result.backend.unwrap();
        assert_eq!(backend.backend_type, "local");
    }

    #[test]
    fn binding_names_the_resource() {
        let input = r#"
            let net = civo.network {
                label = "prod"
            }
        "#;

        let result = parse(input).unwrap();
        assert_eq!(result.resources.len(), 1);

        let resource = &result.resources[0];
        assert_eq!(resource.id.resource_type, "network");
        assert_eq!(resource.id.name, "net");
        assert!(!resource.read_only);
        assert_eq!(resource.binding(), Some("net"));
        assert_eq!(
            resource.attributes.get("_provider"),
            Some(&Value::String("civo".to_string()))
        );
    }

    #[test]
    fn anonymous_resource_needs_name() {
        let ok = parse(r#"civo.ssh_key { name = "me" public_key = "ssh-ed25519 AAAA" }"#).unwrap();
        assert_eq!(ok.resources[0].id.name, "me");

        let err = parse(r#"civo.network { label = "prod" }"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidExpression { .. }));
    }

    #[test]
    fn read_marks_data_source() {
        let input = r#"
            let small = read civo.size {
                filter {
                    key = "name"
                    values = ["g3.small"]
                }
                sort {
                    key = "ram_mb"
                    direction = "desc"
                }
            }
        "#;

        let result = parse(input).unwrap();
        let resource = &result.resources[0];
        assert!(resource.read_only);
        assert_eq!(resource.id.resource_type, "size");
        let filters = resource.attributes["filter"].as_list().unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(
            filters[0].as_map().unwrap().get("values"),
            Some(&Value::List(vec![Value::String("g3.small".to_string())]))
        );
    }

    #[test]
    fn nested_blocks_repeat_into_lists() {
        let input = r#"
            let fw = civo.firewall {
                name = "web"
                network_id = net.id
                ingress_rule {
                    protocol = "tcp"
                    port_range = "80"
                    cidr = ["0.0.0.0/0"]
                    action = "allow"
                }
                ingress_rule {
                    protocol = "tcp"
                    port_range = "443"
                    cidr = ["0.0.0.0/0"]
                    action = "allow"
                }
            }
        "#;

        let result = parse(input).unwrap();
        let fw = &result.resources[0];
        assert_eq!(fw.attributes["ingress_rule"].as_list().unwrap().len(), 2);
        assert_eq!(
            fw.attributes.get("network_id"),
            Some(&Value::ResourceRef("net".to_string(), "id".to_string()))
        );
    }

    #[test]
    fn parse_values() {
        let input = r#"
            # comments are ignored
            let tags = ["web", "prod"]
            let retries = 3

            let web = civo.instance {
                hostname = "web-1"  // trailing comment
                tags = tags
                count = retries
                price = 1.5
                public_ip_required = "create"
                algorithm = civo.loadbalancer.Algorithm.round_robin
                direction = round_robin
                labels = { "app" = "web", tier: "front" }
                notes = "line\n\"quoted\""
            }
        "#;

        let result = parse(input).unwrap();
        let attrs = &result.resources[0].attributes;
        assert_eq!(
            attrs["tags"],
            Value::List(vec![Value::from("web"), Value::from("prod")])
        );
        assert_eq!(attrs["count"], Value::Int(3));
        assert_eq!(attrs["price"], Value::Float(1.5));
        assert_eq!(
            attrs["algorithm"],
            Value::String("civo.loadbalancer.Algorithm.round_robin".to_string())
        );
        assert_eq!(
            attrs["direction"],
            Value::UnresolvedIdent("round_robin".to_string(), None)
        );
        assert_eq!(attrs["labels"].as_map().unwrap().len(), 2);
        assert_eq!(attrs["notes"], Value::from("line\n\"quoted\""));
    }

    #[test]
    fn parse_env_var() {
        // SAFETY: This test runs in isolation
        unsafe {
            env::set_var("CIVOFORM_TEST_TOKEN", "secret");
        }

        let input = r#"
            provider civo {
                token = env("CIVOFORM_TEST_TOKEN")
            }
        "#;

        let result = parse(input).unwrap();
        assert_eq!(
            result.providers[0].attributes.get("token"),
            Some(&Value::String("secret".to_string()))
        );

        // SAFETY: This test runs in isolation
        unsafe {
            env::remove_var("CIVOFORM_TEST_TOKEN");
        }

        let err = parse(r#"provider civo { token = env("CIVOFORM_TEST_UNSET_VAR") }"#).unwrap_err();
        assert!(matches!(err, ParseError::EnvVarNotSet(_)));
    }

    #[test]
    fn attribute_access_on_plain_variable_is_an_error() {
        let input = r#"
            let region = "LON1"
            let net = civo.network {
                label = region.name
            }
        "#;
        assert!(parse(input).is_err());
    }

    #[test]
    fn duplicate_binding_is_an_error() {
        let input = r#"
            let net = civo.network { label = "a" }
            let net = civo.network { label = "b" }
        "#;
        assert!(matches!(
            parse(input),
            Err(ParseError::DuplicateBinding(_))
        ));
    }

    #[test]
    fn resolve_known_and_deferred_references() {
        let input = r#"
            let net = civo.network {
                label = "prod"
            }
            let vol = civo.volume {
                name = net.label
                network_id = net.id
                size_gb = 10
            }
        "#;

        let result = parse_and_resolve(input).unwrap();
        let vol = &result.resources[1];
        assert_eq!(vol.attributes["name"], Value::from("prod"));
        assert_eq!(
            vol.attributes["network_id"],
            Value::ResourceRef("net".to_string(), "id".to_string())
        );
    }

    #[test]
    fn undefined_binding_is_an_error() {
        let input = r#"
            let vol = civo.volume {
                name = "data"
                network_id = nett.id
            }
        "#;
        assert!(matches!(
            parse_and_resolve(input),
            Err(ParseError::UndefinedVariable(ref b)) if b == "nett"
        ));
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(
            parse("let = civo.network {"),
            Err(ParseError::Syntax(_))
        ));
    }
}

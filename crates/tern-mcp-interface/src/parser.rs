//! Declaration source parsing
//!
//! Walks a Rust source file with `syn` and extracts marker-attributed
//! structs into the interface model. No compilation happens: the file is
//! data, and the struct bodies are type literals that lower into schema IR.
//! Enum items with unit variants become string enums; doc-comment tags
//! decorate leaves with validation constraints.

use std::collections::HashMap;
use std::path::Path;

use syn::{Attribute, Fields, Item, ItemEnum, ItemStruct, Meta, Type};
use tracing::debug;

use tern_mcp_protocol::schema::JsonSchema;
use tern_mcp_protocol::ui::UiSize;
use tern_mcp_protocol::{McpError, McpResult};
use tern_mcp_server::reconcile::to_snake_case;

use crate::model::{
    InterfaceModel, ParamDecl, PromptDecl, ResourceDecl, ServerDecl, ToolDecl, UiDecl,
};

/// Parse a declaration file from disk
pub fn parse_interface_file(path: impl AsRef<Path>) -> McpResult<InterfaceModel> {
    let source = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        McpError::configuration(format!(
            "cannot read interface file '{}': {}",
            path.as_ref().display(),
            e
        ))
    })?;
    parse_interface_source(&source)
}

/// Parse declaration source text
pub fn parse_interface_source(source: &str) -> McpResult<InterfaceModel> {
    let file = syn::parse_file(source)
        .map_err(|e| McpError::configuration(format!("interface source does not parse: {}", e)))?;

    // First pass: collect unit-variant enums as string enums
    let mut enums: HashMap<String, Vec<String>> = HashMap::new();
    for item in &file.items {
        if let Item::Enum(item_enum) = item {
            if let Some(values) = enum_values(item_enum) {
                enums.insert(item_enum.ident.to_string(), values);
            }
        }
    }

    let mut model = InterfaceModel::default();
    for item in &file.items {
        let Item::Struct(item_struct) = item else {
            continue;
        };
        for attr in &item_struct.attrs {
            if attr.path().is_ident("server") {
                model.server = Some(parse_server(item_struct, attr)?);
            } else if attr.path().is_ident("tool") {
                model.tools.push(parse_tool(item_struct, attr, &enums)?);
            } else if attr.path().is_ident("prompt") {
                model.prompts.push(parse_prompt(item_struct, attr, &enums)?);
            } else if attr.path().is_ident("resource") {
                model.resources.push(parse_resource(item_struct, attr)?);
            } else if attr.path().is_ident("ui") {
                model.uis.push(parse_ui(item_struct, attr)?);
            }
        }
    }

    debug!(
        tools = model.tools.len(),
        prompts = model.prompts.len(),
        resources = model.resources.len(),
        uis = model.uis.len(),
        "parsed interface declarations"
    );
    Ok(model)
}

fn enum_values(item: &ItemEnum) -> Option<Vec<String>> {
    let mut values = Vec::new();
    for variant in &item.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return None;
        }
        values.push(to_snake_case(&variant.ident.to_string()));
    }
    Some(values)
}

/// String-valued attribute arguments plus flags, collected generically
#[derive(Default)]
struct AttrArgs {
    strings: HashMap<String, String>,
    integers: HashMap<String, u64>,
    flags: Vec<String>,
    lists: HashMap<String, Vec<String>>,
}

impl AttrArgs {
    fn get(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.flags.iter().any(|f| f == key)
    }
}

fn parse_attr_args(attr: &Attribute) -> McpResult<AttrArgs> {
    let mut args = AttrArgs::default();
    if matches!(attr.meta, Meta::Path(_)) {
        return Ok(args);
    }

    attr.parse_nested_meta(|meta| {
        let key = meta
            .path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default();

        if meta.input.peek(syn::Token![=]) {
            let value = meta.value()?;
            if let Ok(text) = value.parse::<syn::LitStr>() {
                args.strings.insert(key, text.value());
            } else if let Ok(number) = value.parse::<syn::LitInt>() {
                args.integers.insert(key, number.base10_parse()?);
            } else {
                return Err(meta.error("expected a string or integer literal"));
            }
        } else if meta.input.peek(syn::token::Paren) {
            let mut items = Vec::new();
            meta.parse_nested_meta(|inner| {
                if let Some(ident) = inner.path.get_ident() {
                    items.push(ident.to_string());
                }
                Ok(())
            })?;
            args.lists.insert(key, items);
        } else {
            args.flags.push(key);
        }
        Ok(())
    })
    .map_err(|e| McpError::configuration(format!("bad attribute arguments: {}", e)))?;
    Ok(args)
}

fn parse_server(item: &ItemStruct, attr: &Attribute) -> McpResult<ServerDecl> {
    let args = parse_attr_args(attr)?;
    let name = args
        .get("name")
        .map(str::to_string)
        .ok_or_else(|| McpError::configuration("server declaration needs a literal name"))?;
    let version = args
        .get("version")
        .map(str::to_string)
        .ok_or_else(|| McpError::configuration("server declaration needs a literal version"))?;
    Ok(ServerDecl {
        name,
        version,
        description: args
            .get("description")
            .map(str::to_string)
            .or_else(|| doc_description(&item.attrs)),
        port: args.integers.get("port").map(|p| *p as u16),
    })
}

fn parse_tool(
    item: &ItemStruct,
    attr: &Attribute,
    enums: &HashMap<String, Vec<String>>,
) -> McpResult<ToolDecl> {
    let args = parse_attr_args(attr)?;
    let name = args
        .get("name")
        .map(str::to_string)
        .unwrap_or_else(|| to_snake_case(&item.ident.to_string()));
    Ok(ToolDecl {
        name,
        description: args
            .get("description")
            .map(str::to_string)
            .or_else(|| doc_description(&item.attrs)),
        params: parse_params(item, enums)?,
        result: args.get("result").map(result_schema).transpose()?,
    })
}

fn result_schema(token: &str) -> McpResult<JsonSchema> {
    match token {
        "string" => Ok(JsonSchema::string()),
        "number" => Ok(JsonSchema::number()),
        "integer" => Ok(JsonSchema::integer()),
        "boolean" => Ok(JsonSchema::boolean()),
        "json" => Ok(JsonSchema::any()),
        other => Err(McpError::configuration(format!(
            "unknown result shape '{}' (expected string, number, integer, boolean, or json)",
            other
        ))),
    }
}

fn parse_prompt(
    item: &ItemStruct,
    attr: &Attribute,
    enums: &HashMap<String, Vec<String>>,
) -> McpResult<PromptDecl> {
    let args = parse_attr_args(attr)?;
    let name = args
        .get("name")
        .map(str::to_string)
        .unwrap_or_else(|| to_snake_case(&item.ident.to_string()));
    let template = args.get("template").map(str::to_string);
    let dynamic = args.flag("dynamic");
    if template.is_none() && !dynamic {
        return Err(McpError::configuration(format!(
            "prompt '{}' needs a literal template or the dynamic flag",
            name
        )));
    }
    Ok(PromptDecl {
        name,
        description: args
            .get("description")
            .map(str::to_string)
            .or_else(|| doc_description(&item.attrs)),
        args: parse_params(item, enums)?,
        template,
        dynamic,
    })
}

fn parse_resource(item: &ItemStruct, attr: &Attribute) -> McpResult<ResourceDecl> {
    let args = parse_attr_args(attr)?;
    let uri = args
        .get("uri")
        .map(str::to_string)
        .ok_or_else(|| McpError::configuration("resource declaration needs a literal uri"))?;
    let dynamic = args.flag("dynamic");

    // Literal data is a JSON string in the declaration; parsing it proves
    // every leaf literal. Invalid JSON is a configuration error, not a
    // silent reclassification.
    let data = match args.get("data") {
        Some(text) => Some(serde_json::from_str(text).map_err(|e| {
            McpError::configuration(format!("resource '{}' data is not literal JSON: {}", uri, e))
        })?),
        None => None,
    };
    if data.is_none() && !dynamic {
        return Err(McpError::configuration(format!(
            "resource '{}' needs literal data or the dynamic flag",
            uri
        )));
    }

    Ok(ResourceDecl {
        name: args
            .get("name")
            .map(str::to_string)
            .unwrap_or_else(|| item.ident.to_string()),
        description: args
            .get("description")
            .map(str::to_string)
            .or_else(|| doc_description(&item.attrs)),
        mime_type: args.get("mime").map(str::to_string),
        data,
        dynamic,
        uri,
    })
}

fn parse_ui(item: &ItemStruct, attr: &Attribute) -> McpResult<UiDecl> {
    let args = parse_attr_args(attr)?;
    let uri = args
        .get("uri")
        .map(str::to_string)
        .ok_or_else(|| McpError::configuration("ui declaration needs a literal uri"))?;
    if !uri.starts_with("ui://") {
        return Err(McpError::configuration(format!(
            "ui declaration uri '{}' must start with 'ui://'",
            uri
        )));
    }
    let size = match (args.integers.get("width"), args.integers.get("height")) {
        (Some(width), Some(height)) => Some(UiSize {
            width: *width as u32,
            height: *height as u32,
        }),
        _ => None,
    };
    Ok(UiDecl {
        name: args
            .get("name")
            .map(str::to_string)
            .unwrap_or_else(|| item.ident.to_string()),
        description: args
            .get("description")
            .map(str::to_string)
            .or_else(|| doc_description(&item.attrs)),
        source: args.get("source").map(str::to_string),
        tools: args.lists.get("tools").cloned().unwrap_or_default(),
        css: args.get("css").map(str::to_string),
        size,
        uri,
    })
}

/// Lower a struct's fields into ordered parameter declarations
fn parse_params(
    item: &ItemStruct,
    enums: &HashMap<String, Vec<String>>,
) -> McpResult<Vec<ParamDecl>> {
    let Fields::Named(fields) = &item.fields else {
        return Ok(Vec::new());
    };

    let mut params = Vec::new();
    for field in &fields.named {
        let name = field
            .ident
            .as_ref()
            .map(|i| i.to_string())
            .unwrap_or_default();
        let (inner, required) = unwrap_option(&field.ty);
        let docs = FieldDocs::parse(&field.attrs);
        let schema = docs.apply(type_to_schema(inner, enums));
        schema.check_patterns().map_err(|violation| {
            McpError::configuration(format!("field '{}': {}", name, violation))
        })?;
        params.push(ParamDecl {
            schema,
            required,
            description: docs.description,
            name,
        });
    }
    Ok(params)
}

/// Peel `Option<T>`; the field is optional iff it was wrapped
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let syn::PathArguments::AngleBracketed(generics) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = generics.args.first() {
                        return (inner, false);
                    }
                }
            }
        }
    }
    (ty, true)
}

/// Map a declared type to schema IR
fn type_to_schema(ty: &Type, enums: &HashMap<String, Vec<String>>) -> JsonSchema {
    match ty {
        Type::Path(type_path) => {
            let segment = match type_path.path.segments.last() {
                Some(segment) => segment,
                None => return JsonSchema::string(),
            };
            match segment.ident.to_string().as_str() {
                "String" | "str" => JsonSchema::string(),
                "f64" | "f32" => JsonSchema::number(),
                "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "isize"
                | "usize" => JsonSchema::integer(),
                "bool" => JsonSchema::boolean(),
                "Value" => JsonSchema::any(),
                "Vec" => {
                    if let syn::PathArguments::AngleBracketed(generics) = &segment.arguments {
                        if let Some(syn::GenericArgument::Type(inner)) = generics.args.first() {
                            return JsonSchema::array(type_to_schema(inner, enums));
                        }
                    }
                    JsonSchema::array(JsonSchema::any())
                }
                other => match enums.get(other) {
                    Some(values) => JsonSchema::string_enum(values.clone()),
                    None => JsonSchema::string(),
                },
            }
        }
        Type::Reference(reference) => type_to_schema(&reference.elem, enums),
        _ => JsonSchema::string(),
    }
}

/// Doc-comment text split into description lines and constraint tags
struct FieldDocs {
    description: Option<String>,
    tags: Vec<(String, String)>,
}

impl FieldDocs {
    fn parse(attrs: &[Attribute]) -> Self {
        let mut description_lines = Vec::new();
        let mut tags = Vec::new();
        for line in doc_lines(attrs) {
            let line = line.trim();
            if let Some(tag) = line.strip_prefix('@') {
                let (name, value) = tag.split_once(' ').unwrap_or((tag, ""));
                tags.push((name.to_string(), value.trim().to_string()));
            } else if !line.is_empty() {
                description_lines.push(line.to_string());
            }
        }
        Self {
            description: if description_lines.is_empty() {
                None
            } else {
                Some(description_lines.join(" "))
            },
            tags,
        }
    }

    /// Decorate a schema leaf with the parsed constraint tags
    fn apply(&self, mut schema: JsonSchema) -> JsonSchema {
        for (name, value) in &self.tags {
            schema = match name.as_str() {
                "minLength" => match value.parse() {
                    Ok(n) => schema.with_min_length(n),
                    Err(_) => schema,
                },
                "maxLength" => match value.parse() {
                    Ok(n) => schema.with_max_length(n),
                    Err(_) => schema,
                },
                "pattern" => schema.with_pattern(value.clone()),
                "format" => schema.with_format(value.clone()),
                "min" => match value.parse() {
                    Ok(n) => schema.with_minimum(n),
                    Err(_) => schema,
                },
                "max" => match value.parse() {
                    Ok(n) => schema.with_maximum(n),
                    Err(_) => schema,
                },
                "int" => match schema {
                    JsonSchema::Number {
                        description,
                        minimum,
                        maximum,
                    } => JsonSchema::Integer {
                        description,
                        minimum: minimum.map(|m| m as i64),
                        maximum: maximum.map(|m| m as i64),
                    },
                    other => other,
                },
                "minItems" => match value.parse() {
                    Ok(n) => schema.with_min_items(n),
                    Err(_) => schema,
                },
                "maxItems" => match value.parse() {
                    Ok(n) => schema.with_max_items(n),
                    Err(_) => schema,
                },
                _ => schema,
            };
        }
        if let Some(description) = &self.description {
            schema = schema.with_description(description.clone());
        }
        schema
    }
}

fn doc_lines(attrs: &[Attribute]) -> Vec<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let Meta::NameValue(name_value) = &attr.meta {
            if let syn::Expr::Lit(expr_lit) = &name_value.value {
                if let syn::Lit::Str(text) = &expr_lit.lit {
                    lines.push(text.value());
                }
            }
        }
    }
    lines
}

fn doc_description(attrs: &[Attribute]) -> Option<String> {
    FieldDocs::parse(attrs).description
}

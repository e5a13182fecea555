//! # Interface Frontend
//!
//! The declarative authoring style: servers, tools, prompts, resources, and
//! UI resources are declared as plain Rust structs carrying marker
//! attributes, and the declaration source file is parsed (not compiled)
//! into schema IR. Doc-comment tags (`@minLength`, `@pattern`, `@min`,
//! `@int`, ...) decorate schema leaves with validation constraints.
//!
//! ```text
//! /// Current temperature for a location.
//! #[tool(name = "get_temperature", result = "number")]
//! struct GetTemperature {
//!     /// City or airport code.
//!     /// @minLength 1
//!     location: String,
//!     units: Option<Units>,
//! }
//! ```
//!
//! Parsing produces an [`InterfaceModel`]: entries in IR form plus the
//! method bindings the handler set must satisfy (tool names always; the
//! camelCase of the name for dynamic prompts; the URI itself for dynamic
//! resources). Lowering resolves those bindings through the name
//! reconciler and fails start with one composed error naming every miss.

pub mod collector;
pub mod loader;
pub mod model;
pub mod parser;

pub use collector::{CollectedServer, MethodRegistry, RuntimeParam, ServerManifest, collect};
pub use loader::lower_model;
pub use model::{
    Binding, BindingKind, InterfaceModel, ParamDecl, PromptDecl, ResourceDecl, ServerDecl,
    ToolDecl, UiDecl,
};
pub use parser::{parse_interface_file, parse_interface_source};

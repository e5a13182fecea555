//! # Runtime Builders and the Functional Frontend
//!
//! Two of the four authoring styles live here:
//!
//! - **Programmatic builders** ([`ToolBuilder`], [`PromptBuilder`],
//!   [`ResourceBuilder`], [`UiBuilder`]): construct kernel entries at
//!   runtime without macros or source parsing.
//! - **Functional config** ([`McpConfig`] + [`HandlerMap`] +
//!   [`load_config`]): a fully-deserializable config object whose entries
//!   are translated one-for-one into registry calls, with dynamic entries
//!   bound to named handlers through the name reconciler.

pub mod config;
pub mod prompt;
pub mod resource;
pub mod tool;
pub mod ui;

pub use config::{
    HandlerMap, McpConfig, PromptConfig, ResourceConfig, ToolConfig, UiConfig, load_config,
};
pub use prompt::{BuiltPrompt, PromptBuilder};
pub use resource::{BuiltResource, ResourceBuilder};
pub use tool::ToolBuilder;
pub use ui::UiBuilder;

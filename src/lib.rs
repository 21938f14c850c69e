//! A Mustache template engine whose compiled templates are trees walked by
//! visitors.
//!
//! Templates parse into a tree of [`Node`]s. Rendering, dependency collection
//! and validation are each a [`Visitor`] over that tree, and the tree itself
//! never changes after parsing, so one [`Template`] can be rendered by many
//! threads at once.
//!
//! ```
//! use stachetree::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! engine
//!     .add_template("layout", "<title>{{$title}}Default{{/title}}</title>")
//!     .unwrap();
//! engine
//!     .add_template("page", "{{<layout}}{{$title}}{{name}}{{/title}}{{/layout}}")
//!     .unwrap();
//!
//! let data = Value::map([("name", "Home")]);
//! assert_eq!(engine.render("page", &data).unwrap(), "<title>Home</title>");
//! ```

mod ast;
mod collect;
mod config;
mod context;
mod engine;
mod error;
mod escape;
mod inheritance;
mod loader;
mod parser;
mod render;
mod template;
mod tracing_macros;
mod validate;
mod value;
mod visitor;

// Crate-level imports to make convenient imports for the rest of the library.
pub(crate) use tracing_macros::{debug, trace};

// Public exports.
pub use ast::{
    Delimiters, InheritablePartialNode, InheritableSection, Node, PartialNode, SectionTag,
    TextNode, VariableTag,
};
pub use collect::{Dependencies, DependencyCollector};
pub use config::{InvertedLambda, RenderConfig};
pub use context::ContextStack;
pub use engine::Engine;
pub use error::{ParseError, ParseErrorKind, StacheError, StacheResult};
pub use escape::escape_html;
pub use inheritance::{InclusionPath, OverrideScope, OverrideScopes};
pub use loader::{NoPartials, PartialLoader};
pub use render::{CancelFlag, RenderVisitor};
pub use template::Template;
pub use validate::Validator;
pub use value::{BoxError, Lambda, LambdaResult, Shape, Value, ValueKind};
pub use visitor::{Visitor, accept_all};

//! Language objects for federated queries.
//!
//! Commands arrive as SQL text, become a tree of typed language objects, are
//! adapted to a source and finally rendered in that source's terms:
//!
//! ```text
//! SQL text
//!       ↓
//! Frontend                (frontend.rs)
//!       ↓
//! Language objects        (types.rs, node.rs)
//!       ↓
//! Metadata binding        (metadata.rs)
//!       ↓
//! Rewrite passes          (rewrite.rs)
//!       ↓
//! Unparser / translator   (unparser.rs, crate::translators)
//! ```
//!
//! Read-only traversal goes through [`Visitor`]: every object dispatches to
//! the method for its own kind. [`HierarchyVisitor`] adds the default
//! depth-first walk, [`DelegatingHierarchyVisitor`] wraps it with pre and
//! post callbacks, and the `collect_*` functions gather objects of one kind.
pub mod collector;
pub mod delegating;
pub mod frontend;
pub mod hierarchy;
pub mod metadata;
pub mod node;
pub mod rewrite;
pub mod types;
pub mod unparser;
pub mod visitor;


pub use collector::{
    collect_elements, collect_elements_at_this_level, collect_groups,
    collect_groups_used_by_elements, collect_objects, collect_objects_with, CollectorVisitor,
};
pub use delegating::DelegatingHierarchyVisitor;
pub use frontend::{parse_condition, parse_expression, parse_single, parse_sql};
pub use hierarchy::HierarchyVisitor;
pub use metadata::{Catalog, CatalogRecord, MetadataRecord, MetadataRef};
pub use node::{LanguageObject, Node, NodeKind, NodeType};
pub use rewrite::{
    FunctionModifiers, NormalizeSetQueries, Rewrite, RewritePass, RewritePipeline, Rewriter,
};
pub use types::*;
pub use unparser::{
    render, render_normalized, render_normalized_with, render_with, DefaultDialect, SqlDialect,
    SqlUnparser,
};
pub use visitor::Visitor;

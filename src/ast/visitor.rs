//! The visitor protocol.
//!
//! [`Visitor`] has one method per concrete node kind, each a no-op by default.
//! A node's [`accept`](LanguageObject::accept) calls exactly the method for its
//! own kind. Implement `Visitor` directly to react to individual nodes without
//! traversing; implement [`HierarchyVisitor`](super::hierarchy::HierarchyVisitor)
//! to get structural recursion for free.

use super::node::{for_each_node_kind, LanguageObject};
use super::types::*;

macro_rules! visitor_trait {
    ($($ty:ident => $visit:ident, $walk:ident;)*) => {
        /// Base visitor. Every case defaults to doing nothing.
        pub trait Visitor<'ast> {
            $(
                fn $visit(&mut self, node: &'ast $ty) {
                    let _ = node;
                }
            )*
        }
    };
}

for_each_node_kind!(visitor_trait);

/// Visit `node` if present.
pub fn visit_node<'ast, V, N>(visitor: &mut V, node: Option<&'ast N>)
where
    V: Visitor<'ast> + ?Sized,
    N: LanguageObject + ?Sized,
{
    if let Some(node) = node {
        node.accept(visitor);
    }
}

/// Visit every node of `nodes` in order.
pub fn visit_nodes<'ast, V, N>(visitor: &mut V, nodes: &'ast [N])
where
    V: Visitor<'ast> + ?Sized,
    N: LanguageObject,
{
    for node in nodes {
        node.accept(visitor);
    }
}

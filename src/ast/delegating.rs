//! Pre/post composition around the structural traversal.

use super::hierarchy::{self as walk, HierarchyVisitor};
use super::node::{for_each_node_kind, LanguageObject};
use super::types::*;
use super::visitor::Visitor;
use crate::error::{LanguageError, Result};

/// Runs an optional `pre` visitor on entering each node and an optional `post`
/// visitor on leaving it, with the default structural recursion in between.
pub struct DelegatingHierarchyVisitor<'v, 'ast> {
    pre: Option<&'v mut dyn Visitor<'ast>>,
    post: Option<&'v mut dyn Visitor<'ast>>,
    descend_into_subqueries: bool,
}

impl<'v, 'ast> DelegatingHierarchyVisitor<'v, 'ast> {
    /// Fails with [`LanguageError::InvalidArgument`] when both delegates are
    /// absent.
    pub fn new(
        pre: Option<&'v mut dyn Visitor<'ast>>,
        post: Option<&'v mut dyn Visitor<'ast>>,
    ) -> Result<Self> {
        if pre.is_none() && post.is_none() {
            return Err(LanguageError::InvalidArgument(
                "at least one of the pre or post visitors must be supplied".to_string(),
            ));
        }
        Ok(Self {
            pre,
            post,
            descend_into_subqueries: true,
        })
    }

    /// A composition with only an enter visitor.
    pub fn pre(visitor: &'v mut dyn Visitor<'ast>) -> Self {
        Self {
            pre: Some(visitor),
            post: None,
            descend_into_subqueries: true,
        }
    }

    /// A composition with only an exit visitor.
    pub fn post(visitor: &'v mut dyn Visitor<'ast>) -> Self {
        Self {
            pre: None,
            post: Some(visitor),
            descend_into_subqueries: true,
        }
    }

    pub fn with_descend_into_subqueries(mut self, descend: bool) -> Self {
        self.descend_into_subqueries = descend;
        self
    }

    /// Visit `root` and all its descendants with `visitor`, parents first.
    pub fn visit_pre_order<N>(visitor: &'v mut dyn Visitor<'ast>, root: &'ast N)
    where
        N: LanguageObject + ?Sized,
    {
        root.accept(&mut Self::pre(visitor));
    }

    /// Visit `root` and all its descendants with `visitor`, children first.
    pub fn visit_post_order<N>(visitor: &'v mut dyn Visitor<'ast>, root: &'ast N)
    where
        N: LanguageObject + ?Sized,
    {
        root.accept(&mut Self::post(visitor));
    }
}

macro_rules! delegating_impl {
    ($($ty:ident => $visit:ident, $walk:ident;)*) => {
        impl<'v, 'ast> HierarchyVisitor<'ast> for DelegatingHierarchyVisitor<'v, 'ast> {
            fn descend_into_subqueries(&self) -> bool {
                self.descend_into_subqueries
            }

            $(
                fn $visit(&mut self, node: &'ast $ty) {
                    if let Some(pre) = self.pre.as_deref_mut() {
                        pre.$visit(node);
                    }
                    walk::$walk(self, node);
                    if let Some(post) = self.post.as_deref_mut() {
                        post.$visit(node);
                    }
                }
            )*
        }
    };
}

for_each_node_kind!(delegating_impl);

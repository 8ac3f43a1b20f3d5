//! Double dispatch for language objects.
//!
//! [`for_each_node_kind!`] is the single list of concrete node kinds. Every
//! total dispatcher in the crate (the visitor traits, the walking defaults,
//! pre/post composition and the collector) is generated from it, so a kind
//! added here without a matching visit method and walk function fails to
//! compile.

use std::fmt;

use super::types::*;
use super::visitor::Visitor;

/// Invokes `$callback!` with one `Type => visit_method, walk_fn;` entry per
/// concrete node kind.
macro_rules! for_each_node_kind {
    ($callback:ident) => {
        $callback! {
            ColumnReference => visit_column_reference, walk_column_reference;
            Literal => visit_literal, walk_literal;
            Parameter => visit_parameter, walk_parameter;
            Function => visit_function, walk_function;
            AggregateFunction => visit_aggregate_function, walk_aggregate_function;
            WindowFunction => visit_window_function, walk_window_function;
            WindowSpecification => visit_window_specification, walk_window_specification;
            ScalarSubquery => visit_scalar_subquery, walk_scalar_subquery;
            SearchedCase => visit_searched_case, walk_searched_case;
            SearchedWhenClause => visit_searched_when_clause, walk_searched_when_clause;
            Comparison => visit_comparison, walk_comparison;
            AndOr => visit_and_or, walk_and_or;
            Not => visit_not, walk_not;
            IsNull => visit_is_null, walk_is_null;
            Like => visit_like, walk_like;
            In => visit_in, walk_in;
            SubqueryIn => visit_subquery_in, walk_subquery_in;
            Exists => visit_exists, walk_exists;
            SubqueryComparison => visit_subquery_comparison, walk_subquery_comparison;
            NamedTable => visit_named_table, walk_named_table;
            DerivedTable => visit_derived_table, walk_derived_table;
            Join => visit_join, walk_join;
            DerivedColumn => visit_derived_column, walk_derived_column;
            GroupBy => visit_group_by, walk_group_by;
            OrderBy => visit_order_by, walk_order_by;
            SortSpecification => visit_sort_specification, walk_sort_specification;
            Limit => visit_limit, walk_limit;
            With => visit_with, walk_with;
            WithItem => visit_with_item, walk_with_item;
            Select => visit_select, walk_select;
            SetQuery => visit_set_query, walk_set_query;
            Insert => visit_insert, walk_insert;
            ExpressionValueSource => visit_expression_value_source, walk_expression_value_source;
            IteratorValueSource => visit_iterator_value_source, walk_iterator_value_source;
            Update => visit_update, walk_update;
            SetClause => visit_set_clause, walk_set_clause;
            Delete => visit_delete, walk_delete;
            BatchedUpdates => visit_batched_updates, walk_batched_updates;
            Call => visit_call, walk_call;
            Argument => visit_argument, walk_argument;
        }
    };
}

pub(crate) use for_each_node_kind;

/// A node that can be visited.
pub trait LanguageObject {
    /// Invoke the visitor's case for this node's concrete kind.
    fn accept<'ast, V: Visitor<'ast> + ?Sized>(&'ast self, visitor: &mut V);

    /// Borrow this node as a [`Node`]. Abstract roles return their variant.
    fn as_node(&self) -> Node<'_>;

    fn kind(&self) -> NodeKind {
        self.as_node().kind()
    }
}

/// A concrete node kind, recoverable from a [`Node`].
pub trait NodeType: LanguageObject + Sized {
    const KIND: NodeKind;

    fn downcast<'a>(node: Node<'a>) -> Option<&'a Self>;
}

macro_rules! node_enums {
    ($($ty:ident => $visit:ident, $walk:ident;)*) => {
        /// A borrowed reference to any concrete node.
        #[derive(Debug, Clone, Copy)]
        pub enum Node<'ast> {
            $($ty(&'ast $ty),)*
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($ty,)*
        }

        impl NodeKind {
            pub fn name(self) -> &'static str {
                match self {
                    $(NodeKind::$ty => stringify!($ty),)*
                }
            }
        }

        impl<'ast> Node<'ast> {
            pub fn kind(&self) -> NodeKind {
                match self {
                    $(Node::$ty(_) => NodeKind::$ty,)*
                }
            }

            /// Dispatch the referenced node to `visitor`.
            pub fn dispatch<V: Visitor<'ast> + ?Sized>(self, visitor: &mut V) {
                match self {
                    $(Node::$ty(node) => visitor.$visit(node),)*
                }
            }
        }

        $(
            impl LanguageObject for $ty {
                fn accept<'ast, V: Visitor<'ast> + ?Sized>(&'ast self, visitor: &mut V) {
                    visitor.$visit(self)
                }

                fn as_node(&self) -> Node<'_> {
                    Node::$ty(self)
                }
            }

            impl NodeType for $ty {
                const KIND: NodeKind = NodeKind::$ty;

                fn downcast<'a>(node: Node<'a>) -> Option<&'a Self> {
                    match node {
                        Node::$ty(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

for_each_node_kind!(node_enums);

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<'n> LanguageObject for Node<'n> {
    fn accept<'ast, V: Visitor<'ast> + ?Sized>(&'ast self, visitor: &mut V) {
        let node: Node<'ast> = *self;
        node.dispatch(visitor)
    }

    fn as_node(&self) -> Node<'_> {
        *self
    }
}

/// Implements [`LanguageObject`] for an abstract role by forwarding to the
/// concrete variant.
macro_rules! forward_role {
    ($role:ident { $($variant:ident),* $(,)? }) => {
        impl LanguageObject for $role {
            fn accept<'ast, V: Visitor<'ast> + ?Sized>(&'ast self, visitor: &mut V) {
                match self {
                    $($role::$variant(inner) => inner.accept(visitor),)*
                }
            }

            fn as_node(&self) -> Node<'_> {
                match self {
                    $($role::$variant(inner) => inner.as_node(),)*
                }
            }
        }
    };
}

forward_role!(Expression {
    Column,
    Literal,
    Parameter,
    Function,
    Aggregate,
    Window,
    ScalarSubquery,
    SearchedCase,
    Condition,
});

forward_role!(Condition {
    Comparison,
    AndOr,
    Not,
    IsNull,
    Like,
    In,
    SubqueryIn,
    Exists,
    SubqueryComparison,
});

forward_role!(TableReference { Named, Derived, Join });
forward_role!(QueryExpression { Select, SetQuery });
forward_role!(Command {
    Query,
    Insert,
    Update,
    Delete,
    BatchedUpdates,
    Call,
});
forward_role!(InsertValueSource {
    Expressions,
    Query,
    Iterator,
});

//! Structural traversal.
//!
//! [`HierarchyVisitor`] defaults every case to the matching `walk_*` function,
//! which visits the node's semantic children in clause order. An override
//! calls the `walk_*` function itself to keep the inherited recursion:
//!
//! ```ignore
//! impl<'ast> HierarchyVisitor<'ast> for Tables<'ast> {
//!     fn visit_named_table(&mut self, node: &'ast NamedTable) {
//!         self.0.push(node);
//!         walk_named_table(self, node);
//!     }
//! }
//! ```
//!
//! Every hierarchy visitor is a [`Visitor`] through a blanket impl, so it can
//! be handed to any `accept`.

use super::node::{for_each_node_kind, LanguageObject};
use super::types::*;
use super::visitor::{visit_node, visit_nodes, Visitor};

macro_rules! hierarchy_trait {
    ($($ty:ident => $visit:ident, $walk:ident;)*) => {
        /// A visitor whose defaults recurse into each node's children.
        pub trait HierarchyVisitor<'ast>: Sized {
            /// Whether nested queries are entered. When false, traversal stops
            /// at every node that owns a subquery.
            fn descend_into_subqueries(&self) -> bool {
                true
            }

            $(
                fn $visit(&mut self, node: &'ast $ty) {
                    $walk(self, node)
                }
            )*
        }

        impl<'ast, T: HierarchyVisitor<'ast>> Visitor<'ast> for T {
            $(
                fn $visit(&mut self, node: &'ast $ty) {
                    HierarchyVisitor::$visit(self, node)
                }
            )*
        }
    };
}

for_each_node_kind!(hierarchy_trait);

fn visit_subquery<'ast, V, N>(visitor: &mut V, query: &'ast N)
where
    V: HierarchyVisitor<'ast>,
    N: LanguageObject + ?Sized,
{
    if visitor.descend_into_subqueries() {
        query.accept(visitor);
    }
}

pub fn walk_column_reference<'ast, V: HierarchyVisitor<'ast>>(_: &mut V, _: &'ast ColumnReference) {}

pub fn walk_literal<'ast, V: HierarchyVisitor<'ast>>(_: &mut V, _: &'ast Literal) {}

pub fn walk_parameter<'ast, V: HierarchyVisitor<'ast>>(_: &mut V, _: &'ast Parameter) {}

pub fn walk_function<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Function) {
    visit_nodes(v, &node.args);
}

pub fn walk_aggregate_function<'ast, V: HierarchyVisitor<'ast>>(
    v: &mut V,
    node: &'ast AggregateFunction,
) {
    visit_node(v, node.expression.as_deref());
    visit_node(v, node.condition.as_deref());
}

pub fn walk_window_function<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast WindowFunction) {
    node.function.accept(v);
    node.window.accept(v);
}

pub fn walk_window_specification<'ast, V: HierarchyVisitor<'ast>>(
    v: &mut V,
    node: &'ast WindowSpecification,
) {
    visit_nodes(v, &node.partition);
    visit_node(v, node.order_by.as_ref());
}

pub fn walk_scalar_subquery<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast ScalarSubquery) {
    visit_subquery(v, &node.subquery);
}

pub fn walk_searched_case<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast SearchedCase) {
    visit_nodes(v, &node.cases);
    visit_node(v, node.else_expression.as_deref());
}

pub fn walk_searched_when_clause<'ast, V: HierarchyVisitor<'ast>>(
    v: &mut V,
    node: &'ast SearchedWhenClause,
) {
    node.condition.accept(v);
    node.result.accept(v);
}

pub fn walk_comparison<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Comparison) {
    node.left.accept(v);
    node.right.accept(v);
}

pub fn walk_and_or<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast AndOr) {
    node.left.accept(v);
    node.right.accept(v);
}

pub fn walk_not<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Not) {
    node.criteria.accept(v);
}

pub fn walk_is_null<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast IsNull) {
    node.expression.accept(v);
}

pub fn walk_like<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Like) {
    node.left.accept(v);
    node.right.accept(v);
}

pub fn walk_in<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast In) {
    node.left.accept(v);
    visit_nodes(v, &node.right);
}

pub fn walk_subquery_in<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast SubqueryIn) {
    node.left.accept(v);
    visit_subquery(v, &node.subquery);
}

pub fn walk_exists<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Exists) {
    visit_subquery(v, &node.subquery);
}

pub fn walk_subquery_comparison<'ast, V: HierarchyVisitor<'ast>>(
    v: &mut V,
    node: &'ast SubqueryComparison,
) {
    node.left.accept(v);
    visit_subquery(v, &node.subquery);
}

pub fn walk_named_table<'ast, V: HierarchyVisitor<'ast>>(_: &mut V, _: &'ast NamedTable) {}

pub fn walk_derived_table<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast DerivedTable) {
    visit_subquery(v, &node.query);
}

pub fn walk_join<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Join) {
    node.left.accept(v);
    node.right.accept(v);
    visit_node(v, node.condition.as_ref());
}

pub fn walk_derived_column<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast DerivedColumn) {
    node.expression.accept(v);
}

pub fn walk_group_by<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast GroupBy) {
    visit_nodes(v, &node.elements);
}

pub fn walk_order_by<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast OrderBy) {
    visit_nodes(v, &node.sort_specifications);
}

pub fn walk_sort_specification<'ast, V: HierarchyVisitor<'ast>>(
    v: &mut V,
    node: &'ast SortSpecification,
) {
    node.expression.accept(v);
}

pub fn walk_limit<'ast, V: HierarchyVisitor<'ast>>(_: &mut V, _: &'ast Limit) {}

pub fn walk_with<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast With) {
    visit_nodes(v, &node.items);
}

pub fn walk_with_item<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast WithItem) {
    node.table.accept(v);
    visit_nodes(v, &node.columns);
    if let Some(subquery) = &node.subquery {
        visit_subquery(v, subquery);
    }
}

pub fn walk_select<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Select) {
    visit_node(v, node.with.as_ref());
    visit_nodes(v, &node.derived_columns);
    visit_nodes(v, &node.from);
    visit_node(v, node.filter.as_ref());
    visit_node(v, node.group_by.as_ref());
    visit_node(v, node.having.as_ref());
    visit_node(v, node.order_by.as_ref());
    visit_node(v, node.limit.as_ref());
}

pub fn walk_set_query<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast SetQuery) {
    visit_node(v, node.with.as_ref());
    visit_subquery(v, &node.left);
    visit_subquery(v, &node.right);
    visit_node(v, node.order_by.as_ref());
    visit_node(v, node.limit.as_ref());
}

pub fn walk_insert<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Insert) {
    node.table.accept(v);
    visit_nodes(v, &node.columns);
    match &node.value_source {
        InsertValueSource::Query(query) => visit_subquery(v, query),
        other => other.accept(v),
    }
}

pub fn walk_expression_value_source<'ast, V: HierarchyVisitor<'ast>>(
    v: &mut V,
    node: &'ast ExpressionValueSource,
) {
    visit_nodes(v, &node.values);
}

pub fn walk_iterator_value_source<'ast, V: HierarchyVisitor<'ast>>(
    _: &mut V,
    _: &'ast IteratorValueSource,
) {
}

pub fn walk_update<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Update) {
    node.table.accept(v);
    visit_nodes(v, &node.changes);
    visit_node(v, node.filter.as_ref());
}

pub fn walk_set_clause<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast SetClause) {
    node.symbol.accept(v);
    node.value.accept(v);
}

pub fn walk_delete<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Delete) {
    node.table.accept(v);
    visit_node(v, node.filter.as_ref());
}

pub fn walk_batched_updates<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast BatchedUpdates) {
    visit_nodes(v, &node.commands);
}

pub fn walk_call<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Call) {
    visit_nodes(v, &node.arguments);
}

pub fn walk_argument<'ast, V: HierarchyVisitor<'ast>>(v: &mut V, node: &'ast Argument) {
    visit_node(v, node.expression.as_ref());
}

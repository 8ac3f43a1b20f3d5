//! In-place rewriting of language objects.
//!
//! Rendering never mutates a tree. Passes that adapt a tree to a source
//! (renaming functions, trimming arguments, normalizing set operations) are
//! explicit: a [`Rewriter`] receives `&mut` access to selected node kinds
//! during a pre-order walk of the whole tree, and [`RewritePipeline`] runs a
//! sequence of named passes over a command.
use std::collections::HashMap;
use std::fmt;

use anyhow::Result;

use super::types::*;

/// Hooks invoked on each node of the matching kind, parents before children.
pub trait Rewriter {
    fn rewrite_function(&mut self, function: &mut Function) {
        let _ = function;
    }

    fn rewrite_set_query(&mut self, query: &mut SetQuery) {
        let _ = query;
    }

    fn rewrite_named_table(&mut self, table: &mut NamedTable) {
        let _ = table;
    }

    fn rewrite_column_reference(&mut self, column: &mut ColumnReference) {
        let _ = column;
    }

    fn rewrite_limit(&mut self, limit: &mut Limit) {
        let _ = limit;
    }

    /// Walk `node` with this rewriter.
    fn apply<N: Rewrite + ?Sized>(&mut self, node: &mut N)
    where
        Self: Sized,
    {
        node.rewrite_with(self);
    }
}

/// A node whose subtree can be walked mutably.
pub trait Rewrite {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R);
}

pub fn rewrite<N, R>(node: &mut N, rewriter: &mut R)
where
    N: Rewrite + ?Sized,
    R: Rewriter + ?Sized,
{
    node.rewrite_with(rewriter);
}

impl<T: Rewrite> Rewrite for Vec<T> {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        for node in self.iter_mut() {
            node.rewrite_with(rewriter);
        }
    }
}

impl<T: Rewrite> Rewrite for Option<T> {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        if let Some(node) = self {
            node.rewrite_with(rewriter);
        }
    }
}

impl<T: Rewrite + ?Sized> Rewrite for Box<T> {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        (**self).rewrite_with(rewriter);
    }
}

/// Nodes with no rewritable children and no hook.
macro_rules! leaf_rewrite {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Rewrite for $ty {
                fn rewrite_with<R: Rewriter + ?Sized>(&mut self, _: &mut R) {}
            }
        )*
    };
}

leaf_rewrite!(Literal, Parameter, IteratorValueSource);

impl Rewrite for ColumnReference {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        rewriter.rewrite_column_reference(self);
    }
}

impl Rewrite for NamedTable {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        rewriter.rewrite_named_table(self);
    }
}

impl Rewrite for Limit {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        rewriter.rewrite_limit(self);
    }
}

impl Rewrite for Function {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        rewriter.rewrite_function(self);
        self.args.rewrite_with(rewriter);
    }
}

impl Rewrite for AggregateFunction {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        self.expression.rewrite_with(rewriter);
        self.condition.rewrite_with(rewriter);
    }
}

impl Rewrite for WindowFunction {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        self.function.rewrite_with(rewriter);
        self.window.rewrite_with(rewriter);
    }
}

impl Rewrite for WindowSpecification {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        self.partition.rewrite_with(rewriter);
        self.order_by.rewrite_with(rewriter);
    }
}

impl Rewrite for ScalarSubquery {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        self.subquery.rewrite_with(rewriter);
    }
}

impl Rewrite for SearchedCase {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        for case in &mut self.cases {
            case.condition.rewrite_with(rewriter);
            case.result.rewrite_with(rewriter);
        }
        self.else_expression.rewrite_with(rewriter);
    }
}

impl Rewrite for Expression {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        match self {
            Expression::Column(column) => column.rewrite_with(rewriter),
            Expression::Literal(literal) => literal.rewrite_with(rewriter),
            Expression::Parameter(parameter) => parameter.rewrite_with(rewriter),
            Expression::Function(function) => function.rewrite_with(rewriter),
            Expression::Aggregate(aggregate) => aggregate.rewrite_with(rewriter),
            Expression::Window(window) => window.rewrite_with(rewriter),
            Expression::ScalarSubquery(subquery) => subquery.rewrite_with(rewriter),
            Expression::SearchedCase(case) => case.rewrite_with(rewriter),
            Expression::Condition(condition) => condition.rewrite_with(rewriter),
        }
    }
}

impl Rewrite for Condition {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        match self {
            Condition::Comparison(c) => {
                c.left.rewrite_with(rewriter);
                c.right.rewrite_with(rewriter);
            }
            Condition::AndOr(c) => {
                c.left.rewrite_with(rewriter);
                c.right.rewrite_with(rewriter);
            }
            Condition::Not(c) => c.criteria.rewrite_with(rewriter),
            Condition::IsNull(c) => c.expression.rewrite_with(rewriter),
            Condition::Like(c) => {
                c.left.rewrite_with(rewriter);
                c.right.rewrite_with(rewriter);
            }
            Condition::In(c) => {
                c.left.rewrite_with(rewriter);
                c.right.rewrite_with(rewriter);
            }
            Condition::SubqueryIn(c) => {
                c.left.rewrite_with(rewriter);
                c.subquery.rewrite_with(rewriter);
            }
            Condition::Exists(c) => c.subquery.rewrite_with(rewriter),
            Condition::SubqueryComparison(c) => {
                c.left.rewrite_with(rewriter);
                c.subquery.rewrite_with(rewriter);
            }
        }
    }
}

impl Rewrite for TableReference {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        match self {
            TableReference::Named(table) => table.rewrite_with(rewriter),
            TableReference::Derived(derived) => derived.query.rewrite_with(rewriter),
            TableReference::Join(join) => {
                join.left.rewrite_with(rewriter);
                join.right.rewrite_with(rewriter);
                join.condition.rewrite_with(rewriter);
            }
        }
    }
}

impl Rewrite for OrderBy {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        for spec in &mut self.sort_specifications {
            spec.expression.rewrite_with(rewriter);
        }
    }
}

impl Rewrite for With {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        for item in &mut self.items {
            item.table.rewrite_with(rewriter);
            item.columns.rewrite_with(rewriter);
            item.subquery.rewrite_with(rewriter);
        }
    }
}

impl Rewrite for Select {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        self.with.rewrite_with(rewriter);
        for column in &mut self.derived_columns {
            column.expression.rewrite_with(rewriter);
        }
        self.from.rewrite_with(rewriter);
        self.filter.rewrite_with(rewriter);
        if let Some(group_by) = &mut self.group_by {
            group_by.elements.rewrite_with(rewriter);
        }
        self.having.rewrite_with(rewriter);
        self.order_by.rewrite_with(rewriter);
        self.limit.rewrite_with(rewriter);
    }
}

impl Rewrite for SetQuery {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        rewriter.rewrite_set_query(self);
        self.with.rewrite_with(rewriter);
        self.left.rewrite_with(rewriter);
        self.right.rewrite_with(rewriter);
        self.order_by.rewrite_with(rewriter);
        self.limit.rewrite_with(rewriter);
    }
}

impl Rewrite for QueryExpression {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        match self {
            QueryExpression::Select(select) => select.rewrite_with(rewriter),
            QueryExpression::SetQuery(query) => query.rewrite_with(rewriter),
        }
    }
}

impl Rewrite for Command {
    fn rewrite_with<R: Rewriter + ?Sized>(&mut self, rewriter: &mut R) {
        match self {
            Command::Query(query) => query.rewrite_with(rewriter),
            Command::Insert(insert) => {
                insert.table.rewrite_with(rewriter);
                insert.columns.rewrite_with(rewriter);
                match &mut insert.value_source {
                    InsertValueSource::Expressions(source) => source.values.rewrite_with(rewriter),
                    InsertValueSource::Query(query) => query.rewrite_with(rewriter),
                    InsertValueSource::Iterator(source) => source.rewrite_with(rewriter),
                }
            }
            Command::Update(update) => {
                update.table.rewrite_with(rewriter);
                for change in &mut update.changes {
                    change.symbol.rewrite_with(rewriter);
                    change.value.rewrite_with(rewriter);
                }
                update.filter.rewrite_with(rewriter);
            }
            Command::Delete(delete) => {
                delete.table.rewrite_with(rewriter);
                delete.filter.rewrite_with(rewriter);
            }
            Command::BatchedUpdates(batch) => batch.commands.rewrite_with(rewriter),
            Command::Call(call) => {
                for argument in &mut call.arguments {
                    argument.expression.rewrite_with(rewriter);
                }
            }
        }
    }
}

/// A named rewrite over a whole command.
pub trait RewritePass: Rewriter + Send + Sync {
    /// Unique name identifying this pass.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn run(&mut self, command: &mut Command) -> Result<()> {
        rewrite(command, self);
        Ok(())
    }
}

/// Runs rewrite passes over a command in registration order.
#[derive(Default)]
pub struct RewritePipeline {
    passes: Vec<Box<dyn RewritePass>>,
}

impl RewritePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: Box<dyn RewritePass>) {
        self.passes.push(pass);
    }

    pub fn run(&mut self, command: &mut Command) -> Result<()> {
        for pass in &mut self.passes {
            tracing::debug!(pass = pass.name(), "running rewrite pass");
            pass.run(command)?;
        }
        Ok(())
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl fmt::Debug for RewritePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewritePipeline")
            .field("passes", &self.pass_names())
            .finish()
    }
}

/// Clears the ALL flag of a right-hand set query whose ALL flag or
/// operation differs from its parent's.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeSetQueries;

impl Rewriter for NormalizeSetQueries {
    fn rewrite_set_query(&mut self, query: &mut SetQuery) {
        let (parent_all, parent_operation) = (query.all, query.operation);
        if let QueryExpression::SetQuery(right) = &mut query.right {
            if right.all != parent_all || right.operation != parent_operation {
                right.all = false;
            }
        }
    }
}

impl RewritePass for NormalizeSetQueries {
    fn name(&self) -> &str {
        "normalize_set_queries"
    }

    fn description(&self) -> &str {
        "Drops ALL from nested set queries that are parenthesized"
    }
}

pub type FunctionModifier = Box<dyn Fn(&mut Function) + Send + Sync>;

/// Per-function rewrites keyed by case-insensitive function name.
#[derive(Default)]
pub struct FunctionModifiers {
    modifiers: HashMap<String, FunctionModifier>,
}

impl FunctionModifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, modifier: F)
    where
        F: Fn(&mut Function) + Send + Sync + 'static,
    {
        self.modifiers.insert(name.to_lowercase(), Box::new(modifier));
    }

    /// Rename `from` to `to`, keeping the arguments.
    pub fn rename(&mut self, from: &str, to: &str) {
        let to = to.to_string();
        self.register(from, move |function| function.name = to.clone());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modifiers.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }
}

impl fmt::Debug for FunctionModifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.modifiers.keys().collect();
        names.sort();
        f.debug_struct("FunctionModifiers")
            .field("functions", &names)
            .finish()
    }
}

impl Rewriter for FunctionModifiers {
    fn rewrite_function(&mut self, function: &mut Function) {
        if let Some(modifier) = self.modifiers.get(&function.name.to_lowercase()) {
            tracing::trace!(function = %function.name, "applying function modifier");
            modifier(function);
        }
    }
}

impl RewritePass for FunctionModifiers {
    fn name(&self) -> &str {
        "function_modifiers"
    }

    fn description(&self) -> &str {
        "Adapts function names and arguments to the source's function library"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::unparser::render;

    fn select_from(name: &str) -> Select {
        Select {
            derived_columns: vec![DerivedColumn::new(ColumnReference::new("x"))],
            from: vec![NamedTable::new(name).into()],
            ..Default::default()
        }
    }

    fn function(name: &str, args: Vec<Expression>) -> Expression {
        Function::new(name, args).into()
    }

    #[test]
    fn test_normalize_set_queries() {
        let nested = SetQuery::new(select_from("b"), SetOperation::Union, true, select_from("c"));
        let mut command = Command::from(SetQuery::new(
            select_from("a"),
            SetOperation::Union,
            false,
            nested,
        ));
        NormalizeSetQueries.apply(&mut command);
        let Command::Query(QueryExpression::SetQuery(parent)) = &command else {
            panic!("Expected set query");
        };
        let QueryExpression::SetQuery(right) = &parent.right else {
            panic!("Expected nested set query");
        };
        assert!(!right.all);
    }

    #[test]
    fn test_normalize_keeps_matching_all() {
        let nested = SetQuery::new(select_from("b"), SetOperation::Union, true, select_from("c"));
        let mut command = Command::from(SetQuery::new(
            select_from("a"),
            SetOperation::Union,
            true,
            nested,
        ));
        let before = command.clone();
        NormalizeSetQueries.apply(&mut command);
        assert_eq!(command, before);
    }

    #[test]
    fn test_function_modifiers_are_case_insensitive() {
        let mut modifiers = FunctionModifiers::new();
        modifiers.rename("lcase", "LOWER");
        modifiers.register("LOCATE", |f| {
            f.name = "CHARINDEX".into();
            f.args.truncate(2);
        });
        assert!(modifiers.contains("Lcase"));
        assert_eq!(modifiers.len(), 2);

        let mut command = Command::from(Select {
            derived_columns: vec![
                DerivedColumn::new(function("LCase", vec![ColumnReference::new("a").into()])),
                DerivedColumn::new(function(
                    "locate",
                    vec![
                        Literal::string("x").into(),
                        ColumnReference::new("a").into(),
                        Literal::integer(1).into(),
                    ],
                )),
            ],
            ..Default::default()
        });
        modifiers.apply(&mut command);
        assert_eq!(render(&command), "SELECT LOWER(a), CHARINDEX('x', a)");
    }

    #[test]
    fn test_rewrite_reaches_nested_queries() {
        let inner = Select {
            filter: Some(Condition::compare(
                function("ucase", vec![ColumnReference::new("b").into()]),
                ComparisonOperator::Eq,
                Literal::string("B"),
            )),
            ..select_from("t2")
        };
        let mut command = Command::from(Select {
            filter: Some(Exists { subquery: inner.into() }.into()),
            ..select_from("t1")
        });
        let mut modifiers = FunctionModifiers::new();
        modifiers.rename("UCASE", "UPPER");
        modifiers.apply(&mut command);
        assert_eq!(
            render(&command),
            "SELECT x FROM t1 WHERE EXISTS (SELECT x FROM t2 WHERE UPPER(b) = 'B')"
        );
    }

    #[test]
    fn test_pipeline_runs_passes_in_order() {
        let mut modifiers = FunctionModifiers::new();
        modifiers.rename("a", "b");
        let mut second = FunctionModifiers::new();
        second.rename("b", "c");

        let mut pipeline = RewritePipeline::new();
        pipeline.add_pass(Box::new(NormalizeSetQueries));
        pipeline.add_pass(Box::new(modifiers));
        pipeline.add_pass(Box::new(second));
        assert_eq!(
            pipeline.pass_names(),
            vec!["normalize_set_queries", "function_modifiers", "function_modifiers"]
        );

        let mut command = Command::from(Select {
            derived_columns: vec![DerivedColumn::new(function("a", vec![]))],
            ..Default::default()
        });
        pipeline.run(&mut command).unwrap();
        assert_eq!(render(&command), "SELECT c()");
    }
}

//! Type-filtered node collection.

use super::delegating::DelegatingHierarchyVisitor;
use super::node::{for_each_node_kind, LanguageObject, Node, NodeType};
use super::types::*;
use super::visitor::Visitor;

/// Gathers every node of type `T` it is offered, in visitation order.
///
/// On its own it reacts only to the node it is handed; pair it with
/// [`DelegatingHierarchyVisitor`] (as the entry points below do) to collect
/// over a whole tree.
pub struct CollectorVisitor<'ast, T: NodeType> {
    objects: Vec<&'ast T>,
}

impl<'ast, T: NodeType> Default for CollectorVisitor<'ast, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'ast, T: NodeType> CollectorVisitor<'ast, T> {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    pub fn objects(&self) -> &[&'ast T] {
        &self.objects
    }

    pub fn into_objects(self) -> Vec<&'ast T> {
        self.objects
    }

    fn offer(&mut self, node: Node<'ast>) {
        if let Some(hit) = T::downcast(node) {
            self.objects.push(hit);
        }
    }
}

macro_rules! collector_impl {
    ($($ty:ident => $visit:ident, $walk:ident;)*) => {
        impl<'ast, T: NodeType> Visitor<'ast> for CollectorVisitor<'ast, T> {
            $(
                fn $visit(&mut self, node: &'ast $ty) {
                    self.offer(Node::$ty(node));
                }
            )*
        }
    };
}

for_each_node_kind!(collector_impl);

/// Every `T` in `root`, including `root` itself, parents before children.
pub fn collect_objects<'ast, T: NodeType>(root: &'ast impl LanguageObject) -> Vec<&'ast T> {
    collect_objects_with::<T>(root, true)
}

/// As [`collect_objects`], optionally stopping at subquery boundaries.
pub fn collect_objects_with<'ast, T: NodeType>(
    root: &'ast impl LanguageObject,
    descend_into_subqueries: bool,
) -> Vec<&'ast T> {
    let mut collector = CollectorVisitor::<T>::new();
    root.accept(
        &mut DelegatingHierarchyVisitor::pre(&mut collector)
            .with_descend_into_subqueries(descend_into_subqueries),
    );
    collector.into_objects()
}

/// Every column reference in `root`.
pub fn collect_elements(root: &impl LanguageObject) -> Vec<&ColumnReference> {
    collect_objects::<ColumnReference>(root)
}

/// Column references in `root`, excluding those inside nested queries.
pub fn collect_elements_at_this_level(root: &impl LanguageObject) -> Vec<&ColumnReference> {
    collect_objects_with::<ColumnReference>(root, false)
}

/// Every named table in `root`.
pub fn collect_groups(root: &impl LanguageObject) -> Vec<&NamedTable> {
    collect_objects::<NamedTable>(root)
}

/// The distinct tables qualifying column references in `root`, in order of
/// first use.
pub fn collect_groups_used_by_elements(root: &impl LanguageObject) -> Vec<&NamedTable> {
    let mut groups: Vec<&NamedTable> = Vec::new();
    for element in collect_elements(root) {
        if let Some(table) = &element.table {
            if !groups.contains(&table) {
                groups.push(table);
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(table: &NamedTable, name: &str) -> ColumnReference {
        ColumnReference::qualified(table.clone(), name)
    }

    /// `SELECT a.x, b.y FROM a, b WHERE EXISTS (SELECT c.z FROM c WHERE c.z = a.x)`
    fn correlated() -> Command {
        let a = NamedTable::new("a");
        let b = NamedTable::new("b");
        let c = NamedTable::new("c");
        let inner = Select {
            derived_columns: vec![DerivedColumn::new(column(&c, "z"))],
            from: vec![c.clone().into()],
            filter: Some(Condition::compare(
                column(&c, "z"),
                ComparisonOperator::Eq,
                column(&a, "x"),
            )),
            ..Default::default()
        };
        Select {
            derived_columns: vec![
                DerivedColumn::new(column(&a, "x")),
                DerivedColumn::new(column(&b, "y")),
            ],
            from: vec![a.into(), b.into()],
            filter: Some(Exists { subquery: inner.into() }.into()),
            ..Default::default()
        }
        .into()
    }

    fn names(columns: &[&ColumnReference]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match &c.table {
                Some(t) => format!("{}.{}", t.name, c.name),
                None => c.name.clone(),
            })
            .collect()
    }

    #[test]
    fn test_collect_elements() {
        let command = correlated();
        let columns = collect_elements(&command);
        assert_eq!(names(&columns), vec!["a.x", "b.y", "c.z", "c.z", "a.x"]);
    }

    #[test]
    fn test_collect_elements_at_this_level() {
        let command = correlated();
        let columns = collect_elements_at_this_level(&command);
        assert_eq!(names(&columns), vec!["a.x", "b.y"]);
    }

    #[test]
    fn test_collect_groups() {
        let command = correlated();
        let groups: Vec<_> = collect_groups(&command)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(groups, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_collect_groups_used_by_elements_is_distinct() {
        let command = correlated();
        let groups: Vec<_> = collect_groups_used_by_elements(&command)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(groups, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_independent_collectors_agree() {
        let command = correlated();
        let first = collect_objects::<Comparison>(&command);
        let second = collect_objects::<Comparison>(&command);
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_root_is_collected_before_children() {
        let inner = Condition::compare(
            ColumnReference::new("a"),
            ComparisonOperator::Eq,
            Literal::integer(1),
        );
        let outer = Condition::negate(Condition::negate(inner));
        let nots = collect_objects::<Not>(&outer);
        assert_eq!(nots.len(), 2);
        assert!(matches!(*nots[0].criteria, Condition::Not(_)));
        assert!(matches!(*nots[1].criteria, Condition::Comparison(_)));
    }

    #[test]
    fn test_collector_alone_sees_only_the_offered_node() {
        let command = correlated();
        let mut collector = CollectorVisitor::<ColumnReference>::new();
        command.accept(&mut collector);
        assert!(collector.objects().is_empty());
    }
}

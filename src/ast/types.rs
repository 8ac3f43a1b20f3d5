//! Language object types for fedsql.
//!
//! This module defines the closed catalog of node kinds handed to translators.
//! Concrete kinds are structs (or, for literals, a small enum); abstract roles
//! such as [`Expression`] and [`Condition`] are enums over the concrete kinds.
//! Every concrete kind has exactly one dispatch case in
//! [`Visitor`](super::visitor::Visitor).

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::metadata::MetadataRef;

/// Runtime type of a value or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    String,
    Char,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
    Date,
    Time,
    Timestamp,
    Varbinary,
    #[default]
    Object,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Byte
                | DataType::Short
                | DataType::Integer
                | DataType::Long
                | DataType::BigInteger
                | DataType::Float
                | DataType::Double
                | DataType::BigDecimal
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Char => "char",
            DataType::Boolean => "boolean",
            DataType::Byte => "byte",
            DataType::Short => "short",
            DataType::Integer => "integer",
            DataType::Long => "long",
            DataType::BigInteger => "biginteger",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::BigDecimal => "bigdecimal",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::Timestamp => "timestamp",
            DataType::Varbinary => "varbinary",
            DataType::Object => "object",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed constant.
///
/// Arbitrary-precision numbers are carried as their decimal text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Char(char),
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    BigInteger(String),
    Float(f32),
    Double(f64),
    BigDecimal(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Varbinary(Vec<u8>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Char(_) => DataType::Char,
            Value::Boolean(_) => DataType::Boolean,
            Value::Byte(_) => DataType::Byte,
            Value::Short(_) => DataType::Short,
            Value::Integer(_) => DataType::Integer,
            Value::Long(_) => DataType::Long,
            Value::BigInteger(_) => DataType::BigInteger,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::BigDecimal(_) => DataType::BigDecimal,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Varbinary(_) => DataType::Varbinary,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.data_type().is_numeric()
    }
}

/// The raw, unquoted text of a value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::BigInteger(s) | Value::BigDecimal(s) => f.write_str(s),
            Value::Char(c) => write!(f, "{}", c),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Short(n) => write!(f, "{}", n),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Double(n) => write!(f, "{:?}", n),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Varbinary(bytes) => {
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Leaf expressions
// ---------------------------------------------------------------------------

/// A column, optionally qualified by the table node it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReference {
    pub table: Option<NamedTable>,
    pub name: String,
    pub metadata: Option<MetadataRef>,
    pub data_type: DataType,
}

impl ColumnReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
            metadata: None,
            data_type: DataType::Object,
        }
    }

    pub fn qualified(table: NamedTable, name: impl Into<String>) -> Self {
        Self {
            table: Some(table),
            ..Self::new(name)
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

/// A constant, a null of some type, or a bind-parameter marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Rendered as `?`; the value, if known, is supplied at execution time.
    Bind {
        data_type: DataType,
        value: Option<Value>,
    },
    Null(DataType),
    Value(Value),
}

impl Literal {
    pub fn string(value: impl Into<String>) -> Self {
        Literal::Value(Value::String(value.into()))
    }

    pub fn integer(value: i32) -> Self {
        Literal::Value(Value::Integer(value))
    }

    pub fn long(value: i64) -> Self {
        Literal::Value(Value::Long(value))
    }

    pub fn boolean(value: bool) -> Self {
        Literal::Value(Value::Boolean(value))
    }

    pub fn null(data_type: DataType) -> Self {
        Literal::Null(data_type)
    }

    pub fn bind(data_type: DataType) -> Self {
        Literal::Bind {
            data_type,
            value: None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Literal::Bind { value, .. } => value.as_ref(),
            Literal::Null(_) => None,
            Literal::Value(value) => Some(value),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Bind { data_type, .. } | Literal::Null(data_type) => *data_type,
            Literal::Value(value) => value.data_type(),
        }
    }
}

/// Positional parameter, bound per execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub index: usize,
    pub data_type: DataType,
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// Scalar function call. Name and arguments are mutable so rewrite passes can
/// adapt them to a source's function library.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub args: Vec<Expression>,
    pub data_type: DataType,
}

impl Function {
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            args,
            data_type: DataType::Object,
        }
    }
}

/// `NAME([DISTINCT] arg) [FILTER (WHERE cond)]`; no argument means `*`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFunction {
    pub name: String,
    pub distinct: bool,
    pub expression: Option<Box<Expression>>,
    pub condition: Option<Box<Condition>>,
    pub data_type: DataType,
}

impl AggregateFunction {
    pub fn new(name: impl Into<String>, expression: Option<Expression>) -> Self {
        Self {
            name: name.into(),
            distinct: false,
            expression: expression.map(Box::new),
            condition: None,
            data_type: DataType::Object,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowFunction {
    pub function: AggregateFunction,
    pub window: WindowSpecification,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpecification {
    pub partition: Vec<Expression>,
    pub order_by: Option<OrderBy>,
}

// ---------------------------------------------------------------------------
// Other expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSubquery {
    pub subquery: QueryExpression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchedCase {
    pub cases: Vec<SearchedWhenClause>,
    pub else_expression: Option<Box<Expression>>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchedWhenClause {
    pub condition: Condition,
    pub result: Expression,
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "<>",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Expression,
    pub operator: ComparisonOperator,
    pub right: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    pub fn keyword(self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
        }
    }
}

/// Binary AND/OR.
#[derive(Debug, Clone, PartialEq)]
pub struct AndOr {
    pub left: Box<Condition>,
    pub operator: BooleanOperator,
    pub right: Box<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Not {
    pub criteria: Box<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsNull {
    pub expression: Expression,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchMode {
    #[default]
    Like,
    SimilarTo,
    LikeRegex,
}

impl MatchMode {
    pub fn keyword(self) -> &'static str {
        match self {
            MatchMode::Like => "LIKE",
            MatchMode::SimilarTo => "SIMILAR TO",
            MatchMode::LikeRegex => "LIKE_REGEX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub left: Expression,
    pub right: Expression,
    pub escape: Option<char>,
    pub negated: bool,
    pub mode: MatchMode,
}

/// `left [NOT] IN (a, b, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct In {
    pub left: Expression,
    pub right: Vec<Expression>,
    pub negated: bool,
}

/// `left [NOT] IN (subquery)`
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryIn {
    pub left: Expression,
    pub subquery: QueryExpression,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exists {
    pub subquery: QueryExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Some,
    Any,
    All,
}

impl Quantifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Quantifier::Some => "SOME",
            Quantifier::Any => "ANY",
            Quantifier::All => "ALL",
        }
    }
}

/// `left op ANY|SOME|ALL (subquery)`
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryComparison {
    pub left: Expression,
    pub operator: ComparisonOperator,
    pub quantifier: Quantifier,
    pub subquery: QueryExpression,
}

// ---------------------------------------------------------------------------
// Table references
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NamedTable {
    pub name: String,
    pub correlation_name: Option<String>,
    pub metadata: Option<MetadataRef>,
}

impl NamedTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            correlation_name: None,
            metadata: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.correlation_name = Some(alias.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTable {
    pub query: QueryExpression,
    pub correlation_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

impl JoinType {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::LeftOuter => "LEFT OUTER",
            JoinType::RightOuter => "RIGHT OUTER",
            JoinType::FullOuter => "FULL OUTER",
            JoinType::Cross => "CROSS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: TableReference,
    pub right: TableReference,
    pub join_type: JoinType,
    pub condition: Option<Condition>,
}

// ---------------------------------------------------------------------------
// Clauses
// ---------------------------------------------------------------------------

/// One entry of a select list.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub alias: Option<String>,
    pub expression: Expression,
}

impl DerivedColumn {
    pub fn new(expression: impl Into<Expression>) -> Self {
        Self {
            alias: None,
            expression: expression.into(),
        }
    }

    pub fn aliased(expression: impl Into<Expression>, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupBy {
    pub elements: Vec<Expression>,
    pub rollup: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderBy {
    pub sort_specifications: Vec<SortSpecification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ordering {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullOrdering {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpecification {
    pub ordering: Ordering,
    pub expression: Expression,
    pub null_ordering: Option<NullOrdering>,
}

impl SortSpecification {
    pub fn new(expression: impl Into<Expression>, ordering: Ordering) -> Self {
        Self {
            ordering,
            expression: expression.into(),
            null_ordering: None,
        }
    }
}

/// Row offset of zero means no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Limit {
    pub row_offset: u64,
    pub row_limit: u64,
}

impl Limit {
    pub fn new(row_offset: u64, row_limit: u64) -> Self {
        Self {
            row_offset,
            row_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct With {
    pub items: Vec<WithItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub table: NamedTable,
    pub columns: Vec<ColumnReference>,
    pub subquery: Option<QueryExpression>,
    pub recursive: bool,
}

// ---------------------------------------------------------------------------
// Queries and commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub with: Option<With>,
    pub distinct: bool,
    pub derived_columns: Vec<DerivedColumn>,
    pub from: Vec<TableReference>,
    pub filter: Option<Condition>,
    pub group_by: Option<GroupBy>,
    pub having: Option<Condition>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperation {
    Union,
    Intersect,
    Except,
}

impl SetOperation {
    pub fn keyword(self) -> &'static str {
        match self {
            SetOperation::Union => "UNION",
            SetOperation::Intersect => "INTERSECT",
            SetOperation::Except => "EXCEPT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetQuery {
    pub with: Option<With>,
    pub left: QueryExpression,
    pub right: QueryExpression,
    pub operation: SetOperation,
    pub all: bool,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
}

impl SetQuery {
    pub fn new(
        left: impl Into<QueryExpression>,
        operation: SetOperation,
        all: bool,
        right: impl Into<QueryExpression>,
    ) -> Self {
        Self {
            with: None,
            left: left.into(),
            right: right.into(),
            operation,
            all,
            order_by: None,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: NamedTable,
    pub columns: Vec<ColumnReference>,
    pub value_source: InsertValueSource,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpressionValueSource {
    pub values: Vec<Expression>,
}

/// Rows supplied by the engine at execution time. Rendered as one bind
/// marker per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IteratorValueSource {
    pub column_count: usize,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: NamedTable,
    pub changes: Vec<SetClause>,
    pub filter: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub symbol: ColumnReference,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: NamedTable,
    pub filter: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchedUpdates {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub metadata: Option<MetadataRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
    InOut,
    Return,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub direction: Direction,
    pub expression: Option<Expression>,
    pub data_type: DataType,
}

// ---------------------------------------------------------------------------
// Abstract roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(ColumnReference),
    Literal(Literal),
    Parameter(Parameter),
    Function(Function),
    Aggregate(AggregateFunction),
    Window(Box<WindowFunction>),
    ScalarSubquery(ScalarSubquery),
    SearchedCase(SearchedCase),
    /// A predicate used as a boolean value.
    Condition(Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison(Comparison),
    AndOr(AndOr),
    Not(Not),
    IsNull(IsNull),
    Like(Like),
    In(In),
    SubqueryIn(SubqueryIn),
    Exists(Exists),
    SubqueryComparison(SubqueryComparison),
}

impl Condition {
    pub fn compare(
        left: impl Into<Expression>,
        operator: ComparisonOperator,
        right: impl Into<Expression>,
    ) -> Self {
        Condition::Comparison(Comparison {
            left: left.into(),
            operator,
            right: right.into(),
        })
    }

    pub fn and(left: Condition, right: Condition) -> Self {
        Self::combine(left, BooleanOperator::And, right)
    }

    pub fn or(left: Condition, right: Condition) -> Self {
        Self::combine(left, BooleanOperator::Or, right)
    }

    pub fn combine(left: Condition, operator: BooleanOperator, right: Condition) -> Self {
        Condition::AndOr(AndOr {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    pub fn negate(criteria: Condition) -> Self {
        Condition::Not(Not {
            criteria: Box::new(criteria),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableReference {
    Named(NamedTable),
    Derived(DerivedTable),
    Join(Box<Join>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpression {
    Select(Box<Select>),
    SetQuery(Box<SetQuery>),
}

impl QueryExpression {
    pub fn limit(&self) -> Option<&Limit> {
        match self {
            QueryExpression::Select(select) => select.limit.as_ref(),
            QueryExpression::SetQuery(set) => set.limit.as_ref(),
        }
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        match self {
            QueryExpression::Select(select) => select.order_by.as_ref(),
            QueryExpression::SetQuery(set) => set.order_by.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query(QueryExpression),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    BatchedUpdates(BatchedUpdates),
    Call(Call),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertValueSource {
    Expressions(ExpressionValueSource),
    Query(QueryExpression),
    Iterator(IteratorValueSource),
}

macro_rules! impl_from {
    ($($from:ty => $to:ident :: $variant:ident;)*) => {
        $(
            impl From<$from> for $to {
                fn from(node: $from) -> Self {
                    $to::$variant(node)
                }
            }
        )*
    };
}

macro_rules! impl_from_boxed {
    ($($from:ty => $to:ident :: $variant:ident;)*) => {
        $(
            impl From<$from> for $to {
                fn from(node: $from) -> Self {
                    $to::$variant(Box::new(node))
                }
            }
        )*
    };
}

impl_from! {
    ColumnReference => Expression::Column;
    Literal => Expression::Literal;
    Parameter => Expression::Parameter;
    Function => Expression::Function;
    AggregateFunction => Expression::Aggregate;
    ScalarSubquery => Expression::ScalarSubquery;
    SearchedCase => Expression::SearchedCase;
    Comparison => Condition::Comparison;
    AndOr => Condition::AndOr;
    Not => Condition::Not;
    IsNull => Condition::IsNull;
    Like => Condition::Like;
    In => Condition::In;
    SubqueryIn => Condition::SubqueryIn;
    Exists => Condition::Exists;
    SubqueryComparison => Condition::SubqueryComparison;
    NamedTable => TableReference::Named;
    DerivedTable => TableReference::Derived;
    QueryExpression => Command::Query;
    Insert => Command::Insert;
    Update => Command::Update;
    Delete => Command::Delete;
    BatchedUpdates => Command::BatchedUpdates;
    Call => Command::Call;
}

impl_from_boxed! {
    WindowFunction => Expression::Window;
    Condition => Expression::Condition;
    Join => TableReference::Join;
    Select => QueryExpression::Select;
    SetQuery => QueryExpression::SetQuery;
}

impl From<Select> for Command {
    fn from(select: Select) -> Self {
        Command::Query(select.into())
    }
}

impl From<SetQuery> for Command {
    fn from(query: SetQuery) -> Self {
        Command::Query(query.into())
    }
}

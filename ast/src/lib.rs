mod errors;
mod filter;
mod model;
mod relationship_rule;
mod resource;
mod temporal;
mod validate;

pub use errors::AstError;
pub use filter::{KeyValuePair, Operator, WhereValue};
pub use model::{
    Aggregate, Clause, ColumnarRow, CreateClause, DeleteClause, Expression, MatchClause,
    NodePattern, OrderItem, Relationship, RelationshipDirection, ReturnClause, ReturnItem,
    SetClause, SetItem, SortDirection, WhereClause,
};
pub use relationship_rule::{Comparison, DefaultProp, MatchCriterion, RelationshipRule};
pub use resource::Resource;
pub use temporal::{TemporalExpression, TemporalFunction, TemporalOp};
pub use validate::{validate_expression, validate_match_clause};

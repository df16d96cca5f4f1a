mod compare;
mod expression;
pub mod mutation;
mod options;
mod parse_filter;
mod path;
mod projection;
mod sort;

pub use compare::{compare_values, type_rank, values_equal};
pub use expression::Expression;
pub use mutation::{Mutation, MutationError, MutationOp, parse_mutation};
pub use options::FindOptions;
pub use parse_filter::{FilterParseError, parse_filter};
pub use path::{get_path, get_path_values, is_truthy};
pub use projection::apply_projection;
pub use sort::{Sort, SortDirection, compare_by_sort, id_ascending};

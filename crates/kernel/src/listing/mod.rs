//! Listing engine.
//!
//! Declarative filter/sort/search/pagination requests become multi-join SQL,
//! are executed as a page statement and a total statement, and the fanned-out
//! rows are folded back into one entity per root id.
//!
//! ```text
//! ListQuery -> PaginatedList::<Articles>::new -> set_data(&pool) -> ListOutput
//! ```

pub mod articles;
pub mod denormalize;
pub mod executor;
pub mod order;
pub mod paginated;
pub mod predicate;
pub mod schema;
pub mod statement;
pub mod tags;
pub mod timing;
pub mod types;

pub use articles::{Article, ArticleRow, Articles, Author};
pub use denormalize::{FanOutRow, NamedRef, denormalize};
pub use executor::{Statement, StatementExecutor};
pub use paginated::{ListingQuery, PaginatedList};
pub use tags::{Tag, TagRow, Tags};
pub use timing::StatementTiming;
pub use types::{ListOutput, ListQuery, SortDirection};

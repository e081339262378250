pub mod error;
pub mod types;

pub mod config;
pub mod connector;
pub mod geo;
pub mod query;
pub mod reactive;
pub mod repository;
pub mod select;

pub use config::{PageSort, PaginatorDefaults, RepositoryOptions};
pub use connector::{Connector, ConnectorCall, ConnectorSink, MemoryConnector, SelectRequest};
pub use error::{ConnectorError, LiveSetError, RepositoryError, Result, StatementError};
pub use geo::GeoPoint;
pub use query::{Condition, Operator, Param, Statement};
pub use reactive::{ChangeEvent, Constant, LiveValue, Reactive, Unsubscribe};
pub use repository::{CreateOptions, Entity, Factory, Model, Repository};
pub use select::{QueryPaginator, QueryState, QuerySubject, ResultSet, Select, SelectOne};
pub use types::{Direction, Identity};

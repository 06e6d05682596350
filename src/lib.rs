pub mod ast;
pub mod bridge;
pub mod builder;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod format;
pub mod includes;
pub mod parser;
pub mod partial_eval;
pub mod projection;
pub mod query;
pub mod tokens;
pub mod translate;
pub mod types;
pub mod value;

pub use ast::{BinaryOp, Expr, Method, MethodCall, UnaryOp};
pub use builder::{Diagnostics, QueryBuilder};
pub use config::QueryOptions;
pub use error::{BridgeError, QueryError, Result};
pub use evaluator::{EvalContext, EvalError, Evaluator};
pub use format::format_query;
pub use parser::{CompiledQuery, QueryParser};
pub use query::{IntoOperand, Query};
pub use types::{Describe, TypeDescriptor, TypeHandle, TypeShape};
pub use value::Value;

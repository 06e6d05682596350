use std::collections::HashSet;

use tracing::{debug, info_span};

use crate::ast::Expr;
use crate::builder::{Diagnostics, QueryBuilder};
use crate::config::QueryOptions;
use crate::error::Result;
use crate::format::format_query;
use crate::partial_eval::partial_eval;
use crate::translate::Translator;
use crate::types::{TypeHandle, TypeShape};

/// A built query with what callers need to decode its result.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub groq: String,
    /// `false` for single-item and aggregate queries
    pub expects_array: bool,
    pub result_type: Option<TypeShape>,
    pub diagnostics: Diagnostics,
}

/// Entry point: turns one expression tree into GROQ.
///
/// Each parser owns its own builder state, so a parser may be reused and
/// separate parsers may run on different threads.
///
/// # Examples
///
/// ```
/// use groq_expr::ast::{Expr, Method, MethodCall};
/// use groq_expr::{QueryOptions, QueryParser};
///
/// let expr = Expr::call(MethodCall::new(Method::Count, vec![Expr::Source(None)]));
/// let groq = QueryParser::new(expr, None, QueryOptions::default())
///     .build_query(true)
///     .unwrap();
/// assert_eq!(groq, "count(*)");
/// ```
#[derive(Debug, Clone)]
pub struct QueryParser {
    expr: Expr,
    doc_type: Option<TypeHandle>,
    result_type: Option<TypeShape>,
    options: QueryOptions,
}

impl QueryParser {
    pub fn new(expr: Expr, doc_type: Option<TypeHandle>, options: QueryOptions) -> Self {
        QueryParser {
            expr,
            doc_type,
            result_type: None,
            options,
        }
    }

    /// Declares the element type the query yields, when it differs from
    /// the document type.
    pub fn result_type(mut self, shape: TypeShape) -> Self {
        self.result_type = Some(shape);
        self
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Builds the query text, with or without its projection.
    pub fn build_query(&self, include_projections: bool) -> Result<String> {
        Ok(self.compile_with(include_projections)?.groq)
    }

    pub fn compile(&self) -> Result<CompiledQuery> {
        self.compile_with(self.options.include_projections)
    }

    fn compile_with(&self, include_projections: bool) -> Result<CompiledQuery> {
        let span = info_span!(
            "build_query",
            doc_type = self.doc_type.map(|handle| handle.name()).unwrap_or("*")
        );
        let _guard = span.enter();

        let folded = partial_eval(&self.expr);
        let mut builder = QueryBuilder::new(self.doc_type, &self.options);
        builder.result_type = self.result_type.clone();
        builder.diagnostics.partial_eval_fallbacks = folded.fallbacks;

        {
            let mut translator = Translator::new(&mut builder);
            let mut visitor = ChainVisitor::default();
            visitor.visit_root(&folded.expr, &mut translator)?;
        }

        let groq = builder.build(include_projections);
        let groq = if self.options.pretty {
            format_query(&groq)
        } else {
            groq
        };
        debug!(groq = %groq, expects_array = builder.expects_array(), "built query");

        Ok(CompiledQuery {
            groq,
            expects_array: builder.expects_array(),
            result_type: builder.result_type.clone(),
            diagnostics: builder.diagnostics.clone(),
        })
    }
}

/// Walks the outer query chain depth-first so calls are applied in the
/// order they were written.
#[derive(Default)]
struct ChainVisitor {
    visited: HashSet<*const Expr>,
}

impl ChainVisitor {
    fn visit_root(&mut self, expr: &Expr, translator: &mut Translator<'_>) -> Result<()> {
        match expr {
            Expr::Call(_) => self.visit(expr, translator),
            // A bare predicate filters the document set.
            Expr::Lambda(lambda) => {
                let filter = translator.transform(&lambda.body)?;
                translator.add_filter(filter);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn visit(&mut self, expr: &Expr, translator: &mut Translator<'_>) -> Result<()> {
        if !self.visited.insert(expr as *const Expr) {
            return Ok(());
        }
        let Expr::Call(call) = expr else {
            return Ok(());
        };
        if call.object.is_none()
            && let Some(source @ Expr::Call(_)) = call.args.first()
        {
            self.visit(source, translator)?;
        }
        translator.apply(call)
    }
}

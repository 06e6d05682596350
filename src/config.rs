/// Options controlling how a query is built and rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Depth at which automatic projections stop expanding and fall back to `...`
    pub max_nesting_level: usize,
    /// Emit the projection block at all
    pub include_projections: bool,
    /// Render `.value.field` on references as `coalesce(ref->field, ref.field)`
    pub use_coalesce_fallback: bool,
    /// Run the finished query through the formatter
    pub pretty: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            max_nesting_level: 7,
            include_projections: true,
            use_coalesce_fallback: false,
            pretty: false,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_nesting_level(mut self, level: usize) -> Self {
        self.max_nesting_level = level;
        self
    }

    pub fn include_projections(mut self, include: bool) -> Self {
        self.include_projections = include;
        self
    }

    pub fn use_coalesce_fallback(mut self, enabled: bool) -> Self {
        self.use_coalesce_fallback = enabled;
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

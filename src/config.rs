/// Knobs that change how template text is turned into a model.
///
/// Options are part of the cache key, since they change the parsed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParseOptions {
    /// Drop lines that hold nothing but block/conditional/include markers
    /// and whitespace, terminator included.
    pub trim_marker_lines: bool,
    /// Maximum nesting of `[include:...]` markers.
    pub max_include_depth: usize,
}

impl ParseOptions {
    pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

    pub fn new() -> Self {
        Self {
            trim_marker_lines: true,
            max_include_depth: Self::DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    pub fn trim_marker_lines(mut self, trim: bool) -> Self {
        self.trim_marker_lines = trim;
        self
    }

    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new()
    }
}

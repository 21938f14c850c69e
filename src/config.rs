/// What an inverted section does when its name resolves to a lambda.
///
/// Mustache implementations disagree here, so the caller picks.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum InvertedLambda {
    /// Fail with [`crate::StacheError::UnsupportedInvertedLambda`].
    #[default]
    Reject,
    /// Lambdas count as truthy, so the inverted body is skipped.
    Truthy,
    /// Lambdas count as falsey, so the inverted body renders once.
    Falsey,
}

/// Knobs shared by the render and validation visitors.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderConfig {
    /// Maximum nesting of sections, partials and blocks.
    pub max_depth: usize,
    /// Report unresolvable variable tags instead of rendering them empty.
    pub strict_variables: bool,
    pub inverted_lambda: InvertedLambda,
}

impl RenderConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 128;

    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    #[must_use]
    pub const fn with_inverted_lambda(mut self, policy: InvertedLambda) -> Self {
        self.inverted_lambda = policy;
        self
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            strict_variables: false,
            inverted_lambda: InvertedLambda::default(),
        }
    }
}

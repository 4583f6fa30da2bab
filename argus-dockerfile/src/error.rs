use thiserror::Error;

/// Errors raised while loading or streaming a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// The recipe file could not be read.
    #[error("cannot read recipe {path}: {source}")]
    Io {
        /// Path that failed to open or read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The recipe text failed to parse as Dockerfile syntax.
    #[error("recipe parse error: {0}")]
    Parse(#[from] dockerfile_parser::Error),
}

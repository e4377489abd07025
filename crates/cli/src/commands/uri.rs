//! Connection-string inspection command.

use marula_db::{UriError, optimize_uri};

/// Errors that can occur while optimizing a URI.
#[derive(Debug, thiserror::Error)]
pub enum UriCommandError {
    #[error("Missing environment variable: DATABASE_URI")]
    MissingUri,

    #[error("connection URI error: {0}")]
    Uri(#[from] UriError),
}

/// Print the optimized form of a connection string.
///
/// Reads `DATABASE_URI` (falling back to `DATABASE_URL`) unless `raw` is
/// given. The output contains credentials; this is an operator tool.
///
/// # Errors
///
/// Returns [`UriCommandError`] if no URI is available or it is malformed.
pub fn optimize(raw: Option<&str>) -> Result<(), UriCommandError> {
    let base = match raw {
        Some(value) => value.to_owned(),
        None => {
            let _ = dotenvy::dotenv();
            std::env::var("DATABASE_URI")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| UriCommandError::MissingUri)?
        }
    };

    let optimized = optimize_uri(&base)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{optimized}");
    }

    Ok(())
}

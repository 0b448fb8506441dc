//! Join artifacts
//!
//! When a session is created, the join URL is handed to a generator that
//! turns it into something students can use to reach the session, such as
//! an encoded QR image. The engine stores the output verbatim and never
//! looks inside it.

use crate::error::Error;

/// Produces the join artifact for a session
pub trait JoinArtifactGenerator {
    /// Generates an artifact for `join_url`
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the generator is unavailable. Callers
    /// fall back to the plain URL.
    fn generate(&self, join_url: &str) -> Result<String, Error>;
}

/// Uses the join URL itself as the artifact
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainUrl;

impl JoinArtifactGenerator for PlainUrl {
    fn generate(&self, join_url: &str) -> Result<String, Error> {
        Ok(join_url.to_owned())
    }
}

impl<F> JoinArtifactGenerator for F
where
    F: Fn(&str) -> Result<String, Error>,
{
    fn generate(&self, join_url: &str) -> Result<String, Error> {
        self(join_url)
    }
}

/// Runs `generator`, falling back to the plain URL on failure
pub fn generate_or_fallback<G: JoinArtifactGenerator + ?Sized>(
    generator: &G,
    join_url: &str,
) -> String {
    match generator.generate(join_url) {
        Ok(artifact) => artifact,
        Err(error) => {
            tracing::warn!(%error, join_url, "join artifact generation failed, using the plain URL");
            join_url.to_owned()
        }
    }
}

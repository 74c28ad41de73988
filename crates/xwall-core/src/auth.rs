//! Credential resolution: an ordered chain of sources, tried until one
//! yields a credential set the search provider accepts.
//!
//! ```text
//! saved file --unavailable--> browser cookies --unavailable--> manual entry --unavailable--> fatal
//!     |                            |                               |
//!     +--> provider                +--> provider + save file       +--> provider + save file
//! ```

use std::fmt;
use std::io::{self, BufRead, BufReader, Stdin, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::credentials::{AUTH_TOKEN, CSRF_TOKEN, CredentialFile, CredentialSet};
use crate::error::AppError;
use crate::traits::ProviderFactory;

/// Where a resolved credential set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    File,
    Browser,
    Manual,
}

impl CredentialOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialOrigin::File => "file",
            CredentialOrigin::Browser => "browser",
            CredentialOrigin::Manual => "manual",
        }
    }
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of asking a single source for credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Found(CredentialSet),
    Unavailable(String),
}

/// One step of the fallback chain.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    fn origin(&self) -> CredentialOrigin;

    async fn load(&self) -> SourceOutcome;
}

/// Loads the set persisted by a previous run.
#[derive(Debug, Clone)]
pub struct FileCredentialSource {
    file: CredentialFile,
}

impl FileCredentialSource {
    pub fn new(file: CredentialFile) -> Self {
        Self { file }
    }
}

#[async_trait]
impl CredentialSource for FileCredentialSource {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::File
    }

    async fn load(&self) -> SourceOutcome {
        if !self.file.exists() {
            return SourceOutcome::Unavailable(format!(
                "no saved credentials at {}",
                self.file.path().display()
            ));
        }

        match self.file.load().await {
            Ok(set) => SourceOutcome::Found(set),
            Err(e) => SourceOutcome::Unavailable(format!("saved credentials unreadable: {e}")),
        }
    }
}

/// Asks the operator to paste the two required cookie values.
pub struct ManualEntrySource<R> {
    reader: Arc<Mutex<R>>,
    show_instructions: bool,
}

impl ManualEntrySource<BufReader<Stdin>> {
    /// Prompt on stderr, read answers from stdin.
    pub fn stdin() -> Self {
        Self {
            reader: Arc::new(Mutex::new(BufReader::new(io::stdin()))),
            show_instructions: true,
        }
    }
}

impl<R: BufRead + Send + 'static> ManualEntrySource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            show_instructions: false,
        }
    }
}

#[async_trait]
impl<R: BufRead + Send + 'static> CredentialSource for ManualEntrySource<R> {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::Manual
    }

    async fn load(&self) -> SourceOutcome {
        let reader = self.reader.clone();
        let show_instructions = self.show_instructions;

        let answer = tokio::task::spawn_blocking(move || {
            let mut reader = reader.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            prompt_tokens(&mut *reader, show_instructions)
        })
        .await;

        match answer {
            Ok(Ok(set)) if set.is_usable() => SourceOutcome::Found(set),
            Ok(Ok(_)) => SourceOutcome::Unavailable("both cookies are required".into()),
            Ok(Err(e)) => SourceOutcome::Unavailable(format!("could not read input: {e}")),
            Err(e) => SourceOutcome::Unavailable(format!("prompt task failed: {e}")),
        }
    }
}

fn prompt_tokens<R: BufRead>(reader: &mut R, show_instructions: bool) -> io::Result<CredentialSet> {
    let mut stderr = io::stderr();
    if show_instructions {
        writeln!(stderr)?;
        writeln!(stderr, "  MANUAL COOKIE SETUP")?;
        writeln!(stderr, "  1. Open x.com in a browser where you are logged in")?;
        writeln!(stderr, "  2. DevTools > Application > Cookies > https://x.com")?;
        writeln!(stderr, "  3. Copy the values of `{AUTH_TOKEN}` and `{CSRF_TOKEN}`")?;
        writeln!(stderr)?;
    }

    let auth_token = ask(reader, &mut stderr, AUTH_TOKEN)?;
    let csrf_token = ask(reader, &mut stderr, CSRF_TOKEN)?;
    Ok(CredentialSet::new(auth_token, csrf_token))
}

fn ask<R: BufRead, W: Write>(reader: &mut R, out: &mut W, name: &str) -> io::Result<String> {
    write!(out, "  Paste {name}: ")?;
    out.flush()?;
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// A provider built from credentials that a source produced.
pub struct Resolved<P> {
    pub provider: P,
    pub credentials: CredentialSet,
    pub origin: CredentialOrigin,
}

/// Tries each source in order until one yields credentials the provider
/// factory accepts. Sets that did not come from the saved file are
/// written back to it.
pub struct CredentialResolver {
    sources: Vec<Box<dyn CredentialSource>>,
    file: CredentialFile,
}

impl CredentialResolver {
    pub fn new(file: CredentialFile) -> Self {
        Self {
            sources: Vec::new(),
            file,
        }
    }

    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub async fn resolve<F: ProviderFactory>(
        &self,
        factory: &F,
    ) -> Result<Resolved<F::Provider>, AppError> {
        for source in &self.sources {
            let origin = source.origin();

            let credentials = match source.load().await {
                SourceOutcome::Found(set) => set,
                SourceOutcome::Unavailable(reason) => {
                    tracing::info!(source = %origin, %reason, "Credential source unavailable");
                    continue;
                }
            };

            if let Err(e) = credentials.validate() {
                tracing::warn!(source = %origin, error = %e, "Rejected incomplete credentials");
                continue;
            }

            let provider = match factory.connect(&credentials) {
                Ok(provider) => provider,
                Err(e) => {
                    tracing::warn!(source = %origin, error = %e, "Failed to apply credentials");
                    continue;
                }
            };

            if origin == CredentialOrigin::File {
                tracing::info!("Loaded saved credentials, no login needed");
            } else {
                match self.file.save(&credentials).await {
                    Ok(()) => tracing::info!(
                        source = %origin,
                        path = %self.file.path().display(),
                        "Credentials applied and saved"
                    ),
                    Err(e) => tracing::warn!(
                        source = %origin,
                        path = %self.file.path().display(),
                        error = %e,
                        "Credentials applied but could not be saved"
                    ),
                }
            }

            return Ok(Resolved {
                provider,
                credentials,
                origin,
            });
        }

        Err(AppError::AuthenticationFailed(format!(
            "none of {} credential source(s) produced a usable credential set",
            self.sources.len()
        )))
    }
}

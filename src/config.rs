//! Runtime configuration of kernel selection.
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Environment variable selecting the backend (`generic`, `tiled` or `accelerated`).
pub const BACKEND_ENV_VAR: &str = "FENRIS_PA_BACKEND";

/// Environment variable enabling the collocated-gradient path (`1`, `true`, `yes` or `on`).
pub const COLLOCATED_ENV_VAR: &str = "FENRIS_PA_COLLOCATED";

/// The execution strategy requested for Apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Per-element kernels with private scratch.
    Generic,
    /// Cooperative thread-block kernels with a shared scratch arena.
    #[default]
    Tiled,
    /// A third-party accelerator, if one is registered and available.
    Accelerated,
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generic => "generic",
            Self::Tiled => "tiled",
            Self::Accelerated => "accelerated",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBackendError(String);

impl Display for ParseBackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "unknown backend `{}`, expected one of generic, tiled, accelerated", self.0)
    }
}

impl std::error::Error for ParseBackendError {}

impl FromStr for Backend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "tiled" => Ok(Self::Tiled),
            "accelerated" => Ok(Self::Accelerated),
            _ => Err(ParseBackendError(s.to_string())),
        }
    }
}

/// Options controlling which kernel variant runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub backend: Backend,
    /// Use the collocated-gradient kernels for 3D problems.
    pub collocated_gradient: bool,
    /// Allow sizes without a specialized kernel to run on the runtime-sized kernels.
    pub runtime_fallback: bool,
    /// Elements per block of the tiled 2D kernels. Chosen from `Q1D` when absent.
    pub batch_size: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            collocated_gradient: false,
            runtime_fallback: true,
            batch_size: None,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl DispatchConfig {
    /// Default configuration, overridden by the process environment.
    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars())
    }

    /// Default configuration, overridden by the given `(name, value)` pairs.
    ///
    /// Unknown variables are ignored. An unparsable backend is logged and ignored.
    pub fn from_env_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (name, value) in vars {
            let value = value.as_ref();
            match name.as_ref() {
                BACKEND_ENV_VAR => match value.parse() {
                    Ok(backend) => config.backend = backend,
                    Err(err) => warn!("Ignoring {BACKEND_ENV_VAR}: {err}"),
                },
                COLLOCATED_ENV_VAR => config.collocated_gradient = is_truthy(value),
                _ => {}
            }
        }
        config
    }

    pub fn with_backend(self, backend: Backend) -> Self {
        Self { backend, ..self }
    }

    pub fn with_collocated_gradient(self, collocated_gradient: bool) -> Self {
        Self {
            collocated_gradient,
            ..self
        }
    }

    pub fn with_runtime_fallback(self, runtime_fallback: bool) -> Self {
        Self {
            runtime_fallback,
            ..self
        }
    }

    pub fn with_batch_size(self, batch_size: Option<usize>) -> Self {
        Self { batch_size, ..self }
    }
}

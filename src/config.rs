use std::{env, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got `{value}`")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Memory layout of the single-image input tensor fed to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`, what PyTorch-exported graphs expect.
    Nchw,
    /// `[1, H, W, 3]`, native TensorFlow/Keras layout.
    Nhwc,
}

impl FromStr for TensorLayout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nchw" => Ok(TensorLayout::Nchw),
            "nhwc" => Ok(TensorLayout::Nhwc),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_path: PathBuf,
    pub class_list_path: PathBuf,
    pub suggestions_path: PathBuf,
    pub static_dir: PathBuf,
    pub input_op: String,
    pub output_op: String,
    pub input_layout: TensorLayout,
    pub model_url: Option<String>,
    pub class_list_url: Option<String>,
    pub suggestions_url: Option<String>,
    pub github_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let body_limit_bytes = {
            let raw = or("BODY_LIMIT_MB", "5");
            let mb = raw.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
                name: "BODY_LIMIT_MB",
                expected: "a valid integer",
                value: raw.clone(),
            })?;
            mb.checked_mul(1024 * 1024)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "BODY_LIMIT_MB",
                    expected: "a size in MiB that fits in memory",
                    value: raw.clone(),
                })?
        };

        let port = {
            let raw = or("PORT", "5020");
            raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a valid number between 0 and 65535",
                value: raw.clone(),
            })?
        };

        let input_layout = {
            let raw = or("MODEL_INPUT_LAYOUT", "nchw");
            raw.parse::<TensorLayout>().map_err(|_| ConfigError::Invalid {
                name: "MODEL_INPUT_LAYOUT",
                expected: "`nchw` or `nhwc`",
                value: raw.clone(),
            })?
        };

        Ok(Config {
            host: or("HOST", "0.0.0.0"),
            port,
            body_limit_bytes,
            model_path: or("MODEL_PATH", "./model/frozen_graph.pb").into(),
            class_list_path: or("CLASS_LIST_PATH", "./model/class_list.txt").into(),
            suggestions_path: or("SUGGESTIONS_PATH", "./model/suggestions.json").into(),
            static_dir: or("STATIC_DIR", "./public").into(),
            input_op: or("MODEL_INPUT_OP", "x"),
            output_op: or("MODEL_OUTPUT_OP", "Identity"),
            input_layout,
            model_url: var("MODEL_URL"),
            class_list_url: var("CLASS_LIST_URL"),
            suggestions_url: var("SUGGESTIONS_URL"),
            github_token: var("GITHUB_TOKEN"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

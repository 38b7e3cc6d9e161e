use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::SessionConfig;

/// `ui_state.json` is expected to be tiny; anything bigger is treated as corrupt.
pub const MAX_UI_STATE_BYTES: u64 = 64 * 1024;

pub const DEFAULT_STORE_URL: &str = "ws://127.0.0.1:8790/ws";
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;
pub const DEFAULT_REFETCH_DELAY_MS: u64 = 300;

fn default_store_url() -> String {
    DEFAULT_STORE_URL.to_owned()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_refetch_delay_ms() -> u64 {
    DEFAULT_REFETCH_DELAY_MS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedUiState {
    #[serde(default = "default_store_url")]
    pub store_url: String,
    /// Tab the dashboard was showing when it was last closed.
    #[serde(default)]
    pub current_tab_id: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_refetch_delay_ms")]
    pub refetch_delay_ms: u64,
}

impl Default for SavedUiState {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            current_tab_id: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            refetch_delay_ms: DEFAULT_REFETCH_DELAY_MS,
        }
    }
}

impl SavedUiState {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            refetch_delay: Duration::from_millis(self.refetch_delay_ms),
        }
    }
}

#[derive(Debug)]
pub enum UiStateLoadError {
    Metadata(io::Error),
    TooLarge { size: u64, max: u64 },
    Read(io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for UiStateLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiStateLoadError::Metadata(e) => write!(f, "metadata read failed: {e}"),
            UiStateLoadError::TooLarge { size, max } => {
                write!(f, "file too large: {size} bytes (max {max})")
            }
            UiStateLoadError::Read(e) => write!(f, "read failed: {e}"),
            UiStateLoadError::Parse(e) => write!(f, "parse failed: {e}"),
        }
    }
}

impl std::error::Error for UiStateLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UiStateLoadError::Metadata(e) => Some(e),
            UiStateLoadError::Read(e) => Some(e),
            UiStateLoadError::Parse(e) => Some(e),
            UiStateLoadError::TooLarge { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum UiStateSaveError {
    CreateDir(io::Error),
    Serialize(serde_json::Error),
    WriteTmp(io::Error),
    Rename(io::Error),
}

impl std::fmt::Display for UiStateSaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiStateSaveError::CreateDir(e) => write!(f, "create dir failed: {e}"),
            UiStateSaveError::Serialize(e) => write!(f, "serialize failed: {e}"),
            UiStateSaveError::WriteTmp(e) => write!(f, "tmp write failed: {e}"),
            UiStateSaveError::Rename(e) => write!(f, "rename failed: {e}"),
        }
    }
}

impl std::error::Error for UiStateSaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UiStateSaveError::CreateDir(e) => Some(e),
            UiStateSaveError::Serialize(e) => Some(e),
            UiStateSaveError::WriteTmp(e) => Some(e),
            UiStateSaveError::Rename(e) => Some(e),
        }
    }
}

/// `%LOCALAPPDATA%\ClipDash\ui_state.json` on Windows,
/// `$XDG_CONFIG_HOME/clipdash/ui_state.json` elsewhere, falling back to the
/// working directory.
pub fn ui_state_path() -> PathBuf {
    let dir = if let Some(base) = std::env::var_os("LOCALAPPDATA") {
        PathBuf::from(base).join("ClipDash")
    } else if let Some(base) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(base).join("clipdash")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".config").join("clipdash")
    } else {
        PathBuf::from(".")
    };
    dir.join("ui_state.json")
}

pub fn parse_ui_state_json(data: &str) -> Result<SavedUiState, serde_json::Error> {
    serde_json::from_str::<SavedUiState>(data)
}

pub fn load_ui_state_from_path(path: &Path) -> Result<SavedUiState, UiStateLoadError> {
    let meta = fs::metadata(path).map_err(UiStateLoadError::Metadata)?;
    if meta.len() > MAX_UI_STATE_BYTES {
        return Err(UiStateLoadError::TooLarge {
            size: meta.len(),
            max: MAX_UI_STATE_BYTES,
        });
    }

    let data = fs::read_to_string(path).map_err(UiStateLoadError::Read)?;
    parse_ui_state_json(&data).map_err(UiStateLoadError::Parse)
}

/// Missing or unreadable state falls back to defaults.
pub fn load_ui_state() -> SavedUiState {
    let path = ui_state_path();
    match load_ui_state_from_path(&path) {
        Ok(state) => state,
        Err(UiStateLoadError::Metadata(err)) if err.kind() == io::ErrorKind::NotFound => {
            SavedUiState::default()
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), "ignoring ui state: {}", err);
            SavedUiState::default()
        }
    }
}

pub fn save_ui_state_to_path(path: &Path, state: &SavedUiState) -> Result<(), UiStateSaveError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(UiStateSaveError::CreateDir)?;
    }

    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(state).map_err(UiStateSaveError::Serialize)?;
    fs::write(&tmp, payload.as_bytes()).map_err(UiStateSaveError::WriteTmp)?;

    if path.exists() {
        let _ = fs::remove_file(path);
    }

    fs::rename(&tmp, path).map_err(UiStateSaveError::Rename)?;
    Ok(())
}

pub fn save_ui_state_with_retry(path: &Path, state: &SavedUiState) -> Result<(), UiStateSaveError> {
    const MAX_ATTEMPTS: u32 = 3;
    const BACKOFF_BASE_MS: u64 = 50;

    let mut attempt = 1;
    loop {
        match save_ui_state_to_path(path, state) {
            Ok(()) => return Ok(()),
            Err(err) if attempt >= MAX_ATTEMPTS => return Err(err),
            Err(err) => {
                tracing::debug!(attempt, "ui state save failed, retrying: {}", err);
                let backoff_ms = BACKOFF_BASE_MS.saturating_mul(1_u64 << (attempt - 1));
                std::thread::sleep(Duration::from_millis(backoff_ms));
                attempt += 1;
            }
        }
    }
}

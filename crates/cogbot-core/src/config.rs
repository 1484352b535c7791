use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{RoleId, UserId},
    ephemeral::{DEFAULT_MARKER, DEFAULT_TIMEOUT},
    errors::Error,
    Result,
};

const DEFAULT_HELP_PAGE_SIZE: usize = 7;
const DEFAULT_CATALOG: &str = "commands.json";
/// Upper bound for `TRASH_TIMEOUT_SECS` (one week).
const MAX_TRASH_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Typed configuration for the add-on layer.
#[derive(Clone, Debug)]
pub struct Config {
    // Permissions
    pub staff_role_id: RoleId,
    pub owner_ids: Vec<UserId>,

    // Ephemeral messages
    pub trash_emoji: String,
    pub trash_timeout: Duration,

    // Help output
    pub help_page_size: usize,
    pub command_catalog: PathBuf,
    pub staff_help_file: Option<PathBuf>,
}

impl Config {
    /// Load from the process environment, after merging `.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let staff_role_id = get("STAFF_ROLE_ID").ok_or_else(|| {
            Error::Config("STAFF_ROLE_ID environment variable is required".to_string())
        })?;
        let staff_role_id = staff_role_id
            .trim()
            .parse::<u64>()
            .map(RoleId)
            .map_err(|e| Error::Config(format!("STAFF_ROLE_ID is not a valid id: {e}")))?;

        let owner_ids = parse_csv_u64(get("BOT_OWNER_IDS"))
            .into_iter()
            .map(UserId)
            .collect();

        let trash_emoji = get("TRASH_EMOJI")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_MARKER.to_string());
        let trash_timeout = match get("TRASH_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs <= MAX_TRASH_TIMEOUT_SECS => Duration::from_secs(secs),
                _ => {
                    return Err(Error::Config(format!(
                        "TRASH_TIMEOUT_SECS must be whole seconds between 0 and {MAX_TRASH_TIMEOUT_SECS}, got {raw:?}"
                    )))
                }
            },
        };

        let help_page_size = match get("HELP_PAGE_SIZE") {
            None => DEFAULT_HELP_PAGE_SIZE,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(Error::Config(format!(
                        "HELP_PAGE_SIZE must be a positive integer, got {raw:?}"
                    )))
                }
            },
        };

        let command_catalog =
            PathBuf::from(get("COMMAND_CATALOG").unwrap_or_else(|| DEFAULT_CATALOG.to_string()));
        let staff_help_file = get("STAFF_HELP_FILE").map(PathBuf::from);

        Ok(Self {
            staff_role_id,
            owner_ids,
            trash_emoji,
            trash_timeout,
            help_page_size,
            command_catalog,
            staff_help_file,
        })
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_csv_u64(v: Option<String>) -> Vec<u64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<u64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

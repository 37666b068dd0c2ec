use crate::error::{ErrorCode, MockError, MockResult};
use crate::storage::{parent_dir, resolve_relative};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of items per `item delete -` chunk.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// A response generation run, as read from YAML or JSON.
///
/// Relative paths are resolved against the config file's directory by
/// [`GeneratorConfig::load`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Index file of the response directory to fill.
    pub response_dir_file: PathBuf,
    /// Blob root for new directories.
    pub response_path: PathBuf,
    /// Optional root for stored input payloads.
    #[serde(default)]
    pub input_path: Option<PathBuf>,
    /// The real program to record from.
    pub program: PathBuf,
    /// Extra environment for the real program.
    #[serde(default)]
    pub program_env: BTreeMap<String, String>,
    /// Register the directory as a scenario state when done.
    #[serde(default)]
    pub state: Option<StateRegistration>,
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,
}

/// Scenario state to register for the generated directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRegistration {
    pub state_dir: PathBuf,
    pub iteration: usize,
    #[serde(default)]
    pub set_env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub pop_env_vars: BTreeSet<String>,
}

/// One named query to record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub expected_return: i32,
    #[serde(default)]
    pub changes_state: bool,
    #[serde(flatten)]
    pub kind: QueryKind,
}

fn enabled_by_default() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Every query the generator knows how to record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QueryKind {
    ItemGet {
        item: String,
        #[serde(default)]
        vault: Option<String>,
        #[serde(default)]
        include_archive: bool,
        #[serde(default)]
        fields: Vec<String>,
    },
    ItemList {
        #[serde(default)]
        categories: Vec<String>,
        #[serde(default)]
        include_archive: bool,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        vault: Option<String>,
    },
    ItemDelete {
        item: String,
        #[serde(default)]
        vault: Option<String>,
        #[serde(default)]
        archive: bool,
    },
    /// List matching items, then delete them in chunks piped as JSON.
    ItemDeleteMultiple {
        vault: String,
        #[serde(default)]
        categories: Vec<String>,
        #[serde(default)]
        include_archive: bool,
        #[serde(default)]
        tags: Vec<String>,
        /// `*`/`?` pattern matched against item titles.
        #[serde(default)]
        title_glob: Option<String>,
        #[serde(default)]
        archive: bool,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
    },
    ItemEdit {
        item: String,
        #[serde(default)]
        vault: Option<String>,
        edit: ItemEdit,
    },
    /// Item metadata plus document bytes, committed together.
    DocumentGet {
        item: String,
        #[serde(default)]
        vault: Option<String>,
        #[serde(default)]
        include_archive: bool,
        /// Fetch the bytes from this identifier instead, e.g. one known to
        /// fail, while still recording under `item`.
        #[serde(default)]
        alternate_item: Option<String>,
    },
    DocumentDelete {
        item: String,
        #[serde(default)]
        vault: Option<String>,
        #[serde(default)]
        archive: bool,
    },
    VaultGet {
        vault: String,
    },
    VaultList {
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        user: Option<String>,
    },
    UserGet {
        user: String,
    },
    UserList {
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        vault: Option<String>,
    },
    GroupGet {
        group: String,
    },
    GroupList {
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        vault: Option<String>,
    },
    CliVersion,
    Whoami {
        #[serde(default)]
        account: Option<String>,
    },
    AccountList,
}

/// Edits supported by `item-edit` queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ItemEdit {
    SetFavorite {
        favorite: bool,
    },
    SetTitle {
        title: String,
    },
    SetTags {
        tags: Vec<String>,
    },
    SetPassword {
        password: String,
        field_label: String,
        #[serde(default)]
        section_label: Option<String>,
    },
    SetUrl {
        url: String,
    },
    GeneratePassword {
        recipe: String,
    },
}

impl GeneratorConfig {
    /// Read a config file: YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn load(path: &Path) -> MockResult<Self> {
        let data = fs::read_to_string(path).map_err(|err| {
            MockError::io(ErrorCode::Config, "failed to read generator config", err).with_path(path)
        })?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let mut config: Self = if is_yaml {
            serde_yml::from_str(&data).map_err(|err| {
                MockError::io(ErrorCode::Config, "failed to parse generator config", err)
                    .with_path(path)
            })?
        } else {
            serde_json::from_str(&data).map_err(|err| {
                MockError::io(ErrorCode::Config, "failed to parse generator config", err)
                    .with_path(path)
            })?
        };
        config.resolve_paths(&parent_dir(path));
        config.validate()?;
        Ok(config)
    }

    /// Make relative paths relative to `base`. A bare program name is left
    /// alone so it is looked up on `PATH`.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.response_dir_file = resolve_relative(base, &self.response_dir_file);
        self.response_path = resolve_relative(base, &self.response_path);
        self.input_path = self
            .input_path
            .take()
            .map(|path| resolve_relative(base, &path));
        if self.program.components().count() > 1 {
            self.program = resolve_relative(base, &self.program);
        }
        if let Some(state) = self.state.as_mut() {
            state.state_dir = resolve_relative(base, &state.state_dir);
        }
    }

    /// Reject configs that would fail halfway through a run.
    pub fn validate(&self) -> MockResult<()> {
        let mut names = BTreeSet::new();
        for query in &self.queries {
            if query.name.is_empty() {
                return Err(MockError::config("query name must not be empty", None));
            }
            if !names.insert(query.name.as_str()) {
                return Err(MockError::config(
                    "duplicate query name",
                    serde_json::json!({ "name": query.name }),
                ));
            }
            if let QueryKind::ItemDeleteMultiple {
                batch_size,
                title_glob,
                ..
            } = &query.kind
            {
                if *batch_size == 0 {
                    return Err(MockError::config(
                        "batch_size must be at least 1",
                        serde_json::json!({ "name": query.name }),
                    ));
                }
                if let Some(pattern) = title_glob {
                    title_matcher(pattern)?;
                }
            }
        }
        Ok(())
    }
}

/// Compile a `title_glob` pattern.
pub(crate) fn title_matcher(pattern: &str) -> MockResult<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|err| {
            MockError::config(
                "invalid title_glob pattern",
                serde_json::json!({ "pattern": pattern, "source": err.to_string() }),
            )
        })
}

impl QueryKind {
    /// The `type` tag of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ItemGet { .. } => "item-get",
            Self::ItemList { .. } => "item-list",
            Self::ItemDelete { .. } => "item-delete",
            Self::ItemDeleteMultiple { .. } => "item-delete-multiple",
            Self::ItemEdit { .. } => "item-edit",
            Self::DocumentGet { .. } => "document-get",
            Self::DocumentDelete { .. } => "document-delete",
            Self::VaultGet { .. } => "vault-get",
            Self::VaultList { .. } => "vault-list",
            Self::UserGet { .. } => "user-get",
            Self::UserList { .. } => "user-list",
            Self::GroupGet { .. } => "group-get",
            Self::GroupList { .. } => "group-list",
            Self::CliVersion => "cli-version",
            Self::Whoami { .. } => "whoami",
            Self::AccountList => "account-list",
        }
    }
}

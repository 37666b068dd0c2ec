//! Argument vectors for each query kind, program name excluded.

use crate::generator::config::{ItemEdit, QueryKind};

/// Small builder for argument vectors.
#[derive(Debug, Default)]
struct Argv(Vec<String>);

impl Argv {
    fn new<const N: usize>(words: [&str; N]) -> Self {
        Self(words.iter().map(ToString::to_string).collect())
    }

    fn arg(mut self, value: impl Into<String>) -> Self {
        self.0.push(value.into());
        self
    }

    fn opt(self, flag: &str, value: Option<&String>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value.clone()),
            None => self,
        }
    }

    fn list(self, flag: &str, values: &[String]) -> Self {
        if values.is_empty() {
            self
        } else {
            self.arg(flag).arg(values.join(","))
        }
    }

    fn flag(self, flag: &str, enabled: bool) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    fn json(self) -> Vec<String> {
        self.arg("--format").arg("json").0
    }

    fn finish(self) -> Vec<String> {
        self.0
    }
}

/// `item get <item> [--vault V] [--include-archive] [--fields a,b] --format json`
pub fn item_get(item: &str, vault: Option<&String>, include_archive: bool, fields: &[String]) -> Vec<String> {
    Argv::new(["item", "get"])
        .arg(item)
        .opt("--vault", vault)
        .flag("--include-archive", include_archive)
        .list("--fields", fields)
        .json()
}

/// `item list [--categories ..] [--include-archive] [--tags ..] [--vault V] --format json`
pub fn item_list(
    categories: &[String],
    include_archive: bool,
    tags: &[String],
    vault: Option<&String>,
) -> Vec<String> {
    Argv::new(["item", "list"])
        .list("--categories", categories)
        .flag("--include-archive", include_archive)
        .list("--tags", tags)
        .opt("--vault", vault)
        .json()
}

/// `item delete <item> [--archive] [--vault V]`; `-` reads items from stdin.
pub fn item_delete(item: &str, archive: bool, vault: Option<&String>) -> Vec<String> {
    Argv::new(["item", "delete"])
        .arg(item)
        .flag("--archive", archive)
        .opt("--vault", vault)
        .finish()
}

/// `item edit <item> [--vault V] <edit...> --format json`
pub fn item_edit(item: &str, vault: Option<&String>, edit: &ItemEdit) -> Vec<String> {
    let argv = Argv::new(["item", "edit"]).arg(item).opt("--vault", vault);
    let argv = match edit {
        ItemEdit::SetFavorite { favorite } => argv.arg("--favorite").arg(favorite.to_string()),
        ItemEdit::SetTitle { title } => argv.arg("--title").arg(title.clone()),
        ItemEdit::SetTags { tags } => argv.arg("--tags").arg(tags.join(",")),
        ItemEdit::SetUrl { url } => argv.arg("--url").arg(url.clone()),
        ItemEdit::GeneratePassword { recipe } => argv.arg(format!("--generate-password={recipe}")),
        ItemEdit::SetPassword {
            password,
            field_label,
            section_label,
        } => {
            let field = match section_label {
                Some(section) => format!("{section}.{field_label}"),
                None => field_label.clone(),
            };
            argv.arg(format!("{field}[password]={password}"))
        }
    };
    argv.json()
}

/// `document get <item> [--vault V] [--include-archive]`
pub fn document_get(item: &str, vault: Option<&String>, include_archive: bool) -> Vec<String> {
    Argv::new(["document", "get"])
        .arg(item)
        .opt("--vault", vault)
        .flag("--include-archive", include_archive)
        .finish()
}

/// `document delete <item> [--archive] [--vault V]`
pub fn document_delete(item: &str, archive: bool, vault: Option<&String>) -> Vec<String> {
    Argv::new(["document", "delete"])
        .arg(item)
        .flag("--archive", archive)
        .opt("--vault", vault)
        .finish()
}

/// Argv for kinds that map to exactly one command.
///
/// Returns `None` for kinds that need more than one command or a preliminary
/// listing (`document-get`, `item-delete-multiple`).
pub fn single_command(kind: &QueryKind) -> Option<Vec<String>> {
    let argv = match kind {
        QueryKind::ItemGet {
            item,
            vault,
            include_archive,
            fields,
        } => item_get(item, vault.as_ref(), *include_archive, fields),
        QueryKind::ItemList {
            categories,
            include_archive,
            tags,
            vault,
        } => item_list(categories, *include_archive, tags, vault.as_ref()),
        QueryKind::ItemDelete {
            item,
            vault,
            archive,
        } => item_delete(item, *archive, vault.as_ref()),
        QueryKind::ItemEdit { item, vault, edit } => item_edit(item, vault.as_ref(), edit),
        QueryKind::DocumentDelete {
            item,
            vault,
            archive,
        } => document_delete(item, *archive, vault.as_ref()),
        QueryKind::VaultGet { vault } => Argv::new(["vault", "get"]).arg(vault.clone()).json(),
        QueryKind::VaultList { group, user } => Argv::new(["vault", "list"])
            .opt("--group", group.as_ref())
            .opt("--user", user.as_ref())
            .json(),
        QueryKind::UserGet { user } => Argv::new(["user", "get"]).arg(user.clone()).json(),
        QueryKind::UserList { group, vault } => Argv::new(["user", "list"])
            .opt("--group", group.as_ref())
            .opt("--vault", vault.as_ref())
            .json(),
        QueryKind::GroupGet { group } => Argv::new(["group", "get"]).arg(group.clone()).json(),
        QueryKind::GroupList { user, vault } => Argv::new(["group", "list"])
            .opt("--user", user.as_ref())
            .opt("--vault", vault.as_ref())
            .json(),
        QueryKind::CliVersion => Argv::new(["--version"]).finish(),
        QueryKind::Whoami { account } => Argv::default()
            .opt("--account", account.as_ref())
            .arg("whoami")
            .json(),
        QueryKind::AccountList => Argv::new(["account", "list"]).json(),
        QueryKind::DocumentGet { .. } | QueryKind::ItemDeleteMultiple { .. } => return None,
    };
    Some(argv)
}

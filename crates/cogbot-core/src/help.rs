//! Help output built from command documentation.
//!
//! Each command's doc blob is parsed once, when the command is registered.
//! Rendering then only filters by the viewer's permissions and paginates.

use std::{fs, path::Path};

use serde::Deserialize;
use tracing::warn;

use crate::{
    domain::CallerIdentity,
    metadata::{self, ParsedMetadata},
    pagination::{paginate, Page, PageLayout},
    permission::PermissionEvaluator,
    Result,
};

const HELP_TITLE: &str = "Help";
const LIST_TITLE: &str = "Command list";
const LIST_FOOTER: &str = "Do `!help commandname` for help on a command";
const NAME_COLUMN: usize = 20;

/// A command as declared by the embedding bot.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Grouping shown in listings (a cog / module name).
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub doc: Option<String>,
    /// Answer `help <name>` with the staff appendix instead of the doc.
    #[serde(default)]
    pub staff_help: bool,
}

/// A registered command with its pre-parsed metadata.
#[derive(Clone, Debug)]
pub struct CommandEntry {
    pub name: String,
    pub aliases: Vec<String>,
    pub group: String,
    /// `None` for undocumented commands, which are never listed.
    pub metadata: Option<ParsedMetadata>,
    pub staff_help: bool,
}

impl From<CommandSpec> for CommandEntry {
    fn from(spec: CommandSpec) -> Self {
        Self {
            metadata: spec.doc.as_deref().map(metadata::parse),
            name: spec.name,
            aliases: spec.aliases,
            group: spec.group,
            staff_help: spec.staff_help,
        }
    }
}

impl CommandEntry {
    fn badge(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.primary_role())
            .unwrap_or("")
    }

    fn aliases_line(&self) -> String {
        if self.aliases.is_empty() {
            return String::new();
        }
        let quoted = self
            .aliases
            .iter()
            .map(|a| format!("`{a}`"))
            .collect::<Vec<_>>()
            .join(",");
        format!("Aliases: {quoted}\n")
    }

    fn list_line(&self) -> String {
        format!(
            "!{:<width$} [{}]",
            self.name,
            self.aliases.join("|"),
            width = NAME_COLUMN
        )
    }
}

/// Result of looking up help for one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelpLookup {
    Found(Page),
    NotFound(Page),
}

impl HelpLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_page(self) -> Page {
        match self {
            Self::Found(p) | Self::NotFound(p) => p,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HelpCatalog {
    commands: Vec<CommandEntry>,
    permissions: PermissionEvaluator,
    staff_appendix: Option<String>,
}

impl HelpCatalog {
    pub fn new(permissions: PermissionEvaluator) -> Self {
        Self {
            commands: Vec::new(),
            permissions,
            staff_appendix: None,
        }
    }

    pub fn from_specs(
        permissions: PermissionEvaluator,
        specs: impl IntoIterator<Item = CommandSpec>,
    ) -> Self {
        let mut catalog = Self::new(permissions);
        for spec in specs {
            catalog.register(spec);
        }
        catalog
    }

    /// Extra page shown to staff at the end of the help listing.
    pub fn with_staff_appendix(mut self, text: impl Into<String>) -> Self {
        self.staff_appendix = Some(text.into());
        self
    }

    /// Register a command, replacing any earlier one with the same name.
    pub fn register(&mut self, spec: CommandSpec) {
        let entry = CommandEntry::from(spec);
        if let Some(existing) = self.commands.iter_mut().find(|c| c.name == entry.name) {
            warn!(command = %entry.name, "command registered twice; replacing");
            *existing = entry;
            return;
        }
        self.commands.push(entry);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Name first, then aliases.
    pub fn resolve(&self, query: &str) -> Option<&CommandEntry> {
        self.commands
            .iter()
            .find(|c| c.name == query)
            .or_else(|| self.commands.iter().find(|c| c.aliases.iter().any(|a| a == query)))
    }

    fn is_visible_to(&self, entry: &CommandEntry, viewer: &CallerIdentity) -> bool {
        entry
            .metadata
            .as_ref()
            .is_some_and(|m| self.permissions.is_visible(&m.role_tags, viewer))
    }

    /// Documented commands the viewer may see, in registration order.
    pub fn visible_commands<'a>(
        &'a self,
        viewer: &'a CallerIdentity,
    ) -> impl Iterator<Item = &'a CommandEntry> + 'a {
        self.commands
            .iter()
            .filter(move |c| self.is_visible_to(c, viewer))
    }

    /// Paged overview: one short entry per visible command, sorted by group.
    pub fn help_pages(&self, viewer: &CallerIdentity, page_size: usize) -> Vec<Page> {
        let mut visible: Vec<&CommandEntry> = self.visible_commands(viewer).collect();
        visible.sort_by(|a, b| a.group.cmp(&b.group));

        let mut pages = paginate(
            &visible,
            page_size,
            HELP_TITLE,
            |c| {
                let summary = c.metadata.as_ref().map(|m| m.summary()).unwrap_or("");
                format!(
                    "`{}`:  {}\n{}\n{}",
                    c.name.trim(),
                    c.badge(),
                    summary,
                    c.aliases_line()
                )
            },
            &PageLayout::default(),
        );

        if let Some(appendix) = &self.staff_appendix {
            if self.permissions.is_staff(viewer) {
                pages.push(Page::single(HELP_TITLE, appendix.clone()));
            }
        }
        pages
    }

    /// Compact listing grouped by group, in registration order.
    pub fn command_list(&self, viewer: &CallerIdentity) -> Page {
        let mut groups: Vec<(&str, Vec<&CommandEntry>)> = Vec::new();
        for entry in self.visible_commands(viewer) {
            match groups.iter().position(|(g, _)| *g == entry.group) {
                Some(i) => groups[i].1.push(entry),
                None => groups.push((entry.group.as_str(), vec![entry])),
            }
        }

        let mut body = String::new();
        for (group, members) in groups {
            let lines = members
                .iter()
                .map(|c| c.list_line())
                .collect::<Vec<_>>()
                .join("\n");
            body.push_str(&format!("**{group}**\n```scss\n{lines}```\n"));
        }
        body.push('\n');
        body.push_str(LIST_FOOTER);

        Page::single(LIST_TITLE, body)
    }

    /// Full help for one command, looked up by name or alias.
    ///
    /// Commands the viewer may not see are reported as missing. Commands
    /// flagged `staff_help` show the staff appendix when one is set.
    pub fn help_for(&self, query: &str, viewer: &CallerIdentity) -> HelpLookup {
        let Some(entry) = self
            .resolve(query)
            .filter(|c| self.is_visible_to(c, viewer))
        else {
            return HelpLookup::NotFound(Page::single(
                "Command not found",
                format!("Command `{query}` is not a valid command"),
            ));
        };

        if let Some(appendix) = self.staff_appendix.as_ref().filter(|_| entry.staff_help) {
            return HelpLookup::Found(Page::single(entry.name.clone(), appendix.clone()));
        }

        let description = entry
            .metadata
            .as_ref()
            .map(|m| m.description.trim_matches('\n'))
            .unwrap_or("");
        HelpLookup::Found(Page::single(
            entry.name.clone(),
            format!("{}\n{}\n{}", entry.badge(), description, entry.aliases_line()),
        ))
    }
}

/// Read a JSON array of [`CommandSpec`]s.
pub fn load_specs(path: &Path) -> Result<Vec<CommandSpec>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoleId, UserId};

    const STAFF: RoleId = RoleId(77);

    fn spec(name: &str, group: &str, aliases: &[&str], doc: Option<&str>) -> CommandSpec {
        CommandSpec {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            group: group.to_string(),
            doc: doc.map(|d| d.to_string()),
            staff_help: false,
        }
    }

    fn catalog() -> HelpCatalog {
        HelpCatalog::from_specs(
            PermissionEvaluator::new(STAFF),
            vec![
                spec("tiktok", "Misc", &[], Some("\n    Sends a video\n    example: link\n")),
                spec("ban", "Moderation", &["b"], Some("Bans a member\n#STAFF\n")),
                spec("reload", "Admin", &[], Some("Reloads a cog\n#OWNER")),
                spec("secret", "Misc", &[], None),
                spec("help", "Help", &["h", "commands"], Some("Shows help")),
            ],
        )
    }

    fn member() -> CallerIdentity {
        CallerIdentity::member(UserId(1))
    }

    fn staff() -> CallerIdentity {
        CallerIdentity::member(UserId(2)).with_roles([STAFF])
    }

    #[test]
    fn help_pages_hide_restricted_and_undocumented_commands() {
        let pages = catalog().help_pages(&member(), 7);
        assert_eq!(pages.len(), 1);
        let body = &pages[0].body;
        assert!(body.contains("`tiktok`"));
        assert!(body.contains("`help`"));
        assert!(!body.contains("`ban`"));
        assert!(!body.contains("`reload`"));
        assert!(!body.contains("`secret`"));
        assert_eq!(pages[0].title, "Help - 1/1");
    }

    #[test]
    fn help_entries_are_sorted_by_group_and_show_badge_and_aliases() {
        let pages = catalog().help_pages(&staff(), 7);
        let body = &pages[0].body;

        // Help < Misc < Moderation
        let help = body.find("`help`").unwrap();
        let tiktok = body.find("`tiktok`").unwrap();
        let ban = body.find("`ban`").unwrap();
        assert!(help < tiktok && tiktok < ban);

        assert!(body.contains("`ban`:  STAFF\nBans a member\nAliases: `b`\n"));
        assert!(body.contains("`tiktok`:  \nSends a video\n"));
    }

    #[test]
    fn help_pages_respect_page_size() {
        let pages = catalog().help_pages(&staff(), 1);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].title, "Help - 3/3");
    }

    #[test]
    fn staff_appendix_only_for_staff() {
        let cat = catalog().with_staff_appendix("!ban <user> <reason>");
        assert_eq!(cat.help_pages(&member(), 7).len(), 1);

        let pages = cat.help_pages(&staff(), 7);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].title, "Help");
        assert_eq!(pages[1].body, "!ban <user> <reason>");
    }

    #[test]
    fn command_list_groups_and_pads_names() {
        let page = catalog().command_list(&member());
        assert_eq!(page.title, "Command list");
        assert!(page.body.starts_with("**Misc**\n```scss\n!tiktok"));
        assert!(page
            .body
            .contains("**Help**\n```scss\n!help                 [h|commands]```"));
        assert!(!page.body.contains("Moderation"));
        assert!(page.body.ends_with(LIST_FOOTER));
    }

    #[test]
    fn help_for_resolves_aliases() {
        let lookup = catalog().help_for("b", &staff());
        assert!(lookup.is_found());
        let page = lookup.into_page();
        assert_eq!(page.title, "ban");
        assert_eq!(page.body, "STAFF\nBans a member\nAliases: `b`\n");
    }

    #[test]
    fn moderation_commands_answer_with_staff_appendix() {
        let mut cat = catalog();
        cat.register(CommandSpec {
            staff_help: true,
            ..spec("kick", "Moderation", &["k"], Some("Kicks a member\n#STAFF"))
        });

        // Without an appendix the doc is used as usual.
        let page = cat.help_for("kick", &staff()).into_page();
        assert_eq!(page.body, "STAFF\nKicks a member\nAliases: `k`\n");

        let cat = cat.with_staff_appendix("!kick <user> <reason>");
        let lookup = cat.help_for("k", &staff());
        assert!(lookup.is_found());
        let page = lookup.into_page();
        assert_eq!(page.title, "kick");
        assert_eq!(page.body, "!kick <user> <reason>");

        assert!(!cat.help_for("kick", &member()).is_found());
        assert_eq!(
            cat.help_for("ban", &staff()).into_page().body,
            "STAFF\nBans a member\nAliases: `b`\n"
        );
    }

    #[test]
    fn help_for_hidden_or_unknown_is_not_found() {
        let cat = catalog();
        for query in ["ban", "nope", "secret"] {
            let lookup = cat.help_for(query, &member());
            assert!(!lookup.is_found(), "{query}");
            assert_eq!(
                lookup.into_page().body,
                format!("Command `{query}` is not a valid command")
            );
        }
    }

    #[test]
    fn reregistering_replaces_entry() {
        let mut cat = catalog();
        let before = cat.len();
        cat.register(spec("ban", "Moderation", &[], Some("Bans, now open")));
        assert_eq!(cat.len(), before);
        assert!(cat.help_for("ban", &member()).is_found());
        assert!(!cat.help_for("b", &member()).is_found());
    }

    #[test]
    fn specs_deserialize_with_defaults() {
        let specs: Vec<CommandSpec> =
            serde_json::from_str(r#"[{"name":"ping"},{"name":"ban","aliases":["b"],"group":"Mod","doc":"x\n#STAFF"}]"#)
                .unwrap();
        assert_eq!(specs.len(), 2);
        assert!(specs[0].doc.is_none());
        assert_eq!(specs[1].aliases, vec!["b".to_string()]);
    }
}

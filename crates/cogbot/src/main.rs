use std::{io::Read, sync::Arc};

use anyhow::{bail, Context};
use tracing::info;

use cogbot_core::{
    config::Config,
    domain::{CallerIdentity, ChatId, RoleId, UserId},
    ephemeral::EphemeralController,
    help::{load_specs, HelpCatalog},
    markup,
    messaging::{bus::ReactionBus, port::MessagingPort},
    permission::PermissionEvaluator,
};

mod console;

use console::{spawn_stdin_reactions, ConsoleMessenger};

const CONSOLE_CHAT: ChatId = ChatId(0);

const USAGE: &str = "usage: cogbot [--user ID] [--roles ID,ID,...] <commands | help [NAME] | mc2md>";

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Commands,
    Help(Option<String>),
    Mc2Md,
}

#[derive(Debug)]
struct Args {
    user_id: UserId,
    roles: Vec<RoleId>,
    action: Action,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut user_id = UserId(0);
    let mut roles = Vec::new();
    let mut positional = Vec::new();

    let mut it = raw.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--user" => {
                let v = it.next().context("--user needs a value")?;
                user_id = UserId(v.trim().parse().context("--user must be numeric")?);
            }
            "--roles" => {
                let v = it.next().context("--roles needs a value")?;
                for part in v.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    roles.push(RoleId(part.parse().context("--roles must be numeric ids")?));
                }
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let action = match positional.next().as_deref() {
        Some("commands") => Action::Commands,
        Some("help") => Action::Help(positional.next()),
        Some("mc2md") => Action::Mc2Md,
        _ => bail!("{USAGE}"),
    };

    Ok(Args {
        user_id,
        roles,
        action,
    })
}

fn load_catalog(cfg: &Config) -> anyhow::Result<HelpCatalog> {
    let specs = load_specs(&cfg.command_catalog).with_context(|| {
        format!(
            "failed to load command catalog {}",
            cfg.command_catalog.display()
        )
    })?;
    let mut catalog = HelpCatalog::from_specs(PermissionEvaluator::new(cfg.staff_role_id), specs);

    if let Some(path) = &cfg.staff_help_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read staff help {}", path.display()))?;
        catalog = catalog.with_staff_appendix(text);
    }

    info!(commands = catalog.len(), "command catalog loaded");
    Ok(catalog)
}

/// Everything the catalog-backed actions need.
struct Setup {
    cfg: Config,
    catalog: HelpCatalog,
    viewer: CallerIdentity,
    console: Arc<ConsoleMessenger>,
}

impl Setup {
    fn load(user_id: UserId, roles: Vec<RoleId>) -> anyhow::Result<Self> {
        let cfg = Config::load()?;
        let catalog = load_catalog(&cfg)?;

        let mut viewer = CallerIdentity::member(user_id).with_roles(roles);
        viewer.is_owner = cfg.is_owner(user_id);

        Ok(Self {
            cfg,
            catalog,
            viewer,
            console: Arc::new(ConsoleMessenger::new()),
        })
    }
}

fn convert_stdin() -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    println!("{}", markup::convert(&input));
    Ok(())
}

async fn show_help(setup: Setup, query: Option<String>) -> anyhow::Result<()> {
    let messenger: Arc<dyn MessagingPort> = setup.console;

    if let Some(query) = query {
        let page = setup.catalog.help_for(&query, &setup.viewer).into_page();
        messenger.send_page(CONSOLE_CHAT, &page).await?;
        return Ok(());
    }

    let pages = setup
        .catalog
        .help_pages(&setup.viewer, setup.cfg.help_page_size);
    if pages.is_empty() {
        messenger
            .send_text(CONSOLE_CHAT, "No commands available.")
            .await?;
    }
    for page in &pages {
        messenger.send_page(CONSOLE_CHAT, page).await?;
    }
    Ok(())
}

/// Send the command list as a removable message and wait for its session.
async fn list_commands(setup: Setup) -> anyhow::Result<()> {
    let bus = ReactionBus::default();
    let messenger: Arc<dyn MessagingPort> = setup.console.clone();
    let controller =
        EphemeralController::from_config(&setup.cfg, messenger, Arc::new(bus.clone()));

    let page = setup.catalog.command_list(&setup.viewer);
    let handle = controller
        .send_page_ephemeral(CONSOLE_CHAT, &page, setup.viewer.user_id)
        .await?;

    let console = setup.console.clone();
    let reader = spawn_stdin_reactions(bus, CONSOLE_CHAT, setup.viewer.clone(), move || {
        console.last_sent()
    });

    let session = handle.finished().await?;
    reader.abort();
    info!(state = ?session.state, "command list session finished");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cogbot_core::logging::init("cogbot")?;

    let args = parse_args(std::env::args().skip(1))?;
    match args.action {
        Action::Mc2Md => convert_stdin(),
        Action::Help(query) => show_help(Setup::load(args.user_id, args.roles)?, query).await,
        Action::Commands => list_commands(Setup::load(args.user_id, args.roles)?).await,
    }
}

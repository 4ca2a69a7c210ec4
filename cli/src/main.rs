use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pulsewire::auth::{AuthError, FileTokenStore, Session, SessionManager, TokenStore};
use pulsewire::config::{ClientConfig, ConfigError};
use pulsewire::net::types::{Article, UserRow};
use pulsewire::net::{ApiError, ReqwestTransport, Transport};
use pulsewire::panels::admin::AdminPanel;
use pulsewire::panels::auth_forms::{validate_login, validate_signup};
use pulsewire::panels::saved::{SavedArticlesPanel, SavedView};
use pulsewire::panels::{OpStatus, article_card::ArticleCardState};
use pulsewire::util::dates::{format_created_at, format_published_date};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("http client setup failed: {0}")]
    Transport(#[from] ApiError),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("not logged in; run `pulsewire login` first")]
    NotLoggedIn,
    #[error("{0}")]
    Panel(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pulsewire", about = "PulseWire news client")]
struct Cli {
    /// Backend base URL (overrides PULSEWIRE_API_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Token file (overrides PULSEWIRE_TOKEN_PATH).
    #[arg(long)]
    token_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login(CredentialArgs),
    Signup(SignupArgs),
    Logout,
    Whoami,
    Saved(SavedCommand),
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(long)]
    username: String,

    #[arg(long, env = "PULSEWIRE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[command(flatten)]
    credentials: CredentialArgs,

    #[arg(long)]
    confirm_password: String,
}

#[derive(Args, Debug)]
struct SavedCommand {
    #[command(subcommand)]
    command: SavedSubcommand,
}

#[derive(Subcommand, Debug)]
enum SavedSubcommand {
    List,
    Remove {
        id: i64,
    },
    Add {
        #[arg(long, help = "Article JSON as served by the backend")]
        data: String,
    },
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Users,
    Promote { username: String },
    CreateUser(CredentialArgs),
}

struct CliContext {
    session: SessionManager<FileTokenStore>,
    transport: ReqwestTransport<FileTokenStore>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.base_url.as_deref() {
        config = config.with_api_url(url)?;
    }
    if let Some(path) = cli.token_path {
        config.token_path = path;
    }
    tracing::debug!(api_url = %config.api_url, token_path = %config.token_path.display(), "config loaded");

    let store = FileTokenStore::new(&config.token_path);
    let mut ctx = CliContext {
        session: SessionManager::restore(store.clone()),
        transport: ReqwestTransport::new(config.api_url, store)?,
    };

    match cli.command {
        Command::Login(args) => run_login(&mut ctx.session, &ctx.transport, args).await,
        Command::Signup(args) => run_signup(&mut ctx.session, &ctx.transport, args).await,
        Command::Logout => {
            ctx.session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => run_whoami(&ctx),
        Command::Saved(saved) => run_saved(&ctx, saved).await,
        Command::Admin(admin) => run_admin(&ctx, admin).await,
    }
}

async fn run_login<S: TokenStore, T: Transport>(
    session: &mut SessionManager<S>,
    transport: &T,
    args: CredentialArgs,
) -> Result<(), CliError> {
    let credentials = validate_login(&args.username, &args.password).map_err(CliError::Invalid)?;
    let user = session
        .login(transport, &credentials.username, &credentials.password)
        .await?;
    println!("logged in as {} ({})", user.username, user.role);
    Ok(())
}

async fn run_signup<S: TokenStore, T: Transport>(
    session: &mut SessionManager<S>,
    transport: &T,
    args: SignupArgs,
) -> Result<(), CliError> {
    let credentials = validate_signup(
        &args.credentials.username,
        &args.credentials.password,
        &args.confirm_password,
    )
    .map_err(CliError::Invalid)?;
    let user = session
        .signup(transport, &credentials.username, &credentials.password)
        .await?;
    println!("signed up as {} ({})", user.username, user.role);
    Ok(())
}

fn run_whoami(ctx: &CliContext) -> Result<(), CliError> {
    let user = ctx.session.session().user().ok_or(CliError::NotLoggedIn)?;
    println!("{} (id {}, role {})", user.username, user.user_id, user.role);
    Ok(())
}

async fn run_saved(ctx: &CliContext, saved: SavedCommand) -> Result<(), CliError> {
    let session = ctx.session.session();
    if !session.is_authenticated() {
        return Err(CliError::NotLoggedIn);
    }

    match saved.command {
        SavedSubcommand::List => {
            let mut panel = SavedArticlesPanel::default();
            panel.refresh(&ctx.transport).await;
            print_saved(&panel, session)
        }
        SavedSubcommand::Remove { id } => {
            let mut panel = SavedArticlesPanel::default();
            panel.remove(&ctx.transport, Some(id)).await;
            match panel.error {
                Some(error) => Err(CliError::Panel(error)),
                None => {
                    println!("removed {id}");
                    Ok(())
                }
            }
        }
        SavedSubcommand::Add { data } => {
            let article = serde_json::from_str::<Article>(&data)?;
            let mut card = ArticleCardState::default();
            card.save(&ctx.transport, session, &article).await;
            match card.error {
                Some(error) => Err(CliError::Panel(error)),
                None => {
                    println!("saved {}", article.url);
                    Ok(())
                }
            }
        }
    }
}

fn print_saved(panel: &SavedArticlesPanel, session: &Session) -> Result<(), CliError> {
    match panel.view(session) {
        SavedView::LoginRequired => Err(CliError::NotLoggedIn),
        SavedView::Loading => Ok(()),
        SavedView::Error(error) => Err(CliError::Panel(error.to_owned())),
        SavedView::Empty => {
            println!("{}", pulsewire::panels::saved::EMPTY);
            Ok(())
        }
        SavedView::List(articles) => {
            for article in articles {
                let id = article.id.map_or_else(|| "-".to_owned(), |id| id.to_string());
                println!(
                    "{id}\t{}\t{}\t{}\n\t{}",
                    format_published_date(&article.published_at),
                    article.source.name,
                    article.title,
                    article.url
                );
            }
            Ok(())
        }
    }
}

async fn run_admin(ctx: &CliContext, admin: AdminCommand) -> Result<(), CliError> {
    if !AdminPanel::access_granted(ctx.session.session()) {
        return Err(CliError::Invalid(pulsewire::panels::admin::ACCESS_DENIED));
    }

    let mut panel = AdminPanel::default();
    match admin.command {
        AdminSubcommand::Users => {
            panel.refresh(&ctx.transport).await;
            report(&panel.list)?;
            print_users(&panel.users);
            Ok(())
        }
        AdminSubcommand::Promote { username } => {
            panel.promote_user(&ctx.transport, &username).await;
            report(&panel.promote)
        }
        AdminSubcommand::CreateUser(args) => {
            panel.new_username = args.username;
            panel.new_password = args.password;
            panel.create_user(&ctx.transport).await;
            report(&panel.create)
        }
    }
}

fn report(status: &OpStatus) -> Result<(), CliError> {
    if let Some(error) = &status.error {
        return Err(CliError::Panel(error.clone()));
    }
    if let Some(success) = &status.success {
        println!("{success}");
    }
    Ok(())
}

fn print_users(users: &[UserRow]) {
    for user in users {
        println!(
            "{}\t{}\t{}\t{}",
            user.id,
            user.username,
            user.role,
            format_created_at(&user.created_at)
        );
    }
}

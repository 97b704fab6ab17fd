//! Admin console command line
//!
//! Drives the console engine against the seeded mock backend: log in as the
//! super admin, browse and filter the dashboard tables, follow the
//! notification feed and export any tab to CSV or PDF.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console_core::types::{PaymentStatus, Topic};
use console_core::utils::format_date_time;
use console_core::{Config, DateRange, Role};
use console_engine::export::ExportScope;
use console_engine::shell::{DashboardShell, Tab};
use console_engine::views::notifications::FeedFilters;
use console_engine::views::{
    ActivityFilter, AnalyticsView, NotificationFeed, PaymentsView, StudentProgressView,
    TeacherManagement, UserManagement, ViewContext,
};
use console_engine::{
    ConsoleError, DetailState, ExportFormat, PageSize, Result, SessionManager, SessionStore,
};
use console_service::{AccountStatusFilter, MockBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command line interface for the admin console
#[derive(Parser)]
#[command(
    name = "admin-console",
    version = env!("CARGO_PKG_VERSION"),
    about = "Super admin console for the learning platform",
    long_about = "Browse users, students, payments, teachers and analytics of the learning platform, follow operator notifications and export any table to CSV or PDF."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overrides the config
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    json: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Paging, search and sorting shared by the table commands
#[derive(Args)]
struct TableArgs {
    /// Search text
    #[arg(short, long, default_value = "")]
    search: String,

    /// Page number, 1-based
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Rows per page (10, 20 or 50)
    #[arg(long)]
    page_size: Option<u32>,

    /// Toggle sorting on a column; repeat to cycle or add columns
    #[arg(long, value_name = "COLUMN")]
    sort: Vec<String>,
}

/// Account status filter values
#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    All,
    Active,
    Suspended,
}

impl From<StatusArg> for AccountStatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => Self::All,
            StatusArg::Active => Self::Active,
            StatusArg::Suspended => Self::Suspended,
        }
    }
}

/// Payment status filter values
#[derive(Clone, Copy, ValueEnum)]
enum PaymentArg {
    Success,
    Failed,
}

impl From<PaymentArg> for PaymentStatus {
    fn from(arg: PaymentArg) -> Self {
        match arg {
            PaymentArg::Success => Self::Success,
            PaymentArg::Failed => Self::Failed,
        }
    }
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Log in as the super admin
    Login {
        /// Account email
        #[arg(long, requires = "password", conflicts_with_all = ["token", "magic_link"])]
        email: Option<String>,

        /// Account password
        #[arg(long)]
        password: Option<String>,

        /// SSO token issued by the main website
        #[arg(long, conflicts_with = "magic_link")]
        token: Option<String>,

        /// Send a passwordless login link to this address instead
        #[arg(long, value_name = "EMAIL")]
        magic_link: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged in identity
    Whoami,

    /// User management
    Users {
        #[command(flatten)]
        table: TableArgs,

        /// Only this role (student, teacher, admin, super_admin)
        #[arg(long)]
        role: Option<String>,

        /// Account status
        #[arg(long, value_enum, default_value = "all")]
        status: StatusArg,

        /// Suspend a user on the page, then reload
        #[arg(long, value_name = "USER_ID", conflicts_with = "activate")]
        suspend: Option<String>,

        /// Activate a user on the page, then reload
        #[arg(long, value_name = "USER_ID")]
        activate: Option<String>,
    },

    /// Student progress
    Students {
        #[command(flatten)]
        table: TableArgs,

        /// Activity filter applied to the page
        #[arg(long, value_enum, default_value = "all")]
        activity: ActivityFilter,

        /// Show the profile of a student
        #[arg(long, value_name = "USER_ID")]
        profile: Option<String>,
    },

    /// Payments and subscriptions
    Payments {
        #[command(flatten)]
        table: TableArgs,

        /// Payment status
        #[arg(long, value_enum)]
        status: Option<PaymentArg>,

        /// Minimum amount in INR
        #[arg(long, default_value = "")]
        min_amount: String,

        /// Maximum amount in INR
        #[arg(long, default_value = "")]
        max_amount: String,

        /// Date range, in days ending now
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Teacher management
    Teachers {
        #[command(flatten)]
        table: TableArgs,

        /// Show the activity log of a teacher on the page
        #[arg(long, value_name = "TEACHER_ID")]
        logs: Option<String>,
    },

    /// Analytics and reports
    Analytics {
        /// Date range, in days ending now
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Only this topic in the popularity chart
        #[arg(long)]
        topic: Option<String>,
    },

    /// Operator notifications
    Notifications {
        /// Only unread items
        #[arg(long)]
        unread: bool,

        /// Search title and body
        #[arg(short, long)]
        search: Option<String>,

        /// Walk every page instead of the first
        #[arg(long)]
        all: bool,

        /// Mark one notification read
        #[arg(long, value_name = "ID")]
        mark_read: Option<String>,

        /// Mark every notification read
        #[arg(long)]
        mark_all_read: bool,

        /// Keep polling until Ctrl+C
        #[arg(short, long)]
        watch: bool,
    },

    /// Open the dashboard from a URL query such as `tab=payments&q=asha`
    Open {
        /// URL query string
        #[arg(value_name = "QUERY", default_value = "")]
        query: String,
    },

    /// Export a tab to CSV or PDF
    Export {
        /// Tab to export
        #[arg(value_enum)]
        tab: Tab,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Every page of the filtered set instead of the first page
        #[arg(long)]
        all: bool,

        /// Search text
        #[arg(short, long, default_value = "")]
        search: String,

        /// Date range for payments and analytics, in days ending now
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Output directory (overrides config)
        #[arg(short, long, value_name = "DIRECTORY")]
        out: Option<PathBuf>,
    },

    /// Configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Main entry point for the admin console
///
/// # Errors
///
/// Returns error if configuration, login, a remote call or an export fails
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for development convenience)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: .env file not loaded: {e}");
    }

    let cli = Cli::parse();

    let mut config = Config::load_from(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.json {
        config.logging.format = "json".to_string();
    }
    console_core::init_logging(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Admin console starting");

    let backend = MockBackend::from_config(&config.service, Utc::now());
    let store = SessionStore::from_config(&config.session);
    let ctx = ViewContext::from_backend(&backend, config);
    let session = SessionManager::new(Arc::new(backend.auth.clone()), store, ctx.bus.clone());

    let _toasts = ctx.bus.subscribe(|active| match &active.toast.description {
        Some(description) => eprintln!("[{}] {description}", active.toast.title),
        None => eprintln!("[{}]", active.toast.title),
    });

    match cli.command {
        Commands::Login {
            email,
            password,
            token,
            magic_link,
        } => login(&session, email, password, token, magic_link).await,
        Commands::Config { show } => handle_config_command(&ctx, show),
        Commands::Logout => session.logout(),
        command => {
            session.restore()?;
            let user = session.require_super_admin()?;
            info!(user = %user.id, "Session restored");
            run_console_command(command, ctx, &user).await
        }
    }
}

/// Dispatch a command that needs a super admin session
async fn run_console_command(
    command: Commands,
    ctx: ViewContext,
    user: &console_core::AuthUser,
) -> Result<()> {
    match command {
        Commands::Whoami => {
            println!("{} <{}> ({})", user.name, user.email, user.role);
            Ok(())
        }
        Commands::Users {
            table,
            role,
            status,
            suspend,
            activate,
        } => {
            let toggle = match (suspend, activate) {
                (Some(id), _) => Some((id, false)),
                (None, Some(id)) => Some((id, true)),
                (None, None) => None,
            };
            show_users(ctx, &table, role.as_deref(), status, toggle).await
        }
        Commands::Students {
            table,
            activity,
            profile,
        } => show_students(ctx, &table, activity, profile.as_deref()).await,
        Commands::Payments {
            table,
            status,
            min_amount,
            max_amount,
            days,
        } => {
            let mut view = PaymentsView::new(ctx, &table.search, DateRange::last_days(Utc::now(), days));
            view.set_status_filter(status.map(PaymentStatus::from));
            view.set_min_amount(&min_amount)?;
            view.set_max_amount(&max_amount)?;
            apply_table_args(view.table_mut(), &table)?;
            view.load().await?;
            let cards = view.load_overview().await?;
            println!(
                "Monthly {} | Lifetime {} | Active subscriptions {} | Failed payments {}\n",
                cards.monthly, cards.lifetime, cards.active_subscriptions, cards.failed_payments
            );
            println!("{}", view.render());
            Ok(())
        }
        Commands::Teachers { table, logs } => {
            let mut view = TeacherManagement::new(ctx, &table.search);
            apply_table_args(view.table_mut(), &table)?;
            view.load().await?;
            println!("{}", view.render());
            if let Some(id) = logs {
                if let DetailState::Failed { error, .. } = view.open_logs(&id).await? {
                    return Err(error);
                }
                println!();
                for line in view.log_lines() {
                    println!("  {line}");
                }
            }
            Ok(())
        }
        Commands::Analytics { days, topic } => {
            let mut view = AnalyticsView::new(ctx, DateRange::last_days(Utc::now(), days));
            view.set_topic_filter(topic.as_deref().map(str::parse::<Topic>).transpose()?);
            view.load().await?;
            for dataset in view.display_datasets() {
                println!("{} ({} rows)", dataset.title, dataset.table.len());
                println!("  {}", dataset.table.headers.join(", "));
                for row in &dataset.table.body {
                    println!("  {}", row.join(", "));
                }
                println!();
            }
            Ok(())
        }
        Commands::Notifications {
            unread,
            search,
            all,
            mark_read,
            mark_all_read,
            watch,
        } => {
            let feed = NotificationFeed::from_context(&ctx);
            feed.set_filters(FeedFilters {
                unread,
                q: search,
                kind: None,
            });
            show_notifications(&feed, all, mark_read.as_deref(), mark_all_read, watch).await
        }
        Commands::Open { query } => {
            let mut shell = DashboardShell::from_url_query(ctx, &query)?;
            shell.load_active().await?;
            println!("{} ?{}\n", shell.tab().label(), shell.url_query()?);
            match shell.active().render() {
                Some(table) => println!("{table}"),
                None => println!("Use `admin-console analytics` for the report datasets"),
            }
            Ok(())
        }
        Commands::Export {
            tab,
            format,
            all,
            search,
            days,
            out,
        } => export_tab(ctx, tab, format, all, &search, days, out).await,
        Commands::Login { .. } | Commands::Logout | Commands::Config { .. } => Ok(()),
    }
}

/// Log in with one of the three methods
///
/// # Errors
///
/// Returns error if the login is rejected or the session cannot be saved
async fn login(
    session: &SessionManager,
    email: Option<String>,
    password: Option<String>,
    token: Option<String>,
    magic_link: Option<String>,
) -> Result<()> {
    let user = match (email, token, magic_link) {
        (Some(email), _, _) => {
            session
                .login_with_email(&email, password.as_deref().unwrap_or_default())
                .await?
        }
        (None, Some(token), _) => session.login_with_token(&token).await?,
        (None, None, Some(email)) => return session.send_magic_link(&email).await,
        (None, None, None) => {
            return Err(ConsoleError::validation(
                "login",
                "pass --email and --password, --token or --magic-link",
            ));
        }
    };
    println!("Logged in as {} ({})", user.name, user.role);
    Ok(())
}

/// Apply paging, search and sorting flags to a table
///
/// # Errors
///
/// Returns a validation error for an unsupported page size or page 0
fn apply_table_args<E: console_core::Entity>(
    table: &mut console_engine::views::TableState<E>,
    args: &TableArgs,
) -> Result<()> {
    table.set_search(&args.search);
    if let Some(size) = args.page_size {
        table.set_page_size(PageSize::try_from(size)?);
    }
    for column in &args.sort {
        table.toggle_sort(column);
    }
    if args.page != 1 {
        table.set_page(args.page)?;
    }
    Ok(())
}

/// List users, optionally toggling one account first
///
/// # Errors
///
/// Returns error if a fetch fails or the toggled user is not on the page
async fn show_users(
    ctx: ViewContext,
    args: &TableArgs,
    role: Option<&str>,
    status: StatusArg,
    toggle: Option<(String, bool)>,
) -> Result<()> {
    let mut view = UserManagement::new(ctx, &args.search);
    view.set_role_filter(role.map(str::parse::<Role>).transpose()?);
    view.set_status_filter(status.into());
    apply_table_args(view.table_mut(), args)?;
    view.load().await?;

    if let Some((id, is_active)) = toggle {
        view.set_active(&id, is_active).await?;
        view.load().await?;
    }

    let stats = view.stats();
    println!(
        "Total users {} | Students {} | Teachers/Admins {} | Active today {}\n",
        stats.total_users, stats.total_students, stats.teachers_admins, stats.active_today
    );
    println!("{}", view.render());
    Ok(())
}

/// List students, optionally showing one profile
///
/// # Errors
///
/// Returns error if a fetch fails
async fn show_students(
    ctx: ViewContext,
    args: &TableArgs,
    activity: ActivityFilter,
    profile: Option<&str>,
) -> Result<()> {
    let mut view = StudentProgressView::new(ctx, &args.search);
    view.set_activity(activity);
    apply_table_args(view.table_mut(), args)?;
    view.load().await?;
    let summary = view.load_summary().await?;
    println!(
        "Students {} | Average completion {}% | Active today {}\n",
        summary.total_students, summary.average_completion, summary.active_today
    );
    println!("{}", view.render());

    if let Some(id) = profile {
        match view.open_profile(id).await {
            DetailState::Loaded { data, .. } => {
                let text = serde_json::to_string_pretty(&*data)
                    .map_err(|e| ConsoleError::export(e.to_string()))?;
                println!("\n{text}");
            }
            DetailState::Failed { error, .. } => return Err(error),
            DetailState::Idle | DetailState::Loading { .. } => {}
        }
    }
    Ok(())
}

/// Print the feed, apply read marks, optionally keep polling
///
/// # Errors
///
/// Returns error if a feed call fails
async fn show_notifications(
    feed: &NotificationFeed,
    all: bool,
    mark_read: Option<&str>,
    mark_all_read: bool,
    watch: bool,
) -> Result<()> {
    if let Some(id) = mark_read {
        feed.mark_read(id).await?;
    } else if mark_all_read {
        feed.mark_all_read().await?;
    } else {
        feed.refresh().await?;
    }

    let items = if all { feed.collect_all().await? } else { feed.items() };
    for item in &items {
        let marker = if item.read { ' ' } else { '*' };
        println!(
            "{marker} {:<8} {}  {}",
            item.id,
            format_date_time(item.created_at),
            item.title
        );
    }
    println!("\n{} unread of {} loaded", feed.unread_count(), feed.items().len());
    if !all && feed.has_more() {
        println!("More available, run with --all");
    }

    if watch {
        let shutdown = CancellationToken::new();
        let poller = feed.spawn_polling(feed.poll_interval(), shutdown.clone());
        info!("Watching notifications. Press Ctrl+C to stop.");
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
        }
        shutdown.cancel();
        if let Err(e) = poller.await {
            warn!(error = %e, "Polling task ended abnormally");
        }
        println!("{} unread", feed.unread_count());
    }
    Ok(())
}

/// Export one tab through the dashboard shell
///
/// # Errors
///
/// Returns error if a fetch, the rendering or the file write fails
async fn export_tab(
    ctx: ViewContext,
    tab: Tab,
    format: ExportFormat,
    all: bool,
    search: &str,
    days: i64,
    out: Option<PathBuf>,
) -> Result<()> {
    let dir = out.unwrap_or_else(|| ctx.export_dir());
    let mut shell = DashboardShell::new(ctx);
    shell.select_tab(tab);
    shell.set_search(search);
    shell.set_date_range(DateRange::last_days(Utc::now(), days));

    let scope = if all {
        ExportScope::FullFilteredSet
    } else {
        shell.load_active().await?;
        ExportScope::VisiblePage
    };

    let artifacts = shell.active_mut().export(format, scope).await?;
    for artifact in &artifacts {
        let path = artifact.write_to(&dir)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Handle configuration commands
///
/// # Errors
///
/// Returns error if configuration cannot be serialized
fn handle_config_command(ctx: &ViewContext, show: bool) -> Result<()> {
    if show {
        let config_toml = toml::to_string_pretty(&*ctx.config).map_err(|e| {
            ConsoleError::configuration(format!("Failed to serialize configuration: {e}"))
        })?;
        println!("{config_toml}");
    }
    Ok(())
}

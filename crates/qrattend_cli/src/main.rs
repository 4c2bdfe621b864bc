//! Command-line front-end for qrattend.
//!
//! # Responsibility
//! - Load configuration, start logging and open the ledger database.
//! - Log in with the supplied credentials and call `qrattend_core::api`.
//! - Print results as plain text, or as JSON envelopes with `--json`.
//!
//! Every command except `init` and `bootstrap-admin` needs a session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use qrattend_core::api::{self, ActionResponse, AttendanceQuery};
use qrattend_core::{
    App, AppConfig, AttendanceRecord, Page, QrRenderer, Session, SvgQrRenderer,
    TerminalQrRenderer, User,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "qrattend")]
#[command(about = "QR code attendance tracking", version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true, env = "QRATTEND_CONFIG")]
    config: Option<PathBuf>,
    /// Login name for commands that need a session
    #[arg(long, global = true, env = "QRATTEND_USERNAME")]
    username: Option<String>,
    /// Login password for commands that need a session
    #[arg(long, global = true, env = "QRATTEND_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Print the raw response envelope as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone, Default)]
struct RangeArgs {
    /// First date to include (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long)]
    start: Option<String>,
    /// Last date to include (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long)]
    end: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
struct PageArgs {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    per_page: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database
    Init,
    /// Create the first administrator account
    BootstrapAdmin { name: String, new_password: String },
    /// Add an account (admin)
    AddUser {
        name: String,
        new_password: String,
        /// Admin or User
        #[arg(long, default_value = "User")]
        role: String,
    },
    /// Change an account (admin)
    EditUser {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Remove an account and its attendance records (admin)
    DeleteUser { id: i64 },
    /// List accounts (admin)
    ListUsers {
        #[command(flatten)]
        paging: PageArgs,
    },
    /// Change your own username or password
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
    },
    /// Show your personal QR code
    MyQr {
        /// Write an SVG image here instead of drawing in the terminal
        #[arg(long)]
        svg: Option<PathBuf>,
    },
    /// Record attendance from a scanned token (admin)
    Scan { token: String },
    /// Show your own attendance history
    History {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        paging: PageArgs,
    },
    /// List everyone's attendance (admin)
    List {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        paging: PageArgs,
    },
    /// Latest scans (admin)
    Recent,
    /// Export attendance as CSV; admins export everyone, users themselves
    Export {
        #[command(flatten)]
        range: RangeArgs,
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete one attendance record (admin)
    DeleteAttendance { id: i64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    start_logging(&config)?;

    let renderer: Arc<dyn QrRenderer> = match &cli.command {
        Commands::MyQr { svg: None } => Arc::new(TerminalQrRenderer),
        _ => Arc::new(SvgQrRenderer),
    };
    let app = App::from_config_with_renderer(&config, renderer)
        .context("failed to start application")?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        qrattend_core::core_version()
    );

    run(&cli, &app)
}

fn run(cli: &Cli, app: &App) -> Result<()> {
    match &cli.command {
        Commands::Init => {
            let version = qrattend_core::db::migrations::schema_version(app.connection())?;
            println!("database ready (schema version {version})");
            Ok(())
        }
        Commands::BootstrapAdmin { name, new_password } => {
            let user = app
                .users()
                .bootstrap_admin(name, new_password)
                .map_err(|err| anyhow!(err.user_message()))?;
            println!("administrator `{}` created with id {}", user.username, user.id);
            Ok(())
        }
        Commands::AddUser {
            name,
            new_password,
            role,
        } => {
            let session = login(cli, app)?;
            let response = api::add_user(app, Some(&session), name, new_password, role);
            emit(cli.json, response, print_user)
        }
        Commands::EditUser {
            id,
            name,
            new_password,
            role,
        } => {
            let session = login(cli, app)?;
            let response = api::edit_user(
                app,
                Some(&session),
                *id,
                name.as_deref(),
                new_password.as_deref(),
                role.as_deref(),
            );
            emit(cli.json, response, print_user)
        }
        Commands::DeleteUser { id } => {
            let session = login(cli, app)?;
            emit(cli.json, api::delete_user(app, Some(&session), *id), |_| {})
        }
        Commands::ListUsers { paging } => {
            let session = login(cli, app)?;
            let response = api::list_users(app, Some(&session), paging.page, paging.per_page);
            emit(cli.json, response, |page| {
                for user in &page.items {
                    print_user(user);
                }
                print_page_footer(page);
            })
        }
        Commands::Profile { name, new_password } => {
            let session = login(cli, app)?;
            let response = api::update_profile(
                app,
                Some(&session),
                name.as_deref(),
                new_password.as_deref(),
            );
            emit(cli.json, response, print_user)
        }
        Commands::MyQr { svg } => {
            let session = login(cli, app)?;
            let response = api::my_qr(app, Some(&session));
            if let (Some(path), Some(data)) = (svg, response.data.as_ref()) {
                write_output(path, &data.image)?;
            }
            let to_file = svg.is_some();
            emit(cli.json, response, |data| {
                if !to_file {
                    println!("{}", data.image);
                }
                println!("token: {}", data.token);
                println!("refresh every {}s", data.refresh_seconds);
            })
        }
        Commands::Scan { token } => {
            let session = login(cli, app)?;
            emit(cli.json, api::scan_attendance(app, Some(&session), token), print_record)
        }
        Commands::History { range, paging } => {
            let session = login(cli, app)?;
            let response = api::my_attendance(app, Some(&session), &query(range, paging));
            emit(cli.json, response, print_record_page)
        }
        Commands::List { range, paging } => {
            let session = login(cli, app)?;
            let response = api::list_attendance(app, Some(&session), &query(range, paging));
            emit(cli.json, response, print_record_page)
        }
        Commands::Recent => {
            let session = login(cli, app)?;
            emit(cli.json, api::recent_attendance(app, Some(&session)), |records| {
                records.iter().for_each(print_record);
            })
        }
        Commands::Export { range, output } => {
            let session = login(cli, app)?;
            let query = query(range, &PageArgs::default());
            let response = if session.is_admin() {
                api::export_attendance_csv(app, Some(&session), &query)
            } else {
                api::export_my_attendance_csv(app, Some(&session), &query)
            };
            if let (Some(path), Some(csv)) = (output, response.data.as_deref()) {
                write_output(path, csv)?;
            }
            match output {
                Some(path) => emit(cli.json, response, |_| println!("wrote {}", path.display())),
                None => emit(cli.json, response, |csv| print!("{csv}")),
            }
        }
        Commands::DeleteAttendance { id } => {
            let session = login(cli, app)?;
            emit(cli.json, api::delete_attendance(app, Some(&session), *id), |_| {})
        }
    }
}

fn start_logging(config: &AppConfig) -> Result<()> {
    let result = match &config.log_dir {
        Some(dir) => {
            let dir = std::path::absolute(dir)
                .with_context(|| format!("invalid log directory `{}`", dir.display()))?;
            qrattend_core::init_logging(&config.log_level, &dir.to_string_lossy())
        }
        None => qrattend_core::init_stderr_logging(&config.log_level),
    };
    result.map_err(|err| anyhow!("failed to start logging: {err}"))
}

fn login(cli: &Cli, app: &App) -> Result<Session> {
    let (Some(username), Some(password)) = (&cli.username, &cli.password) else {
        bail!("this command needs --username and --password (or QRATTEND_USERNAME / QRATTEND_PASSWORD)");
    };
    let response = api::login(app, username, password);
    match response.data {
        Some(session) if response.ok => Ok(session),
        _ => bail!(response.message),
    }
}

fn query(range: &RangeArgs, paging: &PageArgs) -> AttendanceQuery {
    AttendanceQuery {
        start: range.start.clone(),
        end: range.end.clone(),
        page: paging.page,
        per_page: paging.per_page,
    }
}

/// Prints a response and turns a failed one into a non-zero exit.
fn emit<T: Serialize>(
    json: bool,
    response: ActionResponse<T>,
    print_data: impl FnOnce(&T),
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if let Some(data) = response.data.as_ref().filter(|_| response.ok) {
        print_data(data);
        if !response.message.is_empty() {
            eprintln!("{}", response.message);
        }
    }
    if !response.ok {
        bail!(response.message);
    }
    Ok(())
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write `{}`", path.display()))
}

fn print_user(user: &User) {
    println!("{:>6}  {:<24} {}", user.id, user.username, user.role);
}

fn print_record(record: &AttendanceRecord) {
    let at = record
        .recorded_at_utc()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| record.recorded_at.to_string());
    println!(
        "{:>6}  user {:<6} {}  {}",
        record.id, record.user_id, record.date, at
    );
}

fn print_record_page(page: &Page<AttendanceRecord>) {
    page.items.iter().for_each(print_record);
    print_page_footer(page);
}

fn print_page_footer<T>(page: &Page<T>) {
    println!(
        "page {}/{} ({} total)",
        page.page,
        page.pages.max(1),
        page.total
    );
}

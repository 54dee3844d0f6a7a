//! CLI interface for sigaa - the SIGAA academic portal from the terminal.

use std::collections::BTreeSet;
use std::env;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug, info};
use sigaa_core::paths::write_default_config;
use sigaa_core::{
    APP_NAME, AppConfig, AppPaths, AuthManager, DirectoryScan, Domain, Draft, LogLevel, Mailbox,
    PageOutcome, Recipient, ScanPolicy, generate_example_config, generate_schema,
};

const REPO_URL: &str = env!("CARGO_PKG_REPOSITORY");

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Session(portal) => rt.block_on(handle_session(&ctx, &portal)),
        Command::Auth { subcommand } => rt.block_on(handle_auth(&ctx, &subcommand)),
        Command::Search { query, login } => rt.block_on(handle_search(&ctx, &login, &query)),
        Command::Directory(cmd) => rt.block_on(handle_directory(&ctx, &cmd)),
        Command::Send(cmd) => rt.block_on(handle_send(&ctx, &cmd)),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "sigaa",
    author,
    version,
    about = "The SIGAA academic portal from the terminal",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

/// Common CLI options shared across all subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonOpts {
    /// Override the config file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    /// Reduce output to only errors.
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Enable trace logging.
    #[arg(long, global = true)]
    pub trace: bool,
    /// Output machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Disable ANSI colors in output.
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    pub no_color: bool,
    /// Control color output.
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    pub color: ColorOption,
    /// Do not change anything on disk.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Assume "yes" for interactive prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
    /// Detect terminal capabilities automatically.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

/// Which portal instance to talk to.
#[derive(Debug, Clone, Args)]
struct PortalOpts {
    /// Portal host, e.g. sigaa.ufrn.br (defaults to portal.domain).
    #[arg(long, value_name = "HOST")]
    domain: Option<String>,
}

/// Account used by commands that log in.
#[derive(Debug, Clone, Args)]
struct LoginOpts {
    #[command(flatten)]
    portal: PortalOpts,
    /// Account name (defaults to portal.username).
    #[arg(short, long, env = "SIGAA_USERNAME")]
    username: Option<String>,
    /// Account password. Never stored in the config file.
    #[arg(long, env = "SIGAA_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open an anonymous session and show the session cookie.
    Session(PortalOpts),
    /// Authentication checks.
    Auth {
        #[command(subcommand)]
        subcommand: AuthSubcommand,
    },
    /// Search the mailbox directory for recipients.
    Search {
        /// Name or username fragment.
        query: String,
        #[command(flatten)]
        login: LoginOpts,
    },
    /// Enumerate every recipient reachable through the mailbox search.
    Directory(DirectoryCommand),
    /// Send a mailbox message.
    Send(SendCommand),
    /// Create config directories and default files.
    Init(InitCommand),
    /// Inspect and manage configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum AuthSubcommand {
    /// Log in, probe the session, log out and report each step.
    Check(LoginOpts),
}

#[derive(Debug, Clone, Args)]
struct DirectoryCommand {
    /// Number of sessions searching in parallel (defaults to runtime.parallelism).
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,
    /// Stop at the first failed search instead of skipping it.
    #[arg(long)]
    abort_on_error: bool,
    #[command(flatten)]
    login: LoginOpts,
}

#[derive(Debug, Clone, Args)]
struct SendCommand {
    /// Recipient, as "FULL NAME (username)" or a bare username (repeatable).
    #[arg(long = "to", value_name = "RECIPIENT", required = true)]
    to: Vec<String>,
    /// Message subject.
    #[arg(short, long)]
    subject: String,
    /// Message text.
    #[arg(short, long)]
    message: String,
    #[command(flatten)]
    login: LoginOpts,
}

#[derive(Debug, Clone, Copy, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists.
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration.
    Show,
    /// Print the resolved config file path.
    Path,
    /// Print the JSON schema.
    Schema,
    /// Print an example configuration file.
    Example,
    /// Regenerate the default configuration file.
    Reset,
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths, common.dry_run)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        builder.filter_level(self.effective_log_level());

        let force_color = matches!(self.common.color, ColorOption::Always)
            || env::var_os("FORCE_COLOR").is_some();
        let disable_color = self.common.no_color
            || matches!(self.common.color, ColorOption::Never)
            || env::var_os("NO_COLOR").is_some()
            || (!force_color && !io::stderr().is_terminal());

        if disable_color {
            builder.write_style(WriteStyle::Never);
        } else if force_color {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        if let Some(ref file) = self.config.logging.file {
            let target = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .with_context(|| format!("opening log file {file}"))?;
            builder.write_style(WriteStyle::Never);
            builder.target(env_logger::Target::Pipe(Box::new(target)));
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => match self.config.logging.level {
                    LogLevel::Error => LevelFilter::Error,
                    // `info` is the config default; step logs need -v.
                    LogLevel::Warn | LogLevel::Info => LevelFilter::Warn,
                    LogLevel::Debug => LevelFilter::Debug,
                    LogLevel::Trace => LevelFilter::Trace,
                },
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn domain(&self, opts: &PortalOpts) -> Result<Domain> {
        let raw = opts.domain.as_deref().unwrap_or(&self.config.portal.domain);
        Ok(Domain::parse(raw)?)
    }

    async fn connect(&self, opts: &PortalOpts) -> Result<AuthManager> {
        let domain = self.domain(opts)?;
        let auth = AuthManager::connect(domain, &self.config.session_options()).await?;
        Ok(auth)
    }

    /// Connect and log in; an explicit rejection is an error.
    async fn login(&self, opts: &LoginOpts) -> Result<AuthManager> {
        let username = opts
            .username
            .as_deref()
            .or(self.config.portal.username.as_deref())
            .ok_or_else(|| {
                anyhow!("no username: pass --username, set SIGAA_USERNAME or portal.username")
            })?;
        let password = opts
            .password
            .as_deref()
            .ok_or_else(|| anyhow!("no password: pass --password or set SIGAA_PASSWORD"))?;

        let mut auth = self.connect(&opts.portal).await?;
        let outcome = auth.login(username, password).await?;
        expect_success(outcome, "login")?;
        Ok(auth)
    }

    /// Log in and navigate to the compose form.
    async fn compose(&self, opts: &LoginOpts) -> Result<Mailbox> {
        let mut mailbox = self.login(opts).await?.into_mailbox();
        expect_success(mailbox.enter_mailbox_portal().await?, "opening the mailbox")?;
        expect_success(mailbox.enter_compose_view().await?, "opening the compose form")?;
        Ok(mailbox)
    }
}

fn expect_success(outcome: PageOutcome, step: &str) -> Result<()> {
    match outcome {
        PageOutcome::Success => Ok(()),
        PageOutcome::AuthFailed => bail!("{step} failed: wrong username or password"),
        PageOutcome::SessionExpired => bail!("{step} failed: the session expired, try again"),
        PageOutcome::UnexpectedPage => {
            bail!("{step} failed: the portal answered with an unexpected page (rerun with --debug)")
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing output to JSON")?
    );
    Ok(())
}

fn print_recipients(recipients: &BTreeSet<Recipient>) {
    let width = recipients
        .iter()
        .map(|r| r.username().chars().count())
        .max()
        .unwrap_or(0);
    for recipient in recipients {
        println!("  {:<width$}  {recipient}", recipient.username());
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn handle_session(ctx: &RuntimeContext, opts: &PortalOpts) -> Result<()> {
    let auth = ctx.connect(opts).await?;
    let session = auth.session();

    if ctx.common.json {
        return print_json(&serde_json::json!({
            "domain": session.domain().as_str(),
            "state": auth.state(),
            "cookies": session.cookies(),
        }));
    }

    println!("Domain:     {}", session.domain());
    println!("State:      {:?}", auth.state());
    match session.session_id() {
        Some(id) => println!("JSESSIONID: {id}"),
        None => println!("JSESSIONID: (not issued)"),
    }
    Ok(())
}

async fn handle_auth(ctx: &RuntimeContext, cmd: &AuthSubcommand) -> Result<()> {
    match cmd {
        AuthSubcommand::Check(opts) => {
            let mut auth = ctx.login(opts).await?;
            let after_login = auth.state();
            let live = auth.is_live().await?;
            let after_probe = auth.state();
            let logout = auth.logout().await?;
            let after_logout = auth.state();

            if ctx.common.json {
                return print_json(&serde_json::json!({
                    "domain": auth.session().domain().as_str(),
                    "login": after_login,
                    "live": live,
                    "probe": after_probe,
                    "logout": logout,
                    "final": after_logout,
                }));
            }

            println!("Domain: {}", auth.session().domain());
            println!("Login:  {after_login:?}");
            println!("Probe:  {after_probe:?} (live: {live})");
            println!("Logout: {logout} -> {after_logout:?}");
            expect_success(logout, "logout")
        }
    }
}

async fn handle_search(ctx: &RuntimeContext, opts: &LoginOpts, query: &str) -> Result<()> {
    let mut mailbox = ctx.compose(opts).await?;
    let found = mailbox.search(query, &Draft::default()).await?;

    if ctx.common.json {
        return print_json(&found);
    }
    if found.is_empty() {
        println!("No recipients match '{query}'.");
        return Ok(());
    }
    print_recipients(&found);
    Ok(())
}

async fn handle_directory(ctx: &RuntimeContext, cmd: &DirectoryCommand) -> Result<()> {
    let workers = cmd.workers.unwrap_or_else(|| ctx.config.runtime.workers()).max(1);
    let policy = if cmd.abort_on_error {
        ScanPolicy::Abort
    } else {
        ctx.config.directory.on_failure
    };
    let mut scan = DirectoryScan::with_alphabet(&ctx.config.directory.alphabet);
    let workers = workers.min(scan.remaining().max(1));
    info!(
        "scanning {} symbols with {workers} session(s), on failure: {policy}",
        scan.remaining()
    );

    let directory = if workers == 1 {
        let mut mailbox = ctx.compose(&cmd.login).await?;
        scan.run(&mut mailbox, policy).await?
    } else {
        let mut mailboxes = Vec::with_capacity(workers);
        for _ in 0..workers {
            mailboxes.push(ctx.compose(&cmd.login).await?);
        }
        scan.run_parallel(mailboxes, policy).await?
    };

    if ctx.common.json {
        return print_json(&directory);
    }
    print_recipients(&directory);
    eprintln!("{} recipients.", directory.len());
    Ok(())
}

async fn handle_send(ctx: &RuntimeContext, cmd: &SendCommand) -> Result<()> {
    let draft = Draft::new(cmd.subject.as_str(), cmd.message.as_str());
    let mut mailbox = ctx.compose(&cmd.login).await?;

    let mut added = Vec::with_capacity(cmd.to.len());
    for to in &cmd.to {
        let recipient = resolve_recipient(&mut mailbox, to, &draft).await?;
        let outcome = mailbox.add_recipient(&recipient, &draft).await?;
        expect_success(outcome, &format!("adding recipient {recipient}"))?;
        added.push(recipient);
    }

    let outcome = mailbox.send_message(&draft).await?;
    expect_success(outcome, "sending the message")?;

    if ctx.common.json {
        return print_json(&serde_json::json!({
            "subject": draft.subject,
            "recipients": added,
            "outcome": outcome,
        }));
    }
    println!("Sent '{}' to {} recipient(s).", draft.subject, added.len());
    Ok(())
}

/// Turn a bare username into the display string the form expects.
async fn resolve_recipient(mailbox: &mut Mailbox, to: &str, draft: &Draft) -> Result<Recipient> {
    if to.contains('(') {
        return Ok(Recipient::new(to));
    }
    let username = to.trim();
    mailbox
        .search(username, draft)
        .await?
        .into_iter()
        .find(|r| r.username().eq_ignore_ascii_case(username))
        .ok_or_else(|| anyhow!("no recipient with username '{username}' (try 'sigaa search')"))
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }
    if ctx.common.dry_run {
        log::info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }
    write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                print_json(&ctx.config)
            } else {
                println!("{:#?}", ctx.config);
                Ok(())
            }
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Schema => {
            println!("{}", generate_schema(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Example => {
            print!("{}", generate_example_config(APP_NAME, REPO_URL)?);
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                log::info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_requires_a_recipient() {
        let parsed = Cli::try_parse_from(["sigaa", "send", "-s", "Oi", "-m", "Tudo bem?"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn send_collects_repeated_recipients() {
        let cli = Cli::try_parse_from([
            "sigaa",
            "--json",
            "send",
            "--to",
            "macielti",
            "--to",
            "MARIA JOSE (mjose)",
            "-s",
            "Oi",
            "-m",
            "Tudo bem?",
            "--password",
            "x",
        ])
        .expect("valid command line");
        assert!(cli.common.json);
        let Command::Send(cmd) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(cmd.to, ["macielti", "MARIA JOSE (mjose)"]);
        assert_eq!(cmd.login.password.as_deref(), Some("x"));
    }

    #[test]
    fn directory_flags_parse() {
        let cli = Cli::try_parse_from([
            "sigaa",
            "directory",
            "--workers",
            "3",
            "--abort-on-error",
            "--domain",
            "sigaa.ufrn.br",
        ])
        .expect("valid command line");
        let Command::Directory(cmd) = cli.command else {
            panic!("expected directory");
        };
        assert_eq!(cmd.workers, Some(3));
        assert!(cmd.abort_on_error);
        assert_eq!(cmd.login.portal.domain.as_deref(), Some("sigaa.ufrn.br"));
    }

    #[test]
    fn non_success_outcomes_become_errors() {
        assert!(expect_success(PageOutcome::Success, "login").is_ok());
        let err = expect_success(PageOutcome::AuthFailed, "login").expect_err("rejected");
        assert!(err.to_string().contains("wrong username or password"));
        assert!(expect_success(PageOutcome::UnexpectedPage, "send").is_err());
    }
}

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use uuid::Uuid;

use deid_dashboard::api::{JobStatus, Role};
use deid_dashboard::app::Dashboard;
use deid_dashboard::auth::{IdentityProvider, StaticTokenProvider, spawn_expiry_watch};
use deid_dashboard::config::DashboardConfig;
use deid_dashboard::mutations::{Confirm, ConnectionForm, JobForm, OnboardingForm};
use deid_dashboard::resources::{JobQuery, RefreshOutcome, SortKey};
use deid_dashboard::routing::{DashboardPage, Route, RouteDecision};

const HELP: &str = "\
Commands:
  status                       session, gate and store state
  refresh                      re-fetch profile, connections and jobs
  profile                      dashboard home summary
  connections                  list connections
  jobs [STATUS] [YYYY-MM-DD] [by-created|by-status] [page]
                               list jobs (STATUS: pending|running|completed|failed;
                               a sort key flips the order, newest first by default)
  add-connection               create a connection
  delete-connection <id>       delete a connection
  run-job                      submit a de-identification job
  onboard <role> <name>        complete onboarding
  login | logout | quit";

/// Line-oriented terminal shared by the REPL and confirmation prompts.
struct Console {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read_line(&self, prompt: &str) -> Option<String> {
        eprint!("{prompt}");
        match self.lines.lock().await.next_line().await {
            Ok(line) => line.map(|l| l.trim().to_string()),
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                None
            }
        }
    }

    async fn ask_flag(&self, prompt: &str) -> bool {
        matches!(
            self.read_line(&format!("{prompt} [y/N] ")).await.as_deref(),
            Some("y" | "Y" | "yes")
        )
    }
}

#[async_trait]
impl Confirm for Console {
    async fn confirm(&self, prompt: &str) -> bool {
        self.ask_flag(prompt).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = DashboardConfig::from_env().context("loading configuration")?;
    let Some(identity) = config.identity.clone() else {
        eprintln!("Error: DEID_ACCESS_TOKEN not set");
        eprintln!("  export DEID_ACCESS_TOKEN=... DEID_SUBJECT=... DEID_EMAIL=...");
        std::process::exit(1);
    };

    eprintln!("🩻 De-identification dashboard v{}", env!("CARGO_PKG_VERSION"));
    let dashboard = Dashboard::new(&config);
    eprintln!("   Backend: {}", dashboard.client.base_url());
    eprintln!("   Type `help` for commands.\n");

    let _session_loop = dashboard.spawn_session_loop();

    let provider: Arc<dyn IdentityProvider> = Arc::new(StaticTokenProvider::new(identity));
    let _expiry_watch = spawn_expiry_watch(
        Arc::clone(&dashboard.holder),
        Arc::clone(&provider),
        config.expiry_check_interval,
    );

    let console = Console::new();
    login(&dashboard, provider.as_ref()).await;

    loop {
        let Some(line) = console.read_line("> ").await else {
            break; // EOF
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        match command {
            "help" => eprintln!("{HELP}"),
            "status" => print_status(&dashboard),
            "refresh" => match dashboard.store.refresh().await {
                RefreshOutcome::Applied { generation } => eprintln!("Refreshed (generation {generation})"),
                RefreshOutcome::Failed(msg) => eprintln!("Error: {msg}"),
                RefreshOutcome::Unauthenticated => eprintln!("Not signed in."),
                RefreshOutcome::Discarded => eprintln!("Session changed; results dropped."),
            },
            "profile" => {
                if enter(&dashboard, Route::HOME) {
                    print_home(&dashboard);
                }
            }
            "connections" => {
                if enter(&dashboard, Route::Dashboard(DashboardPage::Connections)) {
                    print_connections(&dashboard);
                }
            }
            "jobs" => {
                if enter(&dashboard, Route::Dashboard(DashboardPage::Jobs)) {
                    print_jobs(&dashboard, &args);
                }
            }
            "add-connection" => {
                if enter(&dashboard, Route::Dashboard(DashboardPage::Connections)) {
                    add_connection(&dashboard, &console).await;
                }
            }
            "delete-connection" => {
                if enter(&dashboard, Route::Dashboard(DashboardPage::Connections)) {
                    delete_connection(&dashboard, &console, args.first().copied()).await;
                }
            }
            "run-job" => {
                if enter(&dashboard, Route::Dashboard(DashboardPage::RunJob)) {
                    run_job(&dashboard, &console).await;
                }
            }
            "onboard" => {
                if enter(&dashboard, Route::Onboarding) {
                    onboard(&dashboard, &args).await;
                }
            }
            "login" => login(&dashboard, provider.as_ref()).await,
            "logout" => {
                if let Err(e) = dashboard.sign_out(provider.as_ref()).await {
                    eprintln!("Warning: {e}");
                }
                eprintln!("Signed out.");
            }
            "quit" | "exit" => break,
            other => eprintln!("Unknown command: {other}. Type `help`."),
        }
    }

    Ok(())
}

async fn login(dashboard: &Dashboard, provider: &dyn IdentityProvider) {
    match dashboard.sign_in(provider).await {
        Ok(session) => {
            eprintln!("Signed in as {} ({})", session.email, session.subject_id);
            dashboard.wait_synced(dashboard.holder.epoch()).await;
            match dashboard.navigate(Route::Redirect) {
                RouteDecision::Redirect(Route::Onboarding) => {
                    eprintln!("Your profile is incomplete: run `onboard <role> <display name>`.");
                }
                RouteDecision::Redirect(route) => eprintln!("→ {route}"),
                RouteDecision::Blocked(msg) => eprintln!("Error: {msg}"),
                other => tracing::debug!(?other, "Unexpected post-login decision"),
            }
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}

/// Resolve a navigation and report anything other than a render.
fn enter(dashboard: &Dashboard, route: Route) -> bool {
    match dashboard.navigate(route) {
        RouteDecision::Render(_) => true,
        RouteDecision::Redirect(Route::Landing) => {
            eprintln!("Not signed in: run `login`.");
            false
        }
        RouteDecision::Redirect(Route::Onboarding) => {
            eprintln!("Complete onboarding first: run `onboard <role> <display name>`.");
            false
        }
        RouteDecision::Redirect(to) => {
            eprintln!("→ {to}");
            false
        }
        RouteDecision::Wait => {
            eprintln!("Still checking your profile, try again shortly.");
            false
        }
        RouteDecision::Blocked(msg) => {
            eprintln!("Error: {msg}");
            false
        }
    }
}

fn print_status(dashboard: &Dashboard) {
    let auth = dashboard.holder.state();
    match auth.user() {
        Some(s) => eprintln!("Session: {} (expires {})", s.email, s.expires_at),
        None => eprintln!(
            "Session: none{}",
            auth.error.as_deref().map(|e| format!(" ({e})")).unwrap_or_default()
        ),
    }
    eprintln!("Gate:    {}", dashboard.gate.state());
    let snap = dashboard.store.snapshot();
    eprintln!(
        "Store:   generation {}, {} connections, {} jobs{}{}",
        snap.generation,
        snap.connections.len(),
        snap.jobs.len(),
        if snap.loading { ", loading" } else { "" },
        snap.error.map(|e| format!(", error: {e}")).unwrap_or_default(),
    );
}

fn print_home(dashboard: &Dashboard) {
    let summary = dashboard.store.snapshot().summary();
    eprintln!("Welcome, {}", summary.display_name.as_deref().unwrap_or("-"));
    if let Some(role) = summary.role {
        eprintln!("   Role:        {role}");
    }
    eprintln!("   Credits:     {}", summary.credits);
    eprintln!("   Connections: {}", summary.connection_count);
    eprintln!("   Jobs:        {}", summary.job_count);
    for (status, count) in summary.jobs_by_status {
        eprintln!("     {status:<10} {count}");
    }
}

fn print_connections(dashboard: &Dashboard) {
    let snap = dashboard.store.snapshot();
    if snap.connections.is_empty() {
        eprintln!("No connections. Run `add-connection`.");
        return;
    }
    for (i, c) in snap.connections.iter().enumerate() {
        eprintln!(
            "{:>2}. {} [{}] bucket={} region={} role={}",
            i + 1,
            c.name,
            c.id,
            c.bucket_name,
            c.region.as_deref().unwrap_or("-"),
            c.aws_role_arn
        );
    }
}

fn print_jobs(dashboard: &Dashboard, args: &[&str]) {
    let mut query = JobQuery::default();
    for arg in args {
        if let Ok(status) = arg.parse::<JobStatus>() {
            query = query.with_status(status);
        } else if let Ok(day) = arg.parse::<NaiveDate>() {
            query = query.on_date(day);
        } else if *arg == "by-created" {
            query.toggle_sort(SortKey::CreatedAt);
        } else if *arg == "by-status" {
            query.toggle_sort(SortKey::Status);
        } else if let Ok(page) = arg.parse::<usize>() {
            query = query.with_page(page.saturating_sub(1));
        } else {
            eprintln!("Ignoring argument: {arg}");
        }
    }

    let snap = dashboard.store.snapshot();
    let page = query.apply(&snap.jobs);
    if page.total == 0 {
        eprintln!("No jobs.");
        return;
    }
    for job in &page.jobs {
        eprintln!(
            "{} {:<10} {:>6.2}% created {}{}",
            job.id,
            job.status,
            job.progress_percentage(),
            job.created_at.format("%Y-%m-%d %H:%M"),
            job.error_message
                .as_deref()
                .map(|e| format!(" error: {e}"))
                .unwrap_or_default(),
        );
    }
    eprintln!("Page {} of {} ({} jobs)", page.page + 1, page.page_count, page.total);
}

async fn add_connection(dashboard: &Dashboard, console: &Console) {
    let mut form = ConnectionForm::default();
    for (label, field) in [
        ("Name", &mut form.name),
        ("Bucket name", &mut form.bucket_name),
        ("Role ARN", &mut form.aws_role_arn),
        ("Region", &mut form.region),
    ] {
        let Some(value) = console.read_line(&format!("{label}: ")).await else {
            return;
        };
        *field = value;
    }
    match dashboard.connections.create(&form).await {
        Ok(()) => eprintln!("Connection created."),
        Err(e) => eprintln!("Error: {}", e.user_message()),
    }
}

async fn delete_connection(dashboard: &Dashboard, console: &Console, arg: Option<&str>) {
    let Some(id) = arg.and_then(|a| Uuid::parse_str(a).ok()) else {
        eprintln!("Usage: delete-connection <id>");
        return;
    };
    match dashboard.connections.delete(id, console).await {
        Ok(()) => eprintln!("Connection deleted."),
        Err(e) => eprintln!("{}", e.user_message()),
    }
}

async fn run_job(dashboard: &Dashboard, console: &Console) {
    let connections = dashboard.store.snapshot().connections;
    if connections.is_empty() {
        eprintln!("No connections found. Add a connection first.");
        return;
    }
    print_connections(dashboard);

    let Some(choice) = console.read_line("Connection (number or id): ").await else {
        return;
    };
    let connection = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| connections.get(n.wrapping_sub(1)))
        .map(|c| c.id)
        .or_else(|| Uuid::parse_str(&choice).ok());

    let mut form = JobForm {
        connection,
        ..Default::default()
    };
    for (label, field) in [
        ("Source bucket", &mut form.user_bucket),
        ("Upload prefix", &mut form.upload_prefix),
        ("Result prefix", &mut form.result_prefix),
    ] {
        let Some(value) = console.read_line(&format!("{label}: ")).await else {
            return;
        };
        *field = value;
    }
    form.ocr_requested = console.ask_flag("OCR?").await;
    if form.ocr_requested {
        form.ocr_render_boxes = console.ask_flag("Render OCR boxes?").await;
    }
    form.tag_removal_requested = console.ask_flag("Remove tags?").await;
    form.ai_inference_requested = console.ask_flag("AI inference?").await;

    match dashboard.jobs.submit(&form).await {
        Ok(job_id) => eprintln!("Job launched: {job_id}"),
        Err(e) => eprintln!("Error: {}", e.user_message()),
    }
}

async fn onboard(dashboard: &Dashboard, args: &[&str]) {
    let Some((role, name)) = args.split_first() else {
        eprintln!("Usage: onboard <role> <display name>");
        return;
    };
    let role = match role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            let roles: Vec<_> = Role::ALL.iter().map(Role::as_str).collect();
            eprintln!("{e} (one of {})", roles.join(", "));
            return;
        }
    };

    let mut form = match dashboard.profile.prefill().await {
        Ok(form) => form,
        Err(e) => {
            eprintln!("Failed to load existing user data: {}", e.user_message());
            OnboardingForm::default()
        }
    };
    form.role = role;
    if !name.is_empty() {
        form.display_name = name.join(" ");
    }

    match dashboard.profile.submit_onboarding(&form).await {
        Ok(gate) if gate.is_ready() => eprintln!("Welcome aboard! → {}", Route::HOME),
        Ok(gate) => eprintln!("Profile saved; gate is {gate}."),
        Err(e) => eprintln!("Error: {}", e.user_message()),
    }
}

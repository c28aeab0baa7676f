//! Aquaview CLI
//!
//! Drives the client core against a live backend: session management,
//! the tasks board, and telemetry charts.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aquaview::config::{generate_default_config, Config};
use aquaview::controller::{
    AuthController, AutoConfirm, ConfirmPolicy, Notice, NoticeLevel, Notifier, TaskController,
    TaskService, PAGE_SIZE,
};
use aquaview::crm::TaskDraft;
use aquaview::gateway::Gateway;
use aquaview::session::SessionStore;
use aquaview::state::ViewFilter;
use aquaview::telemetry::{
    BucketInterval, ChartSeries, PollStatus, PollerConfig, SeriesPoller, SeriesSource,
    TelemetryClient, TimeRange,
};

#[derive(Parser)]
#[command(name = "aquaview")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Water-monitoring CRM and telemetry client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and persist the session
    Login {
        username: String,
        /// Password (prompted for if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Clear the persisted session
    Logout,

    /// Tasks board
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Print a chart for a telemetry variable
    Chart {
        /// Variable id on the IoT data API
        variable: String,
        /// How far back to query
        #[arg(short, long, default_value = "7")]
        days: i64,
        /// Bucket width (hour, day, week, month; default: fit to range)
        #[arg(short, long)]
        interval: Option<String>,
        /// Maximum samples to fetch
        #[arg(short, long, default_value = "500")]
        limit: usize,
    },

    /// Continuously poll telemetry variables and print their series
    Watch {
        /// Variable ids on the IoT data API
        #[arg(required = true)]
        variables: Vec<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks
    List {
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Filter: active, priority, or complete
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Create a task
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        priority: bool,
        /// Client id to attach the task to
        #[arg(short, long)]
        client: Option<u64>,
    },

    /// Mark a task complete
    Complete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a task
    Rm {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Notifier printing notices to the terminal
struct PrintNotifier;

impl Notifier for PrintNotifier {
    fn notify(&self, notice: Notice) {
        let prefix = match notice.level {
            NoticeLevel::Success => "ok:",
            NoticeLevel::Info => "--",
            NoticeLevel::Error => "error:",
        };
        println!("{} {}", prefix, notice.message);
    }
}

/// Confirmation prompt on stdin
struct StdinConfirm;

#[async_trait]
impl ConfirmPolicy for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = format!("{} [y/N] ", prompt);
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            print!("{}", prompt);
            let _ = std::io::stdout().flush();

            let mut answer = String::new();
            if std::io::stdin().read_line(&mut answer).is_err() {
                return false;
            }
            matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        })
        .await
        .unwrap_or(false)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("aquaview={}", config.logging.level)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let sessions = SessionStore::default_location();
    let notifier: Arc<dyn Notifier> = Arc::new(PrintNotifier);

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => read_line("Password: ").await?,
            };

            let gateway = Gateway::new(&config.api, None);
            let auth = AuthController::new(gateway, sessions, Arc::clone(&notifier));
            auth.login(&username, &password)
                .await
                .context("Login failed")?;
        }

        Commands::Logout => {
            let gateway = Gateway::new(&config.api, None);
            let auth = AuthController::new(gateway, sessions, Arc::clone(&notifier));
            auth.logout().context("Logout failed")?;
        }

        Commands::Tasks { command } => {
            let session = sessions.load().context("Failed to read session")?;
            if session.is_none() {
                anyhow::bail!("Not logged in; run `aquaview login <username>` first");
            }

            let gateway = Gateway::new(&config.api, session.as_ref());
            let service = TaskService::new(gateway);

            match command {
                TaskCommands::List { page, filter } => {
                    let controller = controller(service, &notifier, true);

                    match filter.as_deref() {
                        Some(name) => {
                            let filter = parse_filter(name)?;
                            controller.set_filter(filter).await;
                            if page > 1 {
                                controller.change_page(page).await;
                            }
                        }
                        None => controller.load(page).await,
                    }

                    print_tasks(&controller.state().await);
                }

                TaskCommands::Add {
                    title,
                    description,
                    priority,
                    client,
                } => {
                    let controller = controller(service, &notifier, true);

                    let mut draft = TaskDraft::new(title);
                    if let Some(description) = description {
                        draft = draft.description(description);
                    }
                    if priority {
                        draft = draft.priority();
                    }
                    if let Some(client) = client {
                        draft = draft.client(client);
                    }

                    controller.create(draft).await;
                }

                TaskCommands::Complete { id, yes } => {
                    let controller = controller(service, &notifier, yes);
                    controller.complete(id).await;
                }

                TaskCommands::Rm { id, yes } => {
                    let controller = controller(service, &notifier, yes);
                    controller.remove(id).await;
                }
            }
        }

        Commands::Chart {
            variable,
            days,
            interval,
            limit,
        } => {
            let client = TelemetryClient::new(&config.telemetry);
            let range = TimeRange::last_days(days);

            let interval = match interval {
                Some(s) => BucketInterval::parse(&s)
                    .with_context(|| format!("Unknown interval: {}", s))?,
                None => BucketInterval::for_range(&range),
            };

            let samples = client
                .fetch_series(&variable, &range, limit)
                .await
                .context("Failed to fetch series")?;

            let series = ChartSeries::build(&samples, interval);
            print_chart(&variable, &range, &series);
        }

        Commands::Watch { variables } => {
            let client = Arc::new(TelemetryClient::new(&config.telemetry));
            let poller = Arc::new(SeriesPoller::new(
                client,
                PollerConfig::from(&config.telemetry),
            ));

            for variable in &variables {
                poller.register(variable.clone()).await;
            }

            let handle = Arc::clone(&poller).start();
            println!(
                "Polling {} variable(s) every {}s; Ctrl-C to stop",
                variables.len(),
                config.telemetry.poll_interval_secs
            );

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_secs(
                        config.telemetry.poll_interval_secs,
                    )) => {
                        for variable in &variables {
                            if let Some(poll) = poller.get(variable).await {
                                print_poll(variable, &poll.status, poll.series.overall_mean());
                            }
                        }
                    }
                }
            }

            poller.stop().await;
            handle.abort();
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// Wire a task controller with the chosen confirmation policy
fn controller(
    service: TaskService,
    notifier: &Arc<dyn Notifier>,
    skip_confirm: bool,
) -> TaskController<TaskService> {
    let confirm: Arc<dyn ConfirmPolicy> = if skip_confirm {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(StdinConfirm)
    };
    TaskController::new(service, Arc::clone(notifier), confirm)
}

fn parse_filter(name: &str) -> anyhow::Result<ViewFilter> {
    match name.to_lowercase().as_str() {
        "active" => Ok(ViewFilter::Active),
        "priority" => Ok(ViewFilter::Priority),
        "complete" => Ok(ViewFilter::Complete),
        _ => anyhow::bail!("Unknown filter: {} (expected active, priority, or complete)", name),
    }
}

async fn read_line(prompt: &str) -> anyhow::Result<String> {
    let prompt = prompt.to_string();
    let line = tokio::task::spawn_blocking(move || {
        use std::io::Write;
        print!("{}", prompt);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;

    Ok(line.trim().to_string())
}

fn print_tasks(state: &aquaview::state::ViewState<aquaview::crm::Task>) {
    if let Some(error) = &state.error {
        println!("error: {}", error);
        return;
    }

    if state.data.is_empty() {
        println!("No tasks found");
        return;
    }

    for task in &state.data {
        let done = if task.complete { "x" } else { " " };
        let flag = if task.priority { "!" } else { " " };
        let due = task
            .due_date
            .map(|d| d.format(" due %d %b").to_string())
            .unwrap_or_default();

        println!("[{}]{} #{:<5} {}{}", done, flag, task.id, task.title, due);
    }

    println!(
        "\npage {} of {} ({} tasks)",
        state.page,
        state.total_pages(PAGE_SIZE),
        state.quantity
    );
}

fn print_poll(variable: &str, status: &PollStatus, mean: Option<f64>) {
    match status {
        PollStatus::Idle => println!("{:>16}  waiting for first poll", variable),
        PollStatus::Loading => println!("{:>16}  fetching...", variable),
        PollStatus::Success { samples } => match mean {
            Some(mean) => println!("{:>16}  mean {:.2} ({} samples)", variable, mean, samples),
            None => println!("{:>16}  no data in range", variable),
        },
        PollStatus::Failed { error } => println!("{:>16}  error: {}", variable, error),
    }
}

fn print_chart(variable: &str, range: &TimeRange, series: &ChartSeries) {
    println!("{} ({})", variable, range.label);

    if series.is_empty() {
        println!("(no data)");
        return;
    }

    let max = series
        .values()
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max);

    for bucket in &series.buckets {
        let width = if max > 0.0 {
            ((bucket.mean / max) * 40.0).round() as usize
        } else {
            0
        };
        println!(
            "{:>10}  {:>10.2}  {}",
            bucket.label,
            bucket.mean,
            "#".repeat(width)
        );
    }

    if let Some(mean) = series.overall_mean() {
        println!("\nmean: {:.2} over {} buckets", mean, series.len());
    }
}

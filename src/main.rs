use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use streamplan::{Backend, ConfigStore, MemoryStore, PlanningConfig, RenderConfig, SettingsStore};

#[derive(Parser)]
#[command(name = "streamplan", version, about = "Render stream schedules to images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one planning to an image; prints `true` or `false`
    Render {
        /// Planning JSON file
        #[arg(long)]
        planning: PathBuf,
        /// Settings JSON file (defaults are used when omitted)
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Override the planning's destFile
        #[arg(long)]
        out: Option<PathBuf>,
        /// Rendering backend: builtin or cdp
        #[arg(long)]
        backend: Option<Backend>,
        /// Render configuration JSON file
        #[arg(long)]
        render_config: Option<PathBuf>,
    },
    /// Render several plannings concurrently
    Batch {
        /// Planning JSON files
        #[arg(required = true)]
        plannings: Vec<PathBuf>,
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Maximum jobs in flight (0 = number of CPUs)
        #[arg(long, default_value_t = 0)]
        jobs: usize,
        #[arg(long)]
        render_config: Option<PathBuf>,
    },
    /// Print the generated markup
    Markup {
        #[arg(long)]
        planning: PathBuf,
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Inspect or edit a settings file
    Settings {
        /// Settings JSON file
        #[arg(long)]
        file: PathBuf,
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Seed missing defaults
    Init,
    Has { key: String },
    Get { key: String },
    /// Set a value; parsed as JSON, falling back to a plain string
    Set { key: String, value: String },
    Delete { key: String },
    /// Remove every stored value
    Reset,
}

fn read_planning(path: &Path) -> anyhow::Result<PlanningConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_render_config(path: Option<&Path>) -> anyhow::Result<RenderConfig> {
    match path {
        None => Ok(RenderConfig::default()),
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", p.display()))
        }
    }
}

fn open_store(path: Option<&Path>) -> anyhow::Result<Box<dyn ConfigStore>> {
    match path {
        None => Ok(Box::new(MemoryStore::with_defaults())),
        Some(p) => {
            let mut store = SettingsStore::open(p)?;
            store.init_defaults()?;
            Ok(Box::new(store))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Command::Render { planning, settings, out, backend, render_config } => {
            let mut planning = read_planning(&planning)?;
            if let Some(out) = out {
                planning.dest_file = Some(out);
            }
            let mut render = read_render_config(render_config.as_deref())?;
            if let Some(backend) = backend {
                render.backend = backend;
            }
            let store = open_store(settings.as_deref())?;
            let ok = streamplan::run_planning_render_with(&planning, store.as_ref(), &render).await?;
            println!("{}", ok);
            Ok(ok)
        }
        Command::Batch { plannings, settings, jobs, render_config } => {
            let configs = plannings
                .iter()
                .map(|p| read_planning(p))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let render = read_render_config(render_config.as_deref())?;
            let store = open_store(settings.as_deref())?;

            let results = streamplan::render_batch(&configs, store.as_ref(), &render, jobs).await;
            let mut all_ok = true;
            for (path, res) in plannings.iter().zip(results) {
                match res {
                    Ok(ok) => {
                        println!("{}: {}", path.display(), ok);
                        all_ok &= ok;
                    }
                    Err(e) => {
                        println!("{}: error: {}", path.display(), e);
                        all_ok = false;
                    }
                }
            }
            Ok(all_ok)
        }
        Command::Markup { planning, settings } => {
            let planning = read_planning(&planning)?;
            let store = open_store(settings.as_deref())?;
            print!("{}", streamplan::generate_planning(&planning, store.as_ref())?);
            Ok(true)
        }
        Command::Settings { file, action } => {
            let mut store = SettingsStore::open(&file)?;
            match action {
                SettingsAction::Init => store.init_defaults()?,
                SettingsAction::Has { key } => println!("{}", store.has(&key)),
                SettingsAction::Get { key } => match store.get(&key) {
                    Some(v) => println!("{}", v),
                    None => bail!("no value for '{}'", key),
                },
                SettingsAction::Set { key, value } => {
                    let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
                    store.set(&key, value)?;
                }
                SettingsAction::Delete { key } => store.delete(&key)?,
                SettingsAction::Reset => store.reset()?,
            }
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

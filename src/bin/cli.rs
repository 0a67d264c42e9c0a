// PodFetch - Podcast Episode Download Client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use podfetch_core::config::{DEFAULT_SERVER_URL, ENV_APPLICATION_ROOT, ENV_DOWNLOAD_DIR, ENV_SERVER_URL};
use podfetch_core::download::{DownloadProgress, DownloadState};
use podfetch_core::render::Node;
use podfetch_core::{logging, ApiClient, App, ClientConfig, ClientError, Page, Region, Surface};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Parser)]
#[command(name = "podfetch-cli")]
#[command(about = "PodFetch CLI - download podcast episodes through a PodFetch server", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, global = true, env = ENV_SERVER_URL, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Path prefix when the server sits behind a reverse proxy
    #[arg(long, global = true, env = ENV_APPLICATION_ROOT, default_value = "")]
    root: String,

    /// Directory downloaded files are saved into
    #[arg(short = 'o', long, global = true, env = ENV_DOWNLOAD_DIR, default_value = ".")]
    download_dir: PathBuf,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    /// Print escaped HTML fragments instead of text
    #[arg(long, global = true)]
    html: bool,

    /// More log output, repeat for debug
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show title, description and cover of an episode page
    Info {
        /// Episode page URL
        url: String,
    },
    /// Download a single episode by its page URL
    Download {
        url: String,
        /// Have the server convert m4a to mp3
        #[arg(long)]
        mp3: bool,
    },
    /// List users
    Users,
    /// Create a user, or load an existing one
    Login { username: String },
    /// Upload an OPML file for a user
    Opml {
        #[arg(short, long, env = "PODFETCH_USER")]
        user: String,
        file: PathBuf,
    },
    /// List the subscriptions of a user
    Subscriptions {
        #[arg(short, long, env = "PODFETCH_USER")]
        user: String,
    },
    /// List the episodes of one subscription
    Episodes {
        #[arg(short, long, env = "PODFETCH_USER")]
        user: String,
        /// Position in the subscriptions list
        index: usize,
    },
    /// Download one episode of a subscription
    FetchEpisode {
        #[arg(short, long, env = "PODFETCH_USER")]
        user: String,
        /// Position in the subscriptions list
        subscription: usize,
        /// Position in the episode list
        episode: usize,
        #[arg(long)]
        mp3: bool,
    },
    /// Start a task downloading the newest episodes of every subscription
    Latest {
        #[arg(short, long, env = "PODFETCH_USER")]
        user: String,
        /// Episodes per subscription
        #[arg(short = 'n', long, default_value_t = 5)]
        count: u32,
        #[arg(long)]
        mp3: bool,
    },
    /// Start a task downloading every new episode as it is published
    Monitor {
        #[arg(short, long, env = "PODFETCH_USER")]
        user: String,
        #[arg(long)]
        mp3: bool,
    },
    /// Show background tasks
    Tasks {
        /// Keep refreshing until Ctrl-C
        #[arg(short, long)]
        watch: bool,
    },
    /// Cancel a pending or running task
    Cancel { task_id: String },
    /// List downloaded files, optionally running a batch action on a selection
    Downloads {
        /// Only files of this user
        #[arg(short, long)]
        user: Option<String>,
        /// File ids to select, comma separated
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,
        /// Select every listed file
        #[arg(long, conflicts_with = "select")]
        all: bool,
        /// File ids whose details are shown
        #[arg(long, value_delimiter = ',')]
        details: Vec<String>,
        /// Action to run on the selection
        #[arg(long, value_enum)]
        batch: Option<BatchAction>,
    },
    /// Fetch a stored file into the download directory
    Get { file_id: String },
    /// Convert a stored m4a file to mp3
    Convert { file_id: String },
    /// Delete a stored file
    Delete { file_id: String },
    /// Check whether the server can convert to mp3
    Ffmpeg,
}

#[derive(Clone, Copy, ValueEnum)]
enum BatchAction {
    Download,
    Convert,
    Delete,
}

// ===== Terminal surface =====

struct TerminalSurface {
    html: bool,
    assume_yes: bool,
    /// Print renders immediately instead of keeping the latest per region
    live: AtomicBool,
    regions: Mutex<Vec<(Region, Node)>>,
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl TerminalSurface {
    fn new(html: bool, assume_yes: bool) -> Self {
        Self {
            html,
            assume_yes,
            live: AtomicBool::new(false),
            regions: Mutex::new(Vec::new()),
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    fn format(&self, region: Region, node: &Node) -> String {
        let body = if self.html { node.to_html() } else { node.to_text() };
        format!("== {} ==\n{}", region.as_str(), body)
    }

    /// Print the latest content of every region, in first-render order
    fn flush(&self) {
        let regions: Vec<(Region, Node)> = match self.regions.lock() {
            Ok(mut regions) => regions.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for (region, node) in regions {
            let out = self.format(region, &node);
            self.multi.suspend(|| println!("{}\n", out));
        }
    }

    fn bar_style(known_total: bool) -> ProgressStyle {
        let template = if known_total {
            "{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})"
        } else {
            "{spinner} {msg} {bytes}"
        };
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Surface for TerminalSurface {
    fn render(&self, region: Region, node: Node) {
        if self.live.load(Ordering::SeqCst) {
            let out = self.format(region, &node);
            self.multi.suspend(|| println!("{}\n", out));
            return;
        }
        let mut regions = match self.regions.lock() {
            Ok(regions) => regions,
            Err(poisoned) => poisoned.into_inner(),
        };
        match regions.iter_mut().find(|(r, _)| *r == region) {
            Some(slot) => slot.1 = node,
            None => regions.push((region, node)),
        }
    }

    fn alert(&self, message: &str) {
        self.multi.suspend(|| println!("{}\n", message));
    }

    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        self.multi.suspend(|| {
            print!("{} [y/N] ", message);
            let _ = std::io::stdout().flush();
            let mut answer = String::new();
            match std::io::stdin().lock().read_line(&mut answer) {
                Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
                Err(_) => false,
            }
        })
    }

    fn progress(&self, key: &str, progress: &DownloadProgress) {
        let mut bars = match self.bars.lock() {
            Ok(bars) => bars,
            Err(poisoned) => poisoned.into_inner(),
        };

        let bar = bars.entry(key.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::bar_style(false));
            bar
        });

        match progress.state {
            DownloadState::Completed => {
                bar.finish_with_message(format!("{}: {}", progress.label, progress.display_string()));
                bars.remove(key);
            }
            DownloadState::Failed => {
                bar.abandon_with_message(format!("{}: {}", progress.label, progress.display_string()));
                bars.remove(key);
            }
            DownloadState::Downloading => {
                if let Some(total) = progress.total_bytes {
                    if bar.length() != Some(total) {
                        bar.set_length(total);
                        bar.set_style(Self::bar_style(true));
                    }
                }
                bar.set_message(progress.label.clone());
                bar.set_position(progress.bytes_downloaded);
            }
            DownloadState::Preparing | DownloadState::Converting => {
                bar.set_message(format!("{}: {}", progress.label, progress.display_string()));
                bar.tick();
            }
        }
    }
}

// ===== Commands =====

/// Exit code for an action whose failure the page already reported
fn reported<T>(result: podfetch_core::Result<T>) -> ExitCode {
    match result {
        Ok(_) | Err(ClientError::Cancelled) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli, surface: Arc<TerminalSurface>) -> anyhow::Result<ExitCode> {
    let config = ClientConfig::builder()
        .server_url(cli.server)
        .application_root(cli.root)
        .download_dir(cli.download_dir)
        .build()
        .context("invalid configuration")?;
    let api = ApiClient::new(config).context("could not create the HTTP client")?;
    let mut app = App::new(api.clone(), surface.clone());

    let code = match cli.command {
        Commands::Info { url } => reported(app.episode.fetch_info(&url).await),
        Commands::Download { url, mp3 } => {
            let result = async {
                app.episode.fetch_info(&url).await?;
                app.episode.download(mp3).await
            }
            .await;
            reported(result)
        }
        Commands::Users => {
            app.navigate(Page::Subscriptions)
                .await
                .context("loading users failed")?;
            ExitCode::SUCCESS
        }
        Commands::Login { username } => reported(app.subscriptions.create_user(&username).await),
        Commands::Opml { user, file } => {
            let result = async {
                app.subscriptions.select_user(&user).await?;
                app.subscriptions.upload_opml(Some(&file)).await
            }
            .await;
            reported(result)
        }
        Commands::Subscriptions { user } => {
            app.navigate(Page::Subscriptions)
                .await
                .context("loading users failed")?;
            reported(app.subscriptions.select_user(&user).await)
        }
        Commands::Episodes { user, index } => {
            let result = async {
                app.subscriptions.select_user(&user).await?;
                app.subscriptions.load_episodes(index).await
            }
            .await;
            reported(result)
        }
        Commands::FetchEpisode {
            user,
            subscription,
            episode,
            mp3,
        } => {
            let result = async {
                app.subscriptions.select_user(&user).await?;
                app.subscriptions.load_episodes(subscription).await?;
                app.subscriptions.download_episode_file(episode, mp3).await
            }
            .await;
            reported(result)
        }
        Commands::Latest { user, count, mp3 } => {
            let result = async {
                app.subscriptions.select_user(&user).await?;
                app.download_latest(count, mp3).await
            }
            .await;
            reported(result)
        }
        Commands::Monitor { user, mp3 } => {
            let result = async {
                app.subscriptions.select_user(&user).await?;
                app.start_monitor(mp3).await
            }
            .await;
            reported(result)
        }
        Commands::Tasks { watch } => {
            if watch {
                surface.set_live(true);
            }
            app.navigate(Page::Tasks)
                .await
                .context("loading tasks failed")?;
            if watch {
                info!("watching tasks, press Ctrl-C to stop");
                tokio::signal::ctrl_c()
                    .await
                    .context("waiting for Ctrl-C failed")?;
                app.navigate(Page::Episode).await?;
                surface.set_live(false);
            }
            ExitCode::SUCCESS
        }
        Commands::Cancel { task_id } => {
            app.navigate(Page::Tasks)
                .await
                .context("loading tasks failed")?;
            let code = reported(app.tasks.cancel(&task_id).await);
            app.navigate(Page::Episode).await?;
            code
        }
        Commands::Downloads {
            user,
            select,
            all,
            details,
            batch,
        } => {
            app.navigate(Page::Downloads)
                .await
                .context("loading downloads failed")?;
            if let Some(user) = user {
                app.downloads
                    .filter_by_user(&user)
                    .await
                    .context("loading downloads failed")?;
            }
            for file_id in &details {
                app.downloads.toggle_details(file_id)?;
            }
            if all {
                app.downloads.select_all();
            } else {
                for file_id in &select {
                    app.downloads.toggle_selection(file_id)?;
                }
            }
            match batch {
                Some(BatchAction::Download) => reported(app.downloads.batch_download().await),
                Some(BatchAction::Convert) => reported(app.downloads.batch_convert().await),
                Some(BatchAction::Delete) => reported(app.downloads.batch_delete().await),
                None => ExitCode::SUCCESS,
            }
        }
        Commands::Get { file_id } => {
            app.navigate(Page::Downloads)
                .await
                .context("loading downloads failed")?;
            reported(app.downloads.download_file(&file_id).await)
        }
        Commands::Convert { file_id } => {
            app.navigate(Page::Downloads)
                .await
                .context("loading downloads failed")?;
            reported(app.downloads.convert(&file_id).await)
        }
        Commands::Delete { file_id } => {
            app.navigate(Page::Downloads)
                .await
                .context("loading downloads failed")?;
            reported(app.downloads.delete(&file_id).await)
        }
        Commands::Ffmpeg => {
            let status = api
                .ffmpeg_status()
                .await
                .context("checking ffmpeg failed")?;
            let state = if status.available { "available" } else { "not available" };
            println!("ffmpeg {}: {}", state, status.message);
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let surface = Arc::new(TerminalSurface::new(cli.html, cli.yes));
    let result = run(cli, surface.clone()).await;
    surface.flush();
    result
}

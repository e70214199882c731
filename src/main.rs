#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use anyhow::{anyhow, Context, Result};
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;
    use voicemail_playback::api::{apply_read_update, Voicemail, VoicemailClient};
    use voicemail_playback::db::{self, PlayerSettings};
    use voicemail_playback::diagnostics::{init_logging, DEFAULT_LOG_FILTER};
    use voicemail_playback::playback::{extension_for_mime, RetrievalCoordinator};
    use voicemail_playback::utils::sanitize_file_component;

    #[derive(Parser, Debug)]
    #[command(name = "vmplay", version, about = "Fetch and play voicemail recordings")]
    pub struct Cli {
        /// Voicemail service base URL (overrides the stored setting)
        #[arg(long, env = "VMPLAY_SERVER")]
        server: Option<String>,

        /// Directory for temporary recording files
        #[arg(long)]
        #[cfg_attr(not(feature = "native-audio"), allow(dead_code))]
        cache_dir: Option<PathBuf>,

        /// Persist --server as the new default
        #[arg(long)]
        save: bool,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand, Debug)]
    enum Command {
        /// List voicemails, unread first
        List,
        /// Mark a voicemail read and save its recording to disk
        Fetch {
            id: String,
            /// Output file (defaults to `<id>.<ext>` in the current directory)
            #[arg(short, long)]
            out: Option<PathBuf>,
        },
        /// Mark a voicemail read and play it through the default output device
        #[cfg(feature = "native-audio")]
        Play { id: String },
    }

    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        init_logging(DEFAULT_LOG_FILTER);

        db::initialize_database()
            .await
            .context("failed to open settings database")?;
        let mut settings = db::load_settings().await.unwrap_or_else(|err| {
            tracing::warn!(%err, "using default settings");
            PlayerSettings::default()
        });
        if let Some(server) = &cli.server {
            settings.server_url = server.clone();
        }
        let settings = settings.normalized();
        if cli.save {
            db::save_settings(settings.clone())
                .await
                .context("failed to save settings")?;
        }

        let client = VoicemailClient::new(&settings.server_url, settings.request_timeout())
            .context("failed to build HTTP client")?;

        match cli.command {
            Command::List => list(&client).await,
            Command::Fetch { id, out } => fetch(&client, &id, out).await,
            #[cfg(feature = "native-audio")]
            Command::Play { id } => play(client, &settings, cli.cache_dir, &id).await,
        }
    }

    async fn find(client: &VoicemailClient, id: &str) -> Result<Voicemail> {
        let voicemails = client
            .list_voicemails()
            .await
            .context("failed to list voicemails")?;
        voicemails
            .into_iter()
            .find(|vm| vm.id == id)
            .ok_or_else(|| anyhow!("no voicemail with id {id}"))
    }

    async fn list(client: &VoicemailClient) -> Result<()> {
        let mut voicemails = client
            .list_voicemails()
            .await
            .context("failed to list voicemails")?;
        voicemails.sort_by(|a, b| b.unread.cmp(&a.unread).then(b.date.cmp(&a.date)));

        for vm in &voicemails {
            println!(
                "{marker} {id:>4}  {date}  {name:<20} {number:<16} {spam}{description}",
                marker = if vm.unread { "*" } else { " " },
                id = vm.id,
                date = vm.date.format("%Y-%m-%d %H:%M"),
                name = vm.name,
                number = vm.number,
                spam = if vm.spam { "[spam] " } else { "" },
                description = vm.description,
            );
        }
        println!("{} voicemail(s)", voicemails.len());
        Ok(())
    }

    async fn fetch(client: &VoicemailClient, id: &str, out: Option<PathBuf>) -> Result<()> {
        let mut collection = vec![find(client, id).await?];
        let coordinator = RetrievalCoordinator::new(client.clone());

        let retrieval = coordinator
            .retrieve_and_prepare(&collection[0])
            .await
            .context("failed to retrieve recording")?;
        apply_read_update(&mut collection, &retrieval.updated);

        let payload = retrieval.payload.context("recording could not be encoded")?;
        let bytes = payload.decode_bytes()?;
        let out = out.unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}.{}",
                sanitize_file_component(id),
                extension_for_mime(payload.mime_type())
            ))
        });
        tokio::fs::write(&out, &bytes)
            .await
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("saved {} bytes to {}", bytes.len(), out.display());
        Ok(())
    }

    #[cfg(feature = "native-audio")]
    async fn play(
        client: VoicemailClient,
        settings: &PlayerSettings,
        cache_dir: Option<PathBuf>,
        id: &str,
    ) -> Result<()> {
        use std::time::Duration;
        use voicemail_playback::playback::{
            NativeFileBackend, PlaybackState, RodioOutput, SelectionOutcome, VoicemailPlayer,
        };

        let voicemail = find(&client, id).await?;
        let backend = match cache_dir {
            Some(dir) => NativeFileBackend::new(dir),
            None => NativeFileBackend::in_platform_cache(&settings.cache_subdir)?,
        };
        if settings.purge_cache_on_start {
            backend.purge_orphans().await;
        }
        let output = RodioOutput::new().context("failed to open audio output")?;
        let player = VoicemailPlayer::new(client, backend, output).with_autoplay(true);

        match player.select(&voicemail).await {
            SelectionOutcome::Attached { .. } => {}
            other => {
                player.close().await;
                return Err(anyhow!("cannot play voicemail {id}: {other:?}"));
            }
        }
        println!("playing voicemail {id} from {} (ctrl-c to stop)", voicemail.name);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = tokio::time::sleep(Duration::from_millis(250)) => {
                    if player.state() != PlaybackState::Playing {
                        player.dispose_if_failed().await;
                        break;
                    }
                }
            }
        }

        let error = player.snapshot().error;
        player.close().await;
        match error {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}

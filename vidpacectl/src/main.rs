//! `vidpacectl`: manage stored vidpace preferences from a terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidpace_config::{ConfigLoader, VidpaceConfig};
use vidpace_core::{
    Coordinator, CoordinatorHandle, FilePreferenceStore, PageHub, SettingsForm,
};
use vidpace_model::{Language, PreferencePatch, PreferenceSet, SeekSlot};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "vidpacectl")]
#[command(about = "Inspect and edit vidpace playback preferences")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file layered over the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preference file (overrides config)
    #[arg(long)]
    store: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write default preferences if none are stored yet
    Install,
    /// Stamp the current schema version after an upgrade
    Upgrade {
        /// Version being upgraded from
        #[arg(long = "from")]
        from: String,
    },
    /// Print the stored preferences merged over the defaults
    Show,
    /// Change preferences; invalid durations fall back to their defaults
    Set(SetArgs),
    /// Restore the default preferences
    Reset,
}

#[derive(ClapArgs, Debug, Default)]
struct SetArgs {
    /// Seconds the primary rewind key moves back
    #[arg(long)]
    rewind_primary: Option<String>,

    /// Seconds the secondary rewind key moves back
    #[arg(long)]
    rewind_secondary: Option<String>,

    /// Seconds the secondary forward key moves ahead
    #[arg(long)]
    forward_secondary: Option<String>,

    /// Seconds the primary forward key moves ahead
    #[arg(long)]
    forward_primary: Option<String>,

    /// Interface language: auto, en or zh
    #[arg(long)]
    language: Option<Language>,
}

impl SetArgs {
    fn raw(&self, slot: SeekSlot) -> Option<&str> {
        match slot {
            SeekSlot::RewindPrimary => self.rewind_primary.as_deref(),
            SeekSlot::RewindSecondary => self.rewind_secondary.as_deref(),
            SeekSlot::ForwardSecondary => self.forward_secondary.as_deref(),
            SeekSlot::ForwardPrimary => self.forward_primary.as_deref(),
        }
    }

    /// Runs the given values through the same form validation as the
    /// settings panel and keeps only the fields that were passed.
    fn to_patch(&self, current: &PreferenceSet) -> PreferencePatch {
        let mut form = SettingsForm::from(current);
        for slot in SeekSlot::ALL {
            if let Some(raw) = self.raw(slot) {
                form.set_field(slot, raw);
            }
        }
        if let Some(language) = self.language {
            form.language = language;
        }

        let next = form.to_preferences(current);
        let passed = |slot: SeekSlot| self.raw(slot).map(|_| next.seconds(slot));
        PreferencePatch {
            rewind_primary: passed(SeekSlot::RewindPrimary),
            rewind_secondary: passed(SeekSlot::RewindSecondary),
            forward_secondary: passed(SeekSlot::ForwardSecondary),
            forward_primary: passed(SeekSlot::ForwardPrimary),
            language: self.language,
            schema_version: None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;
    debug!(store = %config.store_path.display(), source = ?config.source, "configuration loaded");

    let store = Arc::new(FilePreferenceStore::new(&config.store_path));
    let coordinator = Coordinator::new(store, Arc::new(PageHub::new()), &config)
        .spawn(config.channel_capacity);

    let outcome = run(&cli.command, &coordinator).await;
    coordinator.shutdown().await;
    let preferences = outcome?;

    println!("{}", serde_json::to_string_pretty(&preferences)?);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<VidpaceConfig> {
    let mut loader = ConfigLoader::new().with_dotenv(true);
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().context("failed to load configuration")?;
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    Ok(config)
}

async fn run(
    command: &Command,
    coordinator: &CoordinatorHandle,
) -> anyhow::Result<PreferenceSet> {
    let preferences = match command {
        Command::Install => coordinator.install().await?,
        Command::Upgrade { from } => coordinator.update(from.as_str()).await?,
        Command::Show => coordinator.get_settings().await?,
        Command::Set(args) => {
            let current = coordinator.get_settings().await?;
            let patch = args.to_patch(&current);
            if patch.is_empty() {
                info!("nothing to change");
                current
            } else {
                coordinator.save_settings(patch).await?
            }
        }
        Command::Reset => coordinator.reset_settings().await?,
    };
    Ok(preferences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_only_passed_fields_and_coerces_them() {
        let args = SetArgs {
            rewind_primary: Some("0".into()),
            forward_primary: Some("45".into()),
            language: Some(Language::Zh),
            ..SetArgs::default()
        };
        let patch = args.to_patch(&PreferenceSet::default());
        assert_eq!(patch.rewind_primary, Some(PreferenceSet::DEFAULT_REWIND_PRIMARY));
        assert_eq!(patch.forward_primary.map(|s| s.get()), Some(45));
        assert_eq!(patch.rewind_secondary, None);
        assert_eq!(patch.language, Some(Language::Zh));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

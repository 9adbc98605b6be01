//! `soundscape` - CLI for the soundscape archive
//!
//! This binary runs the HTTP API and offers command-line access to the
//! stored sounds and their analytics.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;

use soundscape::analytics::recommendations;
use soundscape::cli::output::{
    render_nearby, render_recommendations, render_report, render_sound, render_sounds,
    render_stats,
};
use soundscape::cli::{
    AddCommand, Cli, Command, ConfigCommand, ListCommand, NearbyCommand, RecommendCommand,
    SearchCommand,
};
use soundscape::storage::TagOutcome;
use soundscape::{
    api, init_logging, seed, Aggregator, Config, Coordinates, Error, NewSound, SearchFilter,
    Storage, UploadPolicy, UploadStore,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(config, cmd.bind),
        Command::Add(cmd) => handle_add(&config, cmd),
        Command::List(cmd) => handle_list(&config, &cmd),
        Command::Show(cmd) => handle_show(&config, cmd.id, cmd.json),
        Command::Nearby(cmd) => handle_nearby(&config, &cmd),
        Command::Search(cmd) => handle_search(&config, cmd),
        Command::Tag(cmd) => handle_tag(&config, cmd.id, &cmd.tag),
        Command::Delete(cmd) => handle_delete(&config, cmd.id),
        Command::Analytics(cmd) => handle_analytics(&config, cmd.json),
        Command::Recommend(cmd) => handle_recommend(&config, &cmd),
        Command::Stats(cmd) => handle_stats(&config, cmd.json),
        Command::Seed => handle_seed(&config),
        Command::Clear(cmd) => handle_clear(&config, cmd.yes),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening database {}", path.display()))
}

fn upload_store(config: &Config) -> UploadStore {
    UploadStore::new(
        config.upload_dir(),
        UploadPolicy {
            allowed: config.allowed_formats(),
            max_bytes: config.upload.max_upload_bytes,
        },
    )
}

fn handle_serve(mut config: Config, bind: Option<String>) -> anyhow::Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
        config.validate()?;
    }
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(api::serve(&config))?;
    Ok(())
}

fn handle_add(config: &Config, cmd: AddCommand) -> anyhow::Result<()> {
    let mut sound = NewSound::new(cmd.name, Coordinates::new(cmd.lat, cmd.lng));
    sound.author = cmd.author;
    sound.description = cmd.description.unwrap_or_default();
    sound.emotions = cmd.emotions;
    sound.tags = cmd.tags;
    sound.sound_types = cmd.sound_types;
    sound.duration_secs = cmd.duration;
    sound.quality = cmd.quality.into();
    sound.validate()?;

    let storage = open_storage(config)?;
    let uploads = upload_store(config);

    if let Some(path) = &cmd.audio {
        let content =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stored = uploads.save(&name, &content, None)?;
        sound.audio_url = Some(stored.url);
    }

    let id = match storage.insert(&sound) {
        Ok(id) => id,
        Err(e) => {
            if let Some(url) = &sound.audio_url {
                let _ = uploads.remove(url);
            }
            return Err(e.into());
        }
    };

    println!("Added sound #{id}: {}", sound.name);
    if let Some(url) = &sound.audio_url {
        println!("  Audio: {url}");
    }
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let sounds = match &cmd.emotion {
        Some(emotion) => storage.by_emotion(emotion, cmd.limit)?,
        None => storage.list_recent(cmd.limit)?,
    };
    println!("{}", render_sounds(&sounds, cmd.format, Utc::now())?);
    Ok(())
}

fn handle_show(config: &Config, id: i64, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let sound = storage.get(id)?.ok_or(Error::SoundNotFound { id })?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sound)?);
    } else {
        println!("{}", render_sound(&sound, Utc::now()));
    }
    Ok(())
}

fn handle_nearby(config: &Config, cmd: &NearbyCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let hits = storage.nearby(Coordinates::new(cmd.lat, cmd.lng), cmd.radius, cmd.limit)?;
    println!("{}", render_nearby(&hits, cmd.format, Utc::now())?);
    Ok(())
}

fn handle_search(config: &Config, cmd: SearchCommand) -> anyhow::Result<()> {
    let filter = SearchFilter {
        text: cmd.query,
        emotion: cmd.emotion,
        tag: cmd.tag,
        author: cmd.author,
    };
    let storage = open_storage(config)?;
    let results = storage.search(&filter, cmd.limit)?;
    println!("{}", render_sounds(&results, cmd.format, Utc::now())?);
    Ok(())
}

fn handle_tag(config: &Config, id: i64, tag: &str) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match storage.add_tag(id, tag)? {
        TagOutcome::Added => println!("Tagged sound #{id} with \"{}\"", tag.trim()),
        TagOutcome::AlreadyPresent => {
            println!("Sound #{id} is already tagged \"{}\"", tag.trim());
        }
        TagOutcome::NotFound => return Err(Error::SoundNotFound { id }.into()),
    }
    Ok(())
}

fn handle_delete(config: &Config, id: i64) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let sound = storage.delete(id)?.ok_or(Error::SoundNotFound { id })?;
    if let Some(url) = &sound.audio_url {
        if let Err(e) = upload_store(config).remove(url) {
            eprintln!("Warning: could not remove audio file {url}: {e}");
        }
    }
    println!("Deleted sound #{id}: {}", sound.name);
    Ok(())
}

fn handle_analytics(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let sounds = storage.all()?;
    let report =
        Aggregator::new(config.analytics.clone()).report(&sounds, Utc::now().date_naive());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
    }
    Ok(())
}

fn handle_recommend(config: &Config, cmd: &RecommendCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let id = cmd.id;
    let reference = storage.get(id)?.ok_or(Error::SoundNotFound { id })?;
    let similar = recommendations(&reference, &storage.all()?, cmd.limit);
    if cmd.format != soundscape::cli::OutputFormat::Json {
        println!("Sounds similar to #{id}: {}", reference.name);
    }
    println!(
        "{}",
        render_recommendations(&similar, cmd.format, Utc::now())?
    );
    Ok(())
}

fn handle_stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "{}",
            render_stats(&stats, &storage.path().display().to_string())
        );
    }
    Ok(())
}

fn handle_seed(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let ids = seed::seed(&storage, Utc::now())?;
    println!("Inserted {} sample sounds", ids.len());
    Ok(())
}

fn handle_clear(config: &Config, yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!("This will delete every sound and its audio file.");
        println!("Use --yes to confirm.");
        return Ok(());
    }

    let storage = open_storage(config)?;
    let uploads = upload_store(config);
    let audio: Vec<String> = storage
        .all()?
        .into_iter()
        .filter_map(|s| s.audio_url)
        .collect();

    let removed = storage.clear()?;
    for url in &audio {
        if let Err(e) = uploads.remove(url) {
            eprintln!("Warning: could not remove audio file {url}: {e}");
        }
    }
    println!("Deleted {removed} sounds");
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!("  Frontend URL:       {}", config.server.frontend_url);
                println!();
                println!("[Upload]");
                println!("  Directory:          {}", config.upload_dir().display());
                println!(
                    "  Max size:           {}",
                    soundscape::format::format_file_size(config.upload.max_upload_bytes)
                );
                println!(
                    "  Extensions:         {}",
                    config.upload.allowed_extensions.join(", ")
                );
                println!();
                println!("[Analytics]");
                println!("  Timeline days:      {}", config.analytics.timeline_days);
                println!("  Top emotions:       {}", config.analytics.top_emotions);
                println!("  Top locations:      {}", config.analytics.top_locations);
                println!(
                    "  Location precision: {}",
                    config.analytics.location_precision
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

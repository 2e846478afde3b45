// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use onair::config::{validate_show, Settings, ShowEvent, ShowFile, ShowWatcher};
use onair::{RundownHandle, RundownService, RundownStore};

fn print_usage() {
    println!("ONAIR - Live rundown automation");
    println!();
    println!("Usage: onair <SHOW.yaml> [OPTIONS]");
    println!("       onair --validate <SHOW.yaml>");
    println!();
    println!("Options:");
    println!("  --settings <FILE>   Engine settings (TOML)");
    println!("  --takes <N>         Take N times after activation");
    println!("  --rehearsal         Enter rehearsal instead of going on air");
    println!("  --watch             Apply show file edits live until Ctrl+C");
    println!("  --help              Show this help message");
}

struct Options {
    show: PathBuf,
    settings: Settings,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut show = None;
    let mut settings_path = None;
    let mut takes = None;
    let mut rehearsal = false;
    let mut watch = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--settings" => {
                let path = iter.next().ok_or_else(|| anyhow!("--settings requires a file"))?;
                settings_path = Some(PathBuf::from(path));
            }
            "--takes" => {
                let n = iter.next().ok_or_else(|| anyhow!("--takes requires a number"))?;
                takes = Some(n.parse::<u32>().map_err(|_| anyhow!("Invalid take count: {}", n))?);
            }
            "--rehearsal" => rehearsal = true,
            "--watch" => watch = true,
            other if other.starts_with("--") => bail!("Unknown option: {}", other),
            path => show = Some(PathBuf::from(path)),
        }
    }

    let mut settings = match settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(n) = takes {
        settings.playout.takes = n;
    }
    settings.playout.rehearsal |= rehearsal;
    settings.ingest.watch |= watch;

    Ok(Options {
        show: show.ok_or_else(|| anyhow!("No show file given"))?,
        settings,
    })
}

fn init_logging(settings: &Settings) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter)),
        )
        .init();
}

async fn play(options: Options) -> Result<()> {
    let show = ShowFile::load(&options.show)?;
    let store = RundownStore::in_memory();
    store.put_studio(show.studio.clone()).await?;

    let (service, handle) = RundownService::new(show.to_rundown(), show.studio.clone());
    let task = tokio::spawn(service.with_store(store).run());

    if options.settings.playout.rehearsal {
        handle.enter_rehearsal().await?;
    } else {
        handle.activate().await?;
    }
    for _ in 0..options.settings.playout.takes {
        handle.take_next().await?;
    }

    print_timeline(&handle).await?;

    if options.settings.ingest.watch {
        watch(&handle, &options).await?;
    }

    handle.shutdown().await;
    task.await.context("Rundown service panicked")?;
    Ok(())
}

async fn print_timeline(handle: &RundownHandle) -> Result<()> {
    let timeline = handle.build_timeline().await?;
    print!("{}", serde_yaml::to_string(&timeline)?);
    Ok(())
}

async fn watch(handle: &RundownHandle, options: &Options) -> Result<()> {
    let mut watcher = ShowWatcher::new(&options.show, options.settings.ingest.debounce_ms)?;
    info!(path = ?watcher.watched_path(), "watching show for edits");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            event = watcher.recv() => match event {
                Some(ShowEvent::Reloaded(show)) => match handle.sync(show.segments()).await {
                    Ok(0) => {}
                    Ok(changes) => {
                        info!(changes, "show edits applied");
                        print_timeline(handle).await?;
                    }
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => warn!(error = %e, "show edits rejected"),
                },
                Some(ShowEvent::Error(message)) => warn!("{}", message),
                Some(ShowEvent::Removed(path)) => warn!(path = ?path, "show file removed"),
                None => return Ok(()),
            },
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("ONAIR - Live rundown automation");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--validate" => {
            let path = args
                .get(2)
                .ok_or_else(|| anyhow!("--validate requires a show file"))?;
            let show = validate_show(path)?;
            println!(
                "{}: {} segments, {} layers",
                show.rundown.id,
                show.rundown.segments.len(),
                show.studio.layers.len()
            );
            Ok(())
        }
        _ => {
            let options = parse_args(&args)?;
            init_logging(&options.settings);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(play(options))
        }
    }
}

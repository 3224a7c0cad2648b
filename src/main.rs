use std::{
    io::Read,
    path::Path,
    sync::{Arc, RwLock},
};

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use homedir::my_home;
use inquire::error::InquireResult;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod annotations;
mod app;
mod bookmarks;
mod cli;
mod config;
mod db;
mod eid;
mod errors;
mod lists;
mod lock;
mod pages;
mod search;
mod sharing;
mod storage;
mod url;
mod web;

use annotations::CreateAnnotationParams;
use cli::{AnnotationCommand, BookmarkCommand, ListCommand, SearchCommand};
use config::Config;
use pages::PageData;

pub fn parse_tags(tags: String) -> Vec<String> {
    tags.split(',')
        .flat_map(|value| value.split(' ').filter(|value| !value.is_empty()))
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
}

fn base_path() -> anyhow::Result<String> {
    if let Ok(base_path) = std::env::var("MG_BASE_PATH") {
        return Ok(base_path);
    }
    let home = my_home()?.context("home directory is unknown, set MG_BASE_PATH")?;
    Ok(format!("{}/.local/share/marginalia", home.to_string_lossy()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn confirm(message: &str) -> anyhow::Result<bool> {
    match inquire::prompt_confirmation(message) {
        InquireResult::Ok(answer) => Ok(answer),
        InquireResult::Err(err) => bail!("An error occurred: {}", err),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marginalia=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Args::parse();

    let base_path = base_path()?;
    let config = Config::load_with(&base_path)?;
    let listen_addr = config.listen_addr.clone();
    let _lock = lock::FileLock::try_acquire(Path::new(&base_path))
        .with_context(|| format!("couldn't lock {base_path}"))?;

    let app = Arc::new(app::App::load(Arc::new(RwLock::new(config)))?);

    let result = run(app.clone(), args.command, listen_addr);
    if result.is_ok() {
        app.flush()?;
    }
    result
}

fn run(app: Arc<app::App>, command: cli::Command, listen_addr: String) -> anyhow::Result<()> {
    match command {
        cli::Command::Daemon {} => web::start_daemon(app, listen_addr),

        cli::Command::Index {
            url,
            title,
            text,
            visit,
            inbox,
        } => {
            let text = match text.as_deref() {
                Some("-") => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    Some(buf)
                }
                _ => text,
            };
            let outcome = app.index_page(
                PageData {
                    full_url: url,
                    title,
                    text,
                    content_type: None,
                },
                visit.then(Utc::now),
                app::IndexOpts {
                    add_inbox_entry_on_create: inbox,
                    fav_icon: None,
                },
            )?;
            print_json(&outcome)
        }

        cli::Command::Bookmark { action } => match action {
            BookmarkCommand::Add { url } => {
                app.add_page_bookmark(&url, None)?;
                println!("bookmarked {url}");
                Ok(())
            }
            BookmarkCommand::Delete { url } => {
                if app.del_page_bookmark(&url)? {
                    println!("removed bookmark and page {url}");
                } else {
                    println!("removed bookmark {url}");
                }
                Ok(())
            }
        },

        cli::Command::Annotate {
            page_url,
            comment,
            body,
            tags,
            bookmark,
        } => {
            let annotation = app.create_annotation(CreateAnnotationParams {
                page_url,
                comment,
                body,
                is_bookmarked: bookmark,
                ..Default::default()
            })?;
            if let Some(tags) = tags {
                app.update_annotation_tags(&annotation.url, &parse_tags(tags))?;
            }
            print_json(&annotation)
        }

        cli::Command::Annotation { action } => match action {
            AnnotationCommand::Edit { url, comment } => {
                app.edit_annotation(&url, &comment)?;
                Ok(())
            }
            AnnotationCommand::Delete { url, yes } => {
                if !yes && !confirm(&format!("Are you sure you want to delete {url}?"))? {
                    return Ok(());
                }
                app.delete_annotation(&url)?;
                println!("deleted {url}");
                Ok(())
            }
            AnnotationCommand::Tags { url, tags } => {
                let diff = app.update_annotation_tags(&url, &parse_tags(tags))?;
                print_json(&diff)
            }
            AnnotationCommand::Bookmark { url, remove } => {
                app.set_annotation_bookmark(&url, !remove)?;
                Ok(())
            }
            AnnotationCommand::Share { url, lists } => {
                let remote_id = app.share_annotation(&url, &lists)?;
                println!("{remote_id}");
                Ok(())
            }
            AnnotationCommand::Unshare { url } => {
                if !app.unshare_annotation(&url)? {
                    println!("{url} was not shared");
                }
                Ok(())
            }
        },

        cli::Command::Search { target } => match target {
            SearchCommand::Pages { args } => {
                let params = app.search_params(args.into_request())?;
                print_json(&app.search_pages(&params)?)
            }
            SearchCommand::Annotations { args } => {
                let params = app.search_params(args.into_request())?;
                print_json(&app.search_annotations(&params)?)
            }
        },

        cli::Command::ByUrl { args } => {
            let (url, request) = args.into_request();
            print_json(&app.get_all_annotations_by_url(&url, request)?)
        }

        cli::Command::Tags {} => {
            for tag in app.tags()? {
                println!("{tag}");
            }
            Ok(())
        }

        cli::Command::Lists { action } => match action {
            ListCommand::Create { name } => {
                let id = app.create_list(&name)?;
                println!("{id}");
                Ok(())
            }
            ListCommand::List {} => print_json(&app.get_lists()?),
            ListCommand::AddPage { list_id, url } => {
                if !app.add_page_to_list(list_id, &url)? {
                    println!("{url} is already in list {list_id}");
                }
                Ok(())
            }
            ListCommand::Delete { list_id, yes } => {
                if !yes
                    && !confirm(&format!(
                        "Are you sure you want to delete list {list_id} with its entries?"
                    ))?
                {
                    return Ok(());
                }
                app.remove_list(list_id)?;
                Ok(())
            }
        },
    }
}

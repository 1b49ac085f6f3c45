//! Command handlers
//!
//! Each handler opens a fresh session, applies one operation, and returns
//! the text to print. Annotation changes are persisted by the controller.

use crate::cli::{BookArgs, Cli, Commands, SelectionArgs, SettingsArgs};
use crate::state::ReaderSession;
use annotation_engine::{AnnotationId, HighlightColor, StaticLayout, SUMMARY_LEN};
use anyhow::Result;
use chrono::Utc;
use dom_model::to_html;
use std::path::Path;
use store::SettingsManager;

pub async fn run(cli: Cli) -> Result<String> {
    let data_dir = cli.data_dir;
    match cli.command {
        Commands::Render { book } => render(&data_dir, &book),
        Commands::Highlight {
            book,
            selection,
            color,
        } => highlight(&data_dir, &book, selection, color),
        Commands::Note {
            book,
            selection,
            text,
        } => note(&data_dir, &book, selection, &text),
        Commands::Delete { book, id } => delete(&data_dir, &book, id),
        Commands::Recolor { book, id, color } => recolor(&data_dir, &book, id, color),
        Commands::Locate { book, id } => locate(&data_dir, &book, id),
        Commands::List { book } => list(&data_dir, &book),
        Commands::Settings(args) => settings(&data_dir, args).await,
    }
}

fn render(data_dir: &Path, book: &BookArgs) -> Result<String> {
    let session = ReaderSession::open(data_dir, book)?;
    Ok(to_html(&session.tree, session.tree.root()))
}

fn highlight(
    data_dir: &Path,
    book: &BookArgs,
    selection: SelectionArgs,
    color: HighlightColor,
) -> Result<String> {
    let mut session = ReaderSession::open(data_dir, book)?;
    let pending = session.select(selection.start, selection.end)?;
    let annotation = session
        .controller
        .create_highlight(&mut session.tree, pending, color)?;
    Ok(format!("{} {}", annotation.id(), annotation.kind().label()))
}

fn note(data_dir: &Path, book: &BookArgs, selection: SelectionArgs, text: &str) -> Result<String> {
    let mut session = ReaderSession::open(data_dir, book)?;
    let pending = session.select(selection.start, selection.end)?;
    let annotation = session
        .controller
        .create_note(&mut session.tree, pending, text)?;
    Ok(format!("{} {}", annotation.id(), annotation.kind().label()))
}

fn delete(data_dir: &Path, book: &BookArgs, id: AnnotationId) -> Result<String> {
    let mut session = ReaderSession::open(data_dir, book)?;
    let removed = session.controller.delete_annotation(&mut session.tree, id)?;
    Ok(format!("Deleted {} \"{}\"", removed.kind().label(), removed.text()))
}

fn recolor(data_dir: &Path, book: &BookArgs, id: AnnotationId, color: HighlightColor) -> Result<String> {
    let mut session = ReaderSession::open(data_dir, book)?;
    session.controller.recolor(&mut session.tree, id, color)?;
    Ok(format!("Recoloured {} to {}", id, color))
}

fn locate(data_dir: &Path, book: &BookArgs, id: AnnotationId) -> Result<String> {
    let mut session = ReaderSession::open(data_dir, book)?;
    let layout = StaticLayout::new();
    let located = session.controller.locate(
        &mut session.tree,
        &mut session.navigator,
        id,
        &layout,
    )?;

    Ok(match located {
        Some(located) => format!(
            "Found by {:?}: {} node(s) flashed, scroll {:?}",
            located.strategy,
            located.flashed.len(),
            located.scroll
        ),
        None => "Unable to locate this item".to_string(),
    })
}

fn list(data_dir: &Path, book: &BookArgs) -> Result<String> {
    let session = ReaderSession::open(data_dir, book)?;
    let feed = session.controller.feed();
    if feed.is_empty() {
        return Ok("No annotations".to_string());
    }

    let now = Utc::now();
    let lines: Vec<String> = feed
        .entries()
        .iter()
        .map(|entry| {
            let id = entry
                .annotation_id()
                .map_or_else(|| entry.id().to_string(), |id| id.to_string());
            format!(
                "{}\t{}\t{}\t{}",
                id,
                entry.kind(),
                entry.format_relative_time(now),
                entry.summary(SUMMARY_LEN).replace('\n', " ")
            )
        })
        .collect();
    let report = &session.report;
    Ok(format!(
        "{}\n{} loaded: {} restored, {} by text search, {} unplaced, {} skipped",
        lines.join("\n"),
        report.loaded,
        report.restored,
        report.fallback,
        report.unplaced,
        report.skipped
    ))
}

async fn settings(data_dir: &Path, args: SettingsArgs) -> Result<String> {
    let mut manager = SettingsManager::new(data_dir.to_path_buf());
    manager.load().await?;

    if args.reset {
        manager.reset().await?;
    } else if args.next_theme || args.text_size.is_some() {
        let mut appearance = manager.get().appearance.clone();
        if args.next_theme {
            appearance.theme = appearance.next_theme();
        }
        if let Some(size) = args.text_size {
            appearance.set_text_size(size);
        }
        manager.update_appearance(appearance).await?;
    }

    Ok(serde_json::to_string_pretty(manager.get())?)
}

use annotation_engine::{AnnotationId, HighlightColor};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "vibe-reader",
    about = "Highlight, annotate, and revisit e-book chapters",
    version
)]
pub struct Cli {
    /// Directory holding annotation records and settings.json
    #[arg(long, global = true, default_value = ".vibe-reader")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Args)]
pub struct BookArgs {
    /// Chapter XHTML files in reading order
    #[arg(required = true)]
    pub chapters: Vec<PathBuf>,

    /// Storage key for the book; defaults to the first chapter's file stem
    #[arg(long)]
    pub book: Option<String>,
}

/// Character offsets into the reading container's text
#[derive(Debug, Clone, Copy, Args)]
pub struct SelectionArgs {
    #[arg(long)]
    pub start: usize,

    #[arg(long)]
    pub end: usize,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the reading container with stored annotations applied.
    Render {
        #[command(flatten)]
        book: BookArgs,
    },

    /// Highlight a selection.
    Highlight {
        #[command(flatten)]
        book: BookArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, default_value = "yellow")]
        color: HighlightColor,
    },

    /// Attach a note to a selection.
    Note {
        #[command(flatten)]
        book: BookArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        text: String,
    },

    /// Delete an annotation and unwrap its spans.
    Delete {
        #[command(flatten)]
        book: BookArgs,
        #[arg(long)]
        id: AnnotationId,
    },

    /// Change the colour of a highlight.
    Recolor {
        #[command(flatten)]
        book: BookArgs,
        #[arg(long)]
        id: AnnotationId,
        #[arg(long)]
        color: HighlightColor,
    },

    /// Report where an annotation is and how it was found.
    Locate {
        #[command(flatten)]
        book: BookArgs,
        #[arg(long)]
        id: AnnotationId,
    },

    /// Print the activity feed for a book.
    List {
        #[command(flatten)]
        book: BookArgs,
    },

    /// Show or change reader settings.
    Settings(SettingsArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Cycle system -> light -> dark
    #[arg(long)]
    pub next_theme: bool,

    /// Reading text size in pixels (clamped to 12..=28)
    #[arg(long)]
    pub text_size: Option<u8>,

    /// Restore defaults
    #[arg(long, conflicts_with_all = ["next_theme", "text_size"])]
    pub reset: bool,
}

//! Lingolog CLI
//!
//! Command-line client for the lingolog journal engine.

use std::path::PathBuf;

use chrono::DateTime;
use clap::{Parser, Subcommand};
use colored::Colorize;
use lingolog_core::{
    FileStore, Post, PostDraft, PuzzleDraft, RefQuery, Speaker, Store, TextDraft,
};

/// Lingolog - a local-first journal for language learners
#[derive(Parser)]
#[command(name = "lingolog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the lingolog journal engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a journal post
    Add {
        /// The text of the post
        content: String,
        /// Language tag (e.g. de, ja)
        #[arg(long)]
        language: Option<String>,
        /// Reading aid (romaji, pinyin, ...)
        #[arg(long)]
        pronunciation: Option<String>,
        /// Who said it: me, partner, other
        #[arg(long, default_value = "unspecified")]
        speaker: String,
        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
        /// Source link
        #[arg(long)]
        source: Option<String>,
    },

    /// Reply to an existing post
    Reply {
        /// Numeric id of the parent post
        post_id: i64,
        /// The text of the reply
        content: String,
        /// Language tag
        #[arg(long)]
        language: Option<String>,
        /// Who said it: me, partner, other
        #[arg(long, default_value = "unspecified")]
        speaker: String,
    },

    /// List recent posts
    List {
        /// Maximum number of posts to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Only pinned posts
        #[arg(long)]
        pinned: bool,
    },

    /// Show one post with its replies
    Show {
        /// Numeric id or stable reference id
        key: String,
    },

    /// Search posts and puzzles
    Search {
        /// Substring to look for (case-insensitive)
        query: String,
    },

    /// Pin or unpin a post
    Pin {
        /// Numeric id of the post
        post_id: i64,
        /// Unpin instead
        #[arg(long)]
        remove: bool,
    },

    /// Delete a post (tombstoned if it has replies)
    Delete {
        /// Numeric id of the post
        post_id: i64,
    },

    /// Manage tags on a post
    #[command(subcommand)]
    Tag(TagCommands),

    /// Manage puzzle cards
    #[command(subcommand)]
    Puzzle(PuzzleCommands),

    /// Import a JSON payload: a document to merge or a message array
    Import {
        /// Path to the JSON file
        file: PathBuf,
        /// Treat the payload as puzzles only
        #[arg(long)]
        puzzles: bool,
    },

    /// Export the document as JSON to stdout
    Export {
        /// Scope: all, timeline, or puzzles
        #[arg(long, default_value = "all")]
        scope: String,
    },

    /// Resolve a reference token and print its text
    Resolve {
        /// Token of the form refId.index
        token: String,
    },

    /// Show document statistics
    Stats,
}

#[derive(Subcommand)]
enum TagCommands {
    /// Add tags to a post
    Add {
        /// Numeric id of the post
        post_id: i64,
        /// Tags to add (comma-separated)
        tags: String,
    },

    /// Remove a tag from a post
    Remove {
        /// Numeric id of the post
        post_id: i64,
        /// The tag to remove
        tag: String,
    },

    /// List every tag in use
    List,
}

#[derive(Subcommand)]
enum PuzzleCommands {
    /// Create a puzzle card
    Add {
        /// The phrase under study
        text: String,
        /// Language tag
        #[arg(long)]
        language: Option<String>,
        /// Reading aid
        #[arg(long)]
        pronunciation: Option<String>,
        /// Clue tokens into the timeline (refId.index, comma-separated)
        #[arg(long)]
        sources: Option<String>,
        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
    },

    /// Record a puzzle's solution
    Solve {
        /// Puzzle id (puzzle_N) or stable reference id
        key: String,
        /// The meaning
        meaning: String,
        /// Alternative phrasings (comma-separated)
        #[arg(long)]
        alternatives: Option<String>,
        /// Example sentences (comma-separated)
        #[arg(long)]
        examples: Option<String>,
    },

    /// Append a note to a puzzle
    Note {
        /// Puzzle id or stable reference id
        key: String,
        /// The note text
        text: String,
    },

    /// Record that two puzzles are related
    Relate {
        /// Puzzle id or stable reference id
        key: String,
        /// The related puzzle's id or stable reference id
        other: String,
    },

    /// List puzzle cards
    List {
        /// Only unsolved puzzles
        #[arg(long)]
        unsolved: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Add {
            content,
            language,
            pronunciation,
            speaker,
            tags,
            source,
        } => run_add(content, language, pronunciation, speaker, tags, source),
        Commands::Reply {
            post_id,
            content,
            language,
            speaker,
        } => run_reply(post_id, content, language, speaker),
        Commands::List { limit, pinned } => run_list(limit, pinned),
        Commands::Show { key } => run_show(key),
        Commands::Search { query } => run_search(query),
        Commands::Pin { post_id, remove } => run_pin(post_id, !remove),
        Commands::Delete { post_id } => run_delete(post_id),
        Commands::Tag(command) => run_tag(command),
        Commands::Puzzle(command) => run_puzzle(command),
        Commands::Import { file, puzzles } => run_import(file, puzzles),
        Commands::Export { scope } => run_export(scope),
        Commands::Resolve { token } => run_resolve(token),
        Commands::Stats => run_stats(),
    }
}

fn open_store() -> anyhow::Result<Store<FileStore>> {
    Ok(Store::open_default()?)
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn format_stamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn run_add(
    content: String,
    language: Option<String>,
    pronunciation: Option<String>,
    speaker: String,
    tags: Option<String>,
    source: Option<String>,
) -> anyhow::Result<()> {
    let mut store = open_store()?;
    let post = store.create_post(PostDraft {
        texts: vec![TextDraft {
            content,
            language,
            pronunciation,
            speaker: Speaker::parse_name(&speaker),
        }],
        tags: split_list(tags),
        source_url: source,
        ..Default::default()
    })?;
    println!(
        "{} post {} ({})",
        "Added".green().bold(),
        post.id,
        post.ref_id.dimmed()
    );
    Ok(())
}

fn run_reply(
    post_id: i64,
    content: String,
    language: Option<String>,
    speaker: String,
) -> anyhow::Result<()> {
    let mut store = open_store()?;
    let reply = store.add_reply(
        post_id,
        PostDraft {
            texts: vec![TextDraft {
                content,
                language,
                speaker: Speaker::parse_name(&speaker),
                ..Default::default()
            }],
            ..Default::default()
        },
    )?;
    println!(
        "{} reply {} to post {}",
        "Added".green().bold(),
        reply.id,
        post_id
    );
    Ok(())
}

fn print_post_line(post: &Post) {
    let pin = if post.pinned { "* " } else { "  " };
    let text = post
        .visible_texts()
        .first()
        .map(|t| t.content.as_str())
        .unwrap_or("(deleted)");
    println!(
        "{}{} {} {}",
        pin.yellow(),
        format!("#{}", post.id).cyan(),
        format_stamp(post.created_at).dimmed(),
        text
    );
}

fn run_list(limit: usize, pinned_only: bool) -> anyhow::Result<()> {
    let store = open_store()?;
    let posts: Vec<&Post> = store
        .document()
        .posts
        .iter()
        .filter(|p| !p.is_deleted)
        .filter(|p| !pinned_only || p.pinned)
        .collect();
    for post in posts.iter().rev().take(limit) {
        print_post_line(post);
    }
    Ok(())
}

fn run_show(key: String) -> anyhow::Result<()> {
    let store = open_store()?;
    let doc = store.document();
    let post = key
        .parse::<i64>()
        .ok()
        .and_then(|id| doc.post(id))
        .or_else(|| doc.post_by_ref(&key))
        .ok_or_else(|| anyhow::anyhow!("no post named {key}"))?;

    print_post_line(post);
    for text in post.visible_texts().iter().skip(1) {
        println!("    {}", text.content);
    }
    if !post.tags.is_empty() {
        println!("    {}", post.tags.join(", ").dimmed());
    }
    for reply in doc.replies_of(post.id) {
        let text = reply
            .texts
            .first()
            .map(|t| t.content.as_str())
            .unwrap_or_default();
        println!(
            "    {} {} {}",
            format!("r{}", reply.id).magenta(),
            format_stamp(reply.created_at).dimmed(),
            text
        );
    }
    Ok(())
}

fn run_search(query: String) -> anyhow::Result<()> {
    let store = open_store()?;
    let hits = store.search(&query);
    if hits.posts.is_empty() && hits.puzzles.is_empty() {
        println!("{}", "No matches.".dimmed());
        return Ok(());
    }
    for post in &hits.posts {
        print_post_line(post);
    }
    for puzzle in &hits.puzzles {
        let state = if puzzle.is_solved {
            "solved".green()
        } else {
            "open".yellow()
        };
        println!("  {} [{}] {}", puzzle.id.cyan(), state, puzzle.text);
    }
    Ok(())
}

fn run_pin(post_id: i64, pinned: bool) -> anyhow::Result<()> {
    let mut store = open_store()?;
    store.set_post_pinned(post_id, pinned)?;
    let verb = if pinned { "Pinned" } else { "Unpinned" };
    println!("{} post {}", verb.green().bold(), post_id);
    Ok(())
}

fn run_delete(post_id: i64) -> anyhow::Result<()> {
    let mut store = open_store()?;
    store.delete_post(post_id)?;
    println!("{} post {}", "Deleted".red().bold(), post_id);
    Ok(())
}

fn run_tag(command: TagCommands) -> anyhow::Result<()> {
    let mut store = open_store()?;
    match command {
        TagCommands::Add { post_id, tags } => {
            store.add_post_tags(post_id, split_list(Some(tags)))?;
            println!("{} post {}", "Tagged".green().bold(), post_id);
        }
        TagCommands::Remove { post_id, tag } => {
            store.remove_post_tag(post_id, &tag)?;
            println!("{} {} from post {}", "Removed".red().bold(), tag, post_id);
        }
        TagCommands::List => {
            for tag in store.all_tags() {
                println!("{tag}");
            }
        }
    }
    Ok(())
}

fn run_puzzle(command: PuzzleCommands) -> anyhow::Result<()> {
    let mut store = open_store()?;
    match command {
        PuzzleCommands::Add {
            text,
            language,
            pronunciation,
            sources,
            tags,
        } => {
            let sources = split_list(sources)
                .into_iter()
                .map(|token| token_to_query(&store, &token))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let puzzle = store.create_puzzle(PuzzleDraft {
                text,
                language,
                pronunciation,
                sources,
                tags: split_list(tags),
                ..Default::default()
            })?;
            println!("{} {}", "Created".green().bold(), puzzle.id);
        }
        PuzzleCommands::Solve {
            key,
            meaning,
            alternatives,
            examples,
        } => {
            let puzzle =
                store.solve_puzzle(&key, meaning, split_list(alternatives), split_list(examples))?;
            println!("{} {}", "Solved".green().bold(), puzzle.id);
        }
        PuzzleCommands::Note { key, text } => {
            let note = store.add_puzzle_note(&key, text)?;
            println!("{} note {} to {}", "Added".green().bold(), note.id, key);
        }
        PuzzleCommands::Relate { key, other } => {
            store.relate_puzzles(&key, &other)?;
            println!("{} {} and {}", "Related".green().bold(), key, other);
        }
        PuzzleCommands::List { unsolved } => {
            for puzzle in store
                .document()
                .puzzles
                .iter()
                .filter(|p| !unsolved || !p.is_solved)
            {
                let state = if puzzle.is_solved {
                    "solved".green()
                } else {
                    "open".yellow()
                };
                let meaning = puzzle.meaning.as_deref().unwrap_or("");
                println!(
                    "{} [{}] {}  {}",
                    puzzle.id.cyan(),
                    state,
                    puzzle.text,
                    meaning.dimmed()
                );
            }
        }
    }
    Ok(())
}

fn token_to_query(store: &Store<FileStore>, token: &str) -> anyhow::Result<RefQuery> {
    let resolved = store
        .resolve_token(token)
        .ok_or_else(|| anyhow::anyhow!("unresolvable reference token: {token}"))?;
    Ok(RefQuery {
        post_id: resolved.post_id,
        ref_id: (!resolved.ref_id.is_empty()).then(|| resolved.ref_id.clone()),
        reply_id: resolved.reply_id,
        reply_ref_id: None,
        text_index: Some(resolved.text_index as i64),
    })
}

fn run_import(file: PathBuf, puzzles: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&file)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let mut store = open_store()?;

    if puzzles {
        let report = store.import_puzzles(value)?;
        println!(
            "{} {} added, {} updated, {} kept",
            "Puzzles:".cyan().bold(),
            report.puzzles.added,
            report.puzzles.updated,
            report.puzzles.kept
        );
        return Ok(());
    }

    if value.is_array() {
        let outcome = store.import_messages(value)?;
        println!(
            "{} post {} with {} replies",
            "Imported".green().bold(),
            outcome.post_id,
            outcome.reply_ids.len()
        );
    } else {
        let report = store.import_document(value)?;
        println!("{}", "=== Merge Report ===".cyan().bold());
        for (label, counts) in [
            ("Posts", report.posts),
            ("Replies", report.replies),
            ("Puzzles", report.puzzles),
        ] {
            println!(
                "{}: {} added, {} updated, {} kept",
                label.white().bold(),
                counts.added,
                counts.updated,
                counts.kept
            );
        }
        println!("{}: {} added", "Images".white().bold(), report.images_added);
    }
    Ok(())
}

fn run_export(scope: String) -> anyhow::Result<()> {
    let store = open_store()?;
    let value = match scope.as_str() {
        "all" => store.export_document()?,
        "timeline" => store.export_timeline()?,
        "puzzles" => store.export_puzzles()?,
        other => anyhow::bail!("unknown export scope: {other} (expected all, timeline, puzzles)"),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn run_resolve(token: String) -> anyhow::Result<()> {
    let store = open_store()?;
    let resolved = store
        .resolve_token(&token)
        .ok_or_else(|| anyhow::anyhow!("unresolvable reference token: {token}"))?;
    println!("{}", store.display_ref(&resolved));
    Ok(())
}

fn run_stats() -> anyhow::Result<()> {
    let store = open_store()?;
    let (stats, size) = store.stats();

    println!("{}", "=== Lingolog Statistics ===".cyan().bold());
    println!("{}: {}", "Posts".white().bold(), stats.posts);
    println!("{}: {}", "Tombstones".white().bold(), stats.tombstones);
    println!("{}: {}", "Replies".white().bold(), stats.replies);
    println!(
        "{}: {} ({} solved)",
        "Puzzles".white().bold(),
        stats.puzzles,
        stats.solved_puzzles
    );
    println!(
        "{}: {} ({} KiB encoded)",
        "Images".white().bold(),
        stats.images,
        stats.image_bytes / 1024
    );
    println!("{}: {} KiB", "Document size".white().bold(), size / 1024);
    Ok(())
}

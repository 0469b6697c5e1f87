//! Read-only query session over labeled results.

use crate::models::{LabeledPost, SentimentMap};
use std::io::{self, BufRead, Write};

pub const EXIT_KEYWORD: &str = "exit";
pub const BANNER: &str = "Chat about Tweet Sentiments (type 'exit' to quit)";
pub const PROMPT: &str = "Which user's sentiments? > ";

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, PartialEq)]
pub enum QueryOutcome<'a> {
    Exit,
    Blank,
    Matches(Vec<(&'a str, &'a [LabeledPost])>),
    NotFound { available: Vec<&'a str> },
}

/// Matches handles containing the query, case-insensitively.
pub fn lookup<'a>(results: &'a SentimentMap, query: &str) -> QueryOutcome<'a> {
    let query = query.trim().to_lowercase();
    if query == EXIT_KEYWORD {
        return QueryOutcome::Exit;
    }
    if query.is_empty() {
        return QueryOutcome::Blank;
    }
    let matches: Vec<(&str, &[LabeledPost])> = results
        .iter()
        .filter(|(handle, _)| handle.to_lowercase().contains(&query))
        .map(|(handle, posts)| (handle.as_str(), posts.as_slice()))
        .collect();
    if matches.is_empty() {
        QueryOutcome::NotFound {
            available: results.keys().map(String::as_str).collect(),
        }
    } else {
        QueryOutcome::Matches(matches)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

pub fn render<W: Write>(out: &mut W, outcome: &QueryOutcome<'_>) -> io::Result<()> {
    match outcome {
        QueryOutcome::Exit | QueryOutcome::Blank => {}
        QueryOutcome::NotFound { available } => {
            writeln!(out, "User not found. Available: {}", available.join(", "))?;
        }
        QueryOutcome::Matches(matches) => {
            for (handle, posts) in matches {
                writeln!(out, "\n--- Latest sentiments for @{} ---", handle)?;
                if posts.is_empty() {
                    writeln!(out, "(no posts)")?;
                }
                for (idx, labeled) in posts.iter().enumerate() {
                    writeln!(
                        out,
                        "{}. {}: {}...",
                        idx + 1,
                        labeled.sentiment.as_str().to_uppercase(),
                        preview(&labeled.post.content)
                    )?;
                }
            }
        }
    }
    Ok(())
}

/// Runs the prompt loop until `exit` or end of input.
pub fn run_session<R: BufRead, W: Write>(
    results: &SentimentMap,
    mut input: R,
    mut out: W,
) -> io::Result<()> {
    writeln!(out, "\n{}", BANNER)?;
    let mut line = String::new();
    loop {
        write!(out, "\n{}", PROMPT)?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }
        let outcome = lookup(results, &line);
        if matches!(outcome, QueryOutcome::Exit) {
            break;
        }
        render(&mut out, &outcome)?;
    }
    out.flush()
}

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::search::{ContentTypes, SearchRequest};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Search terms, all have to match
    pub query: Option<String>,

    /// Only results from this day on (YYYY-MM-DD)
    #[clap(long)]
    pub start: Option<NaiveDate>,

    /// Only results up to the end of this day (YYYY-MM-DD)
    #[clap(long)]
    pub end: Option<NaiveDate>,

    /// Only bookmarked results
    #[clap(short, long, default_value = "false")]
    pub bookmarks: bool,

    /// Required tag, can be repeated
    #[clap(short, long = "tag")]
    pub tags: Vec<String>,

    /// Excluded tag, can be repeated
    #[clap(long = "exclude-tag")]
    pub exclude_tags: Vec<String>,

    /// Allowed hostname or domain, can be repeated
    #[clap(short, long = "domain")]
    pub domains: Vec<String>,

    #[clap(long = "exclude-domain")]
    pub exclude_domains: Vec<String>,

    /// List id the result has to be in, can be repeated
    #[clap(short, long = "list")]
    pub lists: Vec<i64>,

    /// Don't match highlighted text
    #[clap(long, default_value = "false")]
    pub no_highlights: bool,

    /// Don't match notes
    #[clap(long, default_value = "false")]
    pub no_notes: bool,

    /// Don't match page text
    #[clap(long, default_value = "false")]
    pub no_pages: bool,

    #[clap(long)]
    pub limit: Option<usize>,

    #[clap(long)]
    pub skip: Option<usize>,
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn day_end(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_milli_opt(23, 59, 59, 999)
        .map(|time| time.and_utc())
        .unwrap_or_else(|| day_start(day))
}

impl SearchArgs {
    pub fn into_request(self) -> SearchRequest {
        SearchRequest {
            query: self.query,
            start_date: self.start.map(day_start),
            end_date: self.end.map(day_end),
            bookmarks_only: self.bookmarks,
            tags_inc: self.tags,
            tags_exc: self.exclude_tags,
            domains_inc: self.domains,
            domains_exc: self.exclude_domains,
            lists: self.lists,
            content_types: Some(ContentTypes {
                highlights: !self.no_highlights,
                notes: !self.no_notes,
                pages: !self.no_pages,
            }),
            limit: self.limit,
            skip: self.skip,
            ..Default::default()
        }
    }
}

/// Filters for the annotations of a single page.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ByUrlArgs {
    pub url: String,

    /// Only bookmarked annotations
    #[clap(short, long, default_value = "false")]
    pub bookmarks: bool,

    /// Required tag, can be repeated
    #[clap(short, long = "tag")]
    pub tags: Vec<String>,

    /// Excluded tag, can be repeated. A page carrying it lists nothing.
    #[clap(long = "exclude-tag")]
    pub exclude_tags: Vec<String>,

    /// List id the annotation or its page has to be in, can be repeated
    #[clap(short, long = "list")]
    pub lists: Vec<i64>,

    #[clap(long, default_value = "false")]
    pub no_highlights: bool,

    #[clap(long, default_value = "false")]
    pub no_notes: bool,

    #[clap(long)]
    pub limit: Option<usize>,

    #[clap(long)]
    pub skip: Option<usize>,
}

impl ByUrlArgs {
    pub fn into_request(self) -> (String, SearchRequest) {
        let request = SearchRequest {
            bookmarks_only: self.bookmarks,
            tags_inc: self.tags,
            tags_exc: self.exclude_tags,
            lists: self.lists,
            content_types: Some(ContentTypes {
                highlights: !self.no_highlights,
                notes: !self.no_notes,
                pages: true,
            }),
            limit: self.limit,
            skip: self.skip,
            ..Default::default()
        };
        (self.url, request)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SearchCommand {
    /// Search pages by their text and their annotations
    Pages {
        #[command(flatten)]
        args: SearchArgs,
    },
    /// Search annotations, grouped by day when no query is given
    Annotations {
        #[command(flatten)]
        args: SearchArgs,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum BookmarkCommand {
    /// Bookmark a page, indexing a stub when it is unknown
    Add { url: String },
    /// Remove a page bookmark
    Delete { url: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AnnotationCommand {
    /// Replace the comment of an annotation
    Edit {
        url: String,
        #[clap(short, long)]
        comment: String,
    },
    /// Delete an annotation with its tags, list entries and bookmark
    Delete {
        url: String,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
    /// Set the tags of an annotation
    Tags {
        url: String,
        /// Comma separated tags, replaces the current ones
        #[clap(short, long, allow_hyphen_values = true)]
        tags: String,
    },
    /// Bookmark or unbookmark an annotation
    Bookmark {
        url: String,
        #[clap(long, default_value = "false")]
        remove: bool,
    },
    /// Share an annotation, optionally into lists
    Share {
        url: String,
        #[clap(short, long = "list")]
        lists: Vec<i64>,
    },
    /// Make a shared annotation private again
    Unshare { url: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ListCommand {
    /// Create a custom list
    Create { name: String },
    /// Print every list
    List {},
    /// Put a page into a list
    AddPage { list_id: i64, url: String },
    /// Delete a custom list with its entries
    Delete {
        list_id: i64,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start mg as a service.
    Daemon {},

    /// Index a page with its text
    Index {
        /// Full url of the page
        url: String,

        #[clap(short, long)]
        title: Option<String>,

        /// Page text, read from stdin when "-"
        #[clap(long)]
        text: Option<String>,

        /// Record a visit now
        #[clap(long, default_value = "false")]
        visit: bool,

        /// File newly created pages into the Inbox
        #[clap(long, default_value = "false")]
        inbox: bool,
    },

    /// Manage page bookmarks
    Bookmark {
        #[clap(subcommand)]
        action: BookmarkCommand,
    },

    /// Annotate a page
    Annotate {
        /// Full url of the annotated page
        page_url: String,

        #[clap(short, long)]
        comment: Option<String>,

        /// Highlighted text
        #[clap(long)]
        body: Option<String>,

        /// Comma separated tags
        #[clap(short, long, allow_hyphen_values = true)]
        tags: Option<String>,

        #[clap(short, long, default_value = "false")]
        bookmark: bool,
    },

    /// Manage an existing annotation
    Annotation {
        #[clap(subcommand)]
        action: AnnotationCommand,
    },

    /// Search pages or annotations
    Search {
        #[clap(subcommand)]
        target: SearchCommand,
    },

    /// Print the annotations of a page
    ByUrl {
        #[command(flatten)]
        args: ByUrlArgs,
    },

    /// Print every tag in use
    Tags {},

    /// Manage lists
    Lists {
        #[clap(subcommand)]
        action: ListCommand,
    },
}

//! WebGrab CLI - command-line interface and MCP server entry point

mod mcp;

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;
use webgrab::{FetchRequest, FetchResponse, Tool, TOOL_LLMTXT};

/// Output format for the fetch subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Markdown with YAML frontmatter
    #[default]
    Md,
    /// JSON format
    Json,
}

/// WebGrab - agent-friendly web content fetching tool
#[derive(Parser, Debug)]
#[command(name = "webgrab")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print full help with examples (llmtxt)
    #[arg(long)]
    llmtxt: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as MCP (Model Context Protocol) server over stdio
    Mcp,
    /// Fetch a URL and print the result
    Fetch {
        /// URL to fetch
        url: String,

        /// Output format
        #[arg(long, short, default_value = "md")]
        output: OutputFormat,

        /// Force the browser path
        #[arg(long)]
        browser: bool,

        /// Per-response content size limit in bytes
        #[arg(long)]
        size_limit: Option<usize>,

        /// Custom User-Agent
        #[arg(long)]
        user_agent: Option<String>,

        /// Continue a chunked delivery
        #[arg(long)]
        chunk_id: Option<String>,

        /// Byte cursor for a continuation
        #[arg(long)]
        start_cursor: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so MCP stdout stays a clean JSON-RPC stream
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.llmtxt {
        writeln_safe(TOOL_LLMTXT);
        std::process::exit(0);
    }

    match cli.command {
        Some(Commands::Mcp) => {
            mcp::run_server().await;
        }
        Some(Commands::Fetch {
            url,
            output,
            browser,
            size_limit,
            user_agent,
            chunk_id,
            start_cursor,
        }) => {
            run_fetch(
                url,
                output,
                browser,
                size_limit,
                user_agent,
                chunk_id,
                start_cursor,
            )
            .await;
        }
        None => {
            eprintln!("Usage: webgrab fetch <URL>");
            eprintln!("   or: webgrab mcp");
            eprintln!("   or: webgrab --help");
            std::process::exit(1);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_fetch(
    url: String,
    output: OutputFormat,
    browser: bool,
    size_limit: Option<usize>,
    user_agent: Option<String>,
    chunk_id: Option<String>,
    start_cursor: Option<usize>,
) {
    let mut request = match chunk_id {
        Some(id) => FetchRequest::continuation(id, start_cursor.unwrap_or(0)),
        None => FetchRequest::new(url).as_markdown(),
    };
    if browser {
        request.use_browser = Some(true);
    }
    if let Some(limit) = size_limit {
        request.content_size_limit = Some(limit);
    }

    let mut builder = Tool::builder();
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let tool = builder.build();

    let response = tool.execute(request).await;
    tool.close_browser().await;

    match output {
        OutputFormat::Md => writeln_safe(&format_md_with_frontmatter(&response)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&response).unwrap_or_else(|e| {
                eprintln!("Error serializing response: {}", e);
                std::process::exit(1);
            });
            writeln_safe(&json);
        }
    }

    if response.is_error {
        std::process::exit(1);
    }
}

/// Format a response as markdown with YAML frontmatter
fn format_md_with_frontmatter(response: &FetchResponse) -> String {
    let mut out = String::new();

    out.push_str("---\n");
    if let Some(ref metadata) = response.metadata {
        if let Some(ref url) = metadata.url {
            out.push_str(&format!("url: {}\n", url));
        }
        if let Some(status) = metadata.status_code {
            out.push_str(&format!("status_code: {}\n", status));
        }
        if let Some(ref ct) = metadata.content_type {
            out.push_str(&format!("source_content_type: {}\n", ct));
        }
        if let Some(ref format) = metadata.format {
            out.push_str(&format!("format: {}\n", format));
        }
    }
    if response.is_chunked == Some(true) {
        if let Some(ref id) = response.chunk_id {
            out.push_str(&format!("chunk_id: {}\n", id));
        }
        if let (Some(current), Some(total)) = (response.current_chunk, response.total_chunks) {
            out.push_str(&format!("chunk: {}/{}\n", current, total));
        }
        if let Some(fetched) = response.fetched_bytes {
            out.push_str(&format!("next_cursor: {}\n", fetched));
        }
    }
    if response.is_error {
        out.push_str("error: true\n");
    }
    out.push_str("---\n");

    for piece in &response.content {
        out.push_str(&piece.text);
    }

    out
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webgrab::{ContentPiece, ResponseMetadata};

    #[test]
    fn test_format_md_basic() {
        let response = FetchResponse {
            content: vec![ContentPiece::text("# Hello World")],
            is_error: false,
            metadata: Some(ResponseMetadata {
                url: Some("https://example.com".to_string()),
                status_code: Some(200),
                content_type: Some("text/html".to_string()),
                format: Some("markdown".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let output = format_md_with_frontmatter(&response);
        assert!(output.starts_with("---\n"));
        assert!(output.contains("url: https://example.com\n"));
        assert!(output.contains("status_code: 200\n"));
        assert!(output.contains("---\n# Hello World"));
        assert!(!output.contains("error: true"));
    }

    #[test]
    fn test_format_md_chunked_fields() {
        let response = FetchResponse {
            content: vec![ContentPiece::text("part one")],
            is_error: false,
            is_chunked: Some(true),
            chunk_id: Some("abc-def".to_string()),
            current_chunk: Some(1),
            total_chunks: Some(4),
            fetched_bytes: Some(50_000),
            ..Default::default()
        };

        let output = format_md_with_frontmatter(&response);
        assert!(output.contains("chunk_id: abc-def\n"));
        assert!(output.contains("chunk: 1/4\n"));
        assert!(output.contains("next_cursor: 50000\n"));
    }

    #[test]
    fn test_format_md_error_flag() {
        let response = FetchResponse::error("fetch blew up");
        let output = format_md_with_frontmatter(&response);
        assert!(output.contains("error: true\n"));
        assert!(output.ends_with("fetch blew up"));
    }
}

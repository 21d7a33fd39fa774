use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tubepost",
    about = "Turn YouTube videos into markdown blog posts",
    version
)]
pub struct Cli {
    /// Directory holding published posts
    #[arg(long, global = true)]
    pub posts_dir: Option<PathBuf>,

    /// Show pipeline details on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Generate a post for one video and print the markdown
    Generate {
        /// YouTube video URL or video ID
        url: String,

        /// LLM provider: ollama, gemini, openai, anthropic
        #[arg(short, long)]
        provider: Option<String>,

        /// Also publish the post to the posts directory
        #[arg(long)]
        publish: bool,

        /// Write markdown to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List published posts, newest first
    Posts,
}

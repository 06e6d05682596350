use clap::{Parser as ClapParser, Subcommand};
use groq_expr::cli::{self, CliError};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "groq")]
#[command(about = "Format GROQ queries and convert projections to and from JSON")]
#[command(version)]
struct Cli {
    /// Log verbosity when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pretty-print a GROQ query
    Format {
        /// The query (reads from stdin if not provided)
        query: Option<String>,
    },

    /// Convert a projection to its JSON form
    ToJson {
        /// The projection (reads from stdin if not provided)
        projection: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Convert the JSON form back to a projection
    FromJson {
        /// The JSON (reads from stdin if not provided)
        json: Option<String>,
    },

    /// Merge include fragments into a projection
    Expand {
        /// The projection to expand
        projection: String,

        /// Include as PATH=FRAGMENT, e.g. author=author->{name}
        #[arg(short, long = "include")]
        includes: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::Format { query } => read_input(query).map(|q| cli::format_text(&q)),
        Commands::ToJson { projection, pretty } => {
            read_input(projection).and_then(|p| cli::to_json(&p, pretty))
        }
        Commands::FromJson { json } => read_input(json).and_then(|j| cli::from_json(&j)),
        Commands::Expand {
            projection,
            includes,
        } => cli::expand_projection(&projection, &includes),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn read_input(arg: Option<String>) -> Result<String, CliError> {
    match arg {
        Some(s) => Ok(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer.trim_end().to_string())
        }
        None => Err(CliError::NoInput),
    }
}

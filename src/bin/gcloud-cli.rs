use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use gcloud_lite::config::{load_config, parse_config, AppConfig};
use gcloud_lite::google::{self, TokenProvider};
use gcloud_lite::pubsub::{PubSubClient, SubscriptionOptions};
use gcloud_lite::speech::{Audio, AudioEncoding, AudioSource, RecognizeOptions, SpeechClient};

#[derive(Parser)]
#[command(name = "gcloud-cli")]
#[command(about = "Pub/Sub and Speech-to-Text from the command line", long_about = None)]
struct Cli {
    /// TOML configuration (endpoints, project, credentials).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project id; overrides the configuration and GOOGLE_CLOUD_PROJECT.
    #[arg(short, long)]
    project: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List topics
    Topics {
        #[arg(long)]
        max: Option<usize>,
    },
    /// Create a topic
    CreateTopic { name: String },
    /// Delete a topic
    DeleteTopic { name: String },
    /// List subscriptions, or those of one topic
    Subscriptions {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        max: Option<usize>,
    },
    /// Subscribe to a topic
    Subscribe {
        topic: String,
        name: String,
        #[arg(long)]
        ack_deadline: Option<u32>,
        #[arg(long)]
        push_endpoint: Option<String>,
    },
    /// Transcribe a local file or gs:// object
    Recognize {
        location: String,
        #[arg(long, default_value = "en-US")]
        language: String,
        #[arg(long)]
        encoding: Option<String>,
        #[arg(long)]
        sample_rate: Option<u32>,
        /// Use long-running recognition and print the operation name
        #[arg(long)]
        background: bool,
    },
}

fn pubsub(
    config: &AppConfig,
    tokens: Arc<dyn TokenProvider>,
) -> Result<PubSubClient, Box<dyn std::error::Error>> {
    let project = google::project_id(&config.google)
        .ok_or("no project: pass --project or set GOOGLE_CLOUD_PROJECT")?;
    Ok(PubSubClient::from_config(&config.pubsub, project, tokens)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => parse_config("")?,
    };
    if let Some(project) = cli.project {
        config.google.project_id = Some(project);
    }
    let tokens = google::token_provider(&config.google)?;

    match cli.command {
        Commands::Topics { max } => {
            for topic in pubsub(&config, tokens)?.all_topics(max).await? {
                println!("{}", topic.name);
            }
        }
        Commands::CreateTopic { name } => {
            let topic = pubsub(&config, tokens)?.create_topic(&name).await?;
            println!("{}", topic.name);
        }
        Commands::DeleteTopic { name } => {
            pubsub(&config, tokens)?.delete_topic(&name).await?;
            println!("deleted {name}");
        }
        Commands::Subscriptions { topic, max } => {
            let client = pubsub(&config, tokens)?;
            let names = match topic {
                Some(topic) => client.all_topic_subscriptions(&topic, max).await?,
                None => client
                    .all_subscriptions(max)
                    .await?
                    .into_iter()
                    .map(|s| s.name)
                    .collect(),
            };
            for name in names {
                println!("{name}");
            }
        }
        Commands::Subscribe {
            topic,
            name,
            ack_deadline,
            push_endpoint,
        } => {
            let options = SubscriptionOptions {
                ack_deadline_seconds: ack_deadline,
                push_endpoint,
            };
            let sub = pubsub(&config, tokens)?
                .create_subscription(&topic, &name, options)
                .await?;
            println!("{} -> {}", sub.name, sub.topic);
        }
        Commands::Recognize {
            location,
            language,
            encoding,
            sample_rate,
            background,
        } => {
            let client = SpeechClient::from_config(&config.speech, tokens)?;
            let mut audio = Audio::new(AudioSource::from_location(&location)).language(language);
            if let Some(encoding) = encoding {
                audio = audio.encoding(encoding.parse::<AudioEncoding>()?);
            }
            if let Some(rate) = sample_rate {
                audio = audio.sample_rate(rate);
            }
            let options = RecognizeOptions::default();

            if background {
                let operation = client.process(&audio, &options).await?;
                println!("{}", operation.name);
            } else {
                for result in client.recognize(&audio, &options).await? {
                    println!("{} ({:.2})", result.transcript, result.confidence);
                }
            }
        }
    }

    Ok(())
}

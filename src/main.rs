use clap::{value_parser, Arg, ArgMatches, Command};
use log::LevelFilter;
use spamd::config::{ConfigOverrides, PipelineSettings, DEFAULT_CONFIG_PATH};
use spamd::learn::dataset::{Dataset, DatasetKind};
use spamd::learn::{ClassifierKind, LearnError, VectorizerKind};
use spamd::{
    AmqpQueue, Batcher, ClassificationGateway, Config, Consumer, HttpAlertSink, SpamFilter,
};
use std::path::Path;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = Command::new("spamd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Recognize spam in a message queue and alert about it")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("learn")
                .long("learn")
                .help("Train the filter, save it to the filter path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("save-config")
                .long("save-config")
                .help("Write the effective configuration to the config path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("learning-dataset")
                .long("learning-dataset")
                .value_name("NAME")
                .help("Dataset to learn from (emails_small, sms)")
                .value_parser(|s: &str| s.parse::<DatasetKind>()),
        )
        .arg(
            Arg::new("learning-vectorizer")
                .long("learning-vectorizer")
                .value_name("NAME")
                .help("Vectorizer for message texts (CountVectorizer)")
                .value_parser(|s: &str| s.parse::<VectorizerKind>()),
        )
        .arg(
            Arg::new("learning-classifier")
                .long("learning-classifier")
                .value_name("NAME")
                .help("Classifier deciding whether a message is spam (MultinomialNB)")
                .value_parser(|s: &str| s.parse::<ClassifierKind>()),
        )
        .arg(
            Arg::new("learning-dataset-path")
                .long("learning-dataset-path")
                .value_name("PATH")
                .help("Path to the dataset file to learn from"),
        )
        .arg(
            Arg::new("learning-filter-path")
                .long("learning-filter-path")
                .value_name("PATH")
                .help("Path where the learned filter is stored"),
        )
        .arg(
            Arg::new("rabbitmq-connstring")
                .long("rabbitmq-connstring")
                .value_name("URI")
                .help("AMQP connection string"),
        )
        .arg(
            Arg::new("rabbitmq-queue-name")
                .long("rabbitmq-queue-name")
                .value_name("NAME")
                .help("Queue with messages to filter"),
        )
        .arg(
            Arg::new("filtering-batchsize")
                .long("filtering-batchsize")
                .value_name("N")
                .help("Number of messages classified together")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i64)),
        )
        .arg(
            Arg::new("alert-url")
                .long("alert-url")
                .value_name("URL")
                .help("Endpoint receiving spam alerts"),
        )
        .arg(
            Arg::new("alert-token")
                .long("alert-token")
                .value_name("TOKEN")
                .help("Token sent in the Authorization header of alerts"),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = matches
        .get_one::<String>("config")
        .cloned()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match Config::load(&config_path, overrides_from(&matches)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    let settings = match config.validate() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("save-config") {
        match config.to_file(&config_path) {
            Ok(()) => println!("Configuration written to: {config_path}"),
            Err(e) => {
                eprintln!("Error writing configuration file: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("learn") {
        let filter = match train_filter(&config) {
            Ok(filter) => filter,
            Err(e) => {
                log::error!("Learning failed: {e}");
                process::exit(1);
            }
        };
        if let Err(e) = filter.save(&config.learning.filter_path) {
            log::error!(
                "Failed to save filter to {}: {e}",
                config.learning.filter_path
            );
            process::exit(1);
        }
        println!("learning finished");
        return;
    }

    let filter = match obtain_filter(&config) {
        Ok(filter) => filter,
        Err(e) => {
            log::error!("No spam filter available: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = serve(settings, filter).await {
        log::error!("{e:#}");
        process::exit(1);
    }
}

fn overrides_from(matches: &ArgMatches) -> ConfigOverrides {
    ConfigOverrides {
        learning_dataset: matches.get_one::<DatasetKind>("learning-dataset").copied(),
        learning_vectorizer: matches
            .get_one::<VectorizerKind>("learning-vectorizer")
            .copied(),
        learning_classifier: matches
            .get_one::<ClassifierKind>("learning-classifier")
            .copied(),
        learning_dataset_path: matches.get_one::<String>("learning-dataset-path").cloned(),
        learning_filter_path: matches.get_one::<String>("learning-filter-path").cloned(),
        rabbitmq_connstring: matches.get_one::<String>("rabbitmq-connstring").cloned(),
        rabbitmq_queue_name: matches.get_one::<String>("rabbitmq-queue-name").cloned(),
        filtering_batchsize: matches.get_one::<i64>("filtering-batchsize").copied(),
        alert_url: matches.get_one::<String>("alert-url").cloned(),
        alert_token: matches.get_one::<String>("alert-token").cloned(),
    }
}

fn train_filter(config: &Config) -> Result<SpamFilter, LearnError> {
    let learning = &config.learning;
    log::info!(
        "Training {:?} + {:?} on {:?} dataset at {}",
        learning.vectorizer,
        learning.classifier,
        learning.dataset,
        learning.dataset_path
    );
    let dataset = Dataset::load(learning.dataset, &learning.dataset_path)?;
    let mut filter = SpamFilter::new(learning.vectorizer, learning.classifier);
    filter.learn(&dataset)?;
    Ok(filter)
}

/// Load the stored filter, falling back to training a fresh one.
fn obtain_filter(config: &Config) -> Result<SpamFilter, LearnError> {
    let path = &config.learning.filter_path;
    if Path::new(path).is_file() {
        match SpamFilter::load(path) {
            Ok(filter) => {
                log::info!("Loaded spam filter from {path}");
                return Ok(filter);
            }
            Err(e) => log::warn!("Problem loading filter from {path}: {e}; retraining"),
        }
    }
    train_filter(config)
}

async fn serve(settings: PipelineSettings, filter: SpamFilter) -> anyhow::Result<()> {
    let sink = HttpAlertSink::new(
        settings.alert_url,
        settings.alert_token,
        settings.alert_timeout,
    )?;
    log::info!("Alerts go to {}", sink.endpoint());

    let queue = AmqpQueue::connect(&settings.connstring, &settings.queue_name).await?;

    let consumer = Consumer::new(
        queue,
        Batcher::new(settings.batch_size),
        ClassificationGateway::new(Arc::new(filter)),
        sink,
    )
    .flush_on_shutdown(settings.flush_on_shutdown);

    let summary = consumer.run().await?;
    log::info!(
        "Processed {} message(s), {} spam, {} alert(s) delivered",
        summary.received,
        summary.spam_found,
        summary.alerts_delivered
    );
    Ok(())
}

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use promptcast::client::{Attribution, CompletionDispatcher, Transport, TransportConfig};
use promptcast::core::config;
use promptcast::core::{ConfigRegistry, EnvCredentials, TargetRegistry};
use promptcast::improve::{ImproverConfig, PromptImprover, StructuredReply};

#[derive(Parser)]
#[command(
    name = "promptcast",
    about = "Send one prompt to every configured model endpoint and compare the answers"
)]
struct Args {
    /// Prompt to send
    prompt: String,

    /// Run the prompt improver instead of a full dispatch round
    #[arg(long)]
    improve: bool,

    /// Path to an alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Request timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // File logger - writes to promptcast.log in the current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create("promptcast.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    log::info!("Promptcast starting up");

    let file_config = match config::load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let resolved = config::resolve(&file_config, args.timeout);

    let registry = Arc::new(ConfigRegistry::from_entries(&resolved.targets));
    let transport = Transport::new(TransportConfig {
        timeout: Duration::from_secs(resolved.timeout_secs),
        verify_tls: resolved.verify_tls,
        use_proxy: resolved.use_proxy,
        ..TransportConfig::default()
    });
    let attribution = Attribution {
        referrer: resolved.referrer.clone(),
        app_title: resolved.app_title.clone(),
    };
    let mut dispatcher = CompletionDispatcher::new(
        registry.clone(),
        Arc::new(EnvCredentials),
        transport,
        attribution,
    );

    if args.improve {
        let improver = PromptImprover::new(ImproverConfig {
            enabled: resolved.improver_enabled,
            target: resolved.improver_target.clone(),
        });
        return match improver.improve(&mut dispatcher, &args.prompt).await {
            Ok(reply) => {
                print_structured_reply(&reply);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    if registry.list_active().is_empty() {
        eprintln!("No active targets configured — add [[targets]] entries to the config file");
        return ExitCode::FAILURE;
    }

    let outcomes = dispatcher.dispatch(&args.prompt).await;
    let mut ok = 0usize;
    for outcome in &outcomes {
        println!("=== {} ===", outcome.target_name);
        if outcome.success {
            ok += 1;
            println!("{}\n", outcome.text);
        } else {
            let (kind, message) = outcome
                .error
                .as_ref()
                .map(|f| (f.kind.as_str(), f.message.as_str()))
                .unwrap_or(("unknown_error", "no details"));
            println!("error ({kind}): {message}\n");
        }
    }
    println!("{} succeeded, {} failed", ok, outcomes.len() - ok);

    if ok == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_structured_reply(reply: &StructuredReply) {
    println!("Improved:\n{}\n", reply.improved);
    if !reply.alternatives.is_empty() {
        println!("Alternatives:");
        for alternative in &reply.alternatives {
            println!("- {alternative}");
        }
        println!();
    }
    if !reply.adaptations.is_empty() {
        println!("Adaptations:");
        for (label, text) in [
            ("code", &reply.adaptations.code),
            ("analysis", &reply.adaptations.analysis),
            ("creative", &reply.adaptations.creative),
        ] {
            if !text.is_empty() {
                println!("- {label}: {text}");
            }
        }
    }
}

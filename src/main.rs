use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use sigcast::audit::LogAuditSink;
use sigcast::deployment::{Caller, DeploymentEngine, DeploymentRequest, TargetMode};
use sigcast::directory::InMemoryDirectory;
use sigcast::provider::{Credential, LoggingMailProvider};
use sigcast::resolution::{ContextOverrides, InMemoryRuleStore, TemplateResolutionService};
use sigcast::rules::EmailType;
use sigcast::store::InMemoryDeploymentStore;
use sigcast::templates::{InMemoryTemplateStore, PlaceholderRenderer};
use sigcast::Config;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let matches = Command::new("sigcast")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Centralized email signature deployment engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/sigcast.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and report rule lint warnings")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("resolve")
                .long("resolve")
                .help("Resolve which template applies for a sender context")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sender")
                .long("sender")
                .value_name("EMAIL")
                .help("Sender email for --resolve (must exist in the configured users)"),
        )
        .arg(
            Arg::new("email-type")
                .long("email-type")
                .value_name("TYPE")
                .help("Email type for --resolve: new or reply")
                .default_value("new"),
        )
        .arg(
            Arg::new("recipient")
                .long("recipient")
                .value_name("EMAIL")
                .help("Recipient address for --resolve (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("subject")
                .long("subject")
                .value_name("TEXT")
                .help("Subject line for --resolve"),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .help("Run a demo deployment over the configured users")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-rule evaluation traces")
                .action(ArgAction::SetTrue),
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

    if let Some(path) = matches.get_one::<String>("generate-config") {
        match Config::default().to_file(path) {
            Ok(()) => {
                println!("Default configuration written to {path}");
                return;
            }
            Err(e) => {
                eprintln!("Failed to write configuration: {e}");
                process::exit(1);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {config_path}: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        let warnings = config.validate();
        if warnings.is_empty() {
            println!("Configuration valid: {} rule(s), {} template(s), {} user(s)",
                config.rules.len(),
                config.templates.len(),
                config.users.len());
            return;
        }
        for warning in &warnings {
            eprintln!("warning: {warning}");
        }
        process::exit(1);
    }

    if matches.get_flag("resolve") {
        if let Err(e) = run_resolve(&config, &matches) {
            eprintln!("Resolution failed: {e}");
            process::exit(1);
        }
        return;
    }

    if matches.get_flag("demo") {
        if let Err(e) = run_demo(config).await {
            eprintln!("Demo deployment failed: {e}");
            process::exit(1);
        }
        return;
    }

    eprintln!("Nothing to do. Try --test-config, --resolve or --demo (see --help).");
    process::exit(1);
}

fn parse_email_type(value: &str) -> anyhow::Result<EmailType> {
    match value.to_lowercase().as_str() {
        "new" => Ok(EmailType::New),
        "reply" => Ok(EmailType::Reply),
        other => anyhow::bail!("unknown email type '{other}' (expected new or reply)"),
    }
}

fn run_resolve(config: &Config, matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let sender = matches
        .get_one::<String>("sender")
        .ok_or_else(|| anyhow::anyhow!("--resolve requires --sender"))?;
    let user = config
        .users
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(sender))
        .ok_or_else(|| anyhow::anyhow!("no configured user with email {sender}"))?
        .clone();

    let overrides = ContextOverrides {
        email_type: Some(parse_email_type(
            matches.get_one::<String>("email-type").unwrap(),
        )?),
        recipients: matches
            .get_many::<String>("recipient")
            .map(|values| values.cloned().collect()),
        cc_recipients: None,
        subject: matches.get_one::<String>("subject").cloned(),
        timestamp: None,
    };

    let service = TemplateResolutionService::new(
        Arc::new(InMemoryDirectory::new(
            vec![config.organization.clone()],
            config.users.clone(),
        )),
        Arc::new(InMemoryTemplateStore::new(config.templates.clone())),
        Arc::new(InMemoryRuleStore::new(config.rules.clone())),
    );

    let user_id = user.id.clone();
    let org_id = config.organization.id.clone();
    match service.resolve_for_user(&user_id, &org_id, &overrides)? {
        Some(template_id) => println!("Matched rule template: {template_id}"),
        None => match service.resolve_with_fallback(&user_id, &org_id, &overrides)? {
            Some(template_id) => println!("No rule matched; default template: {template_id}"),
            None => println!("No rule matched and no default template is configured"),
        },
    }
    Ok(())
}

async fn run_demo(config: Config) -> anyhow::Result<()> {
    let admin = config
        .users
        .first()
        .ok_or_else(|| anyhow::anyhow!("demo requires at least one configured user"))?;
    let caller = Caller {
        auth_id: admin.id.clone(),
        organization_id: config.organization.id.clone(),
        email: admin.email.clone(),
        display_name: admin.display_name.clone(),
    };
    let template = config
        .templates
        .iter()
        .find(|t| t.is_default)
        .or_else(|| config.templates.first())
        .ok_or_else(|| anyhow::anyhow!("demo requires at least one configured template"))?;

    let store = Arc::new(InMemoryDeploymentStore::new());
    let engine = DeploymentEngine::new(
        Arc::new(InMemoryDirectory::new(
            vec![config.organization.clone()],
            config.users.clone(),
        )),
        Arc::new(InMemoryTemplateStore::new(config.templates.clone())),
        Arc::new(InMemoryRuleStore::new(config.rules.clone())),
        Arc::new(PlaceholderRenderer),
        Arc::new(LoggingMailProvider),
        store.clone(),
        Arc::new(LogAuditSink),
        Credential {
            access_token: "demo-token".to_string(),
        },
        Duration::from_secs(config.provider_write_timeout_seconds),
    );

    let request = DeploymentRequest {
        template_id: template.id.clone(),
        target: TargetMode::All,
        use_rules: true,
        email_context: ContextOverrides {
            email_type: Some(EmailType::New),
            recipients: Some(vec!["client@external-example.org".to_string()]),
            ..Default::default()
        },
    };

    let summary = engine.start_deployment(&caller, request).await?;
    println!(
        "Deployment {}: {} succeeded, {} failed",
        summary.deployment_id, summary.success_count, summary.fail_count
    );
    for row in engine.history(&summary.deployment_id) {
        println!(
            "  {} -> {} ({:?}{})",
            row.user_id,
            row.template_id,
            row.status,
            row.error_message
                .as_deref()
                .map(|e| format!(": {e}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

//! Command-line front end: resolves the deploying identity and renders its
//! EKS administrator mapping.

mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use eks_deployer_access_resolver::{
    register_cluster_admins, resolve_cluster_admins, AuthorizationMapping, AwsAuthConfigMap,
    CallerIdentity, ConflictMode, DeploymentContext, IdentityProvider, ResolverConfig,
    SessionMatching, StaticIdentityProvider, StsIdentityProvider,
};
use log::debug;
use std::path::PathBuf;

/// Grant the identity deploying an EKS cluster durable administrator access.
#[derive(Parser)]
#[command(name = "eks-deployer-access")]
#[command(version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the caller to its role and print the mapping entries
    Resolve {
        #[command(flatten)]
        identity: IdentityArgs,

        #[command(flatten)]
        resolver: ResolverArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Register the caller into an aws-auth ConfigMap and print it
    Render {
        #[command(flatten)]
        identity: IdentityArgs,

        #[command(flatten)]
        resolver: ResolverArgs,

        /// Existing aws-auth ConfigMap (JSON) to merge into
        #[arg(long)]
        existing: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate the deployment context passed between stacks
    Context {
        /// JSON file with clusterName, vpcId, oidcIssuer and architecture
        #[arg(long, conflicts_with_all = ["cluster_name", "vpc_id", "oidc_issuer"])]
        file: Option<PathBuf>,

        /// EKS cluster name
        #[arg(long, env = "EKS_CLUSTER_NAME")]
        cluster_name: Option<String>,

        /// VPC id
        #[arg(long, env = "VPC_ID")]
        vpc_id: Option<String>,

        /// OIDC issuer URL of the cluster
        #[arg(long, env = "EKS_OIDC_URL")]
        oidc_issuer: Option<String>,

        /// Worker node architecture (x86 or arm)
        #[arg(long, env = "ARCHITECTURE", default_value = "x86")]
        architecture: String,

        /// Account owning the OIDC provider, for the provider ARN
        #[arg(long, env = "CDK_DEFAULT_ACCOUNT")]
        account_id: Option<String>,

        /// Partition for the provider ARN
        #[arg(long, default_value = "aws")]
        partition: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Args)]
struct IdentityArgs {
    /// Use this caller ARN instead of calling STS
    #[arg(long, requires = "account_id")]
    caller_arn: Option<String>,

    /// Account of --caller-arn
    #[arg(long, requires = "caller_arn")]
    account_id: Option<String>,

    /// AWS region for the STS call
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// AWS profile for the STS call
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,
}

impl IdentityArgs {
    async fn provider(self) -> Box<dyn IdentityProvider> {
        match (self.caller_arn, self.account_id) {
            (Some(arn), Some(account_id)) => {
                debug!("Using caller identity from the command line");
                Box::new(StaticIdentityProvider::new(CallerIdentity::new(
                    arn, account_id,
                )))
            }
            _ => Box::new(StsIdentityProvider::from_env(self.region, self.profile).await),
        }
    }
}

#[derive(Args)]
struct ResolverArgs {
    /// How the assumed-role session form is written
    #[arg(long, default_value_t = SessionMatching::Wildcard)]
    session_matching: SessionMatching,

    /// Fail instead of overwriting a principal mapped to different groups
    #[arg(long)]
    reject_conflicts: bool,
}

impl ResolverArgs {
    fn config(&self) -> ResolverConfig {
        ResolverConfig {
            session_matching: self.session_matching,
            conflict_mode: if self.reject_conflicts {
                ConflictMode::Reject
            } else {
                ConflictMode::Overwrite
            },
            ..ResolverConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli.command).await {
        output::error(&e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Resolve {
            identity,
            resolver,
            pretty,
        } => {
            let provider = identity.provider().await;
            let grant = resolve_cluster_admins(provider.as_ref(), &resolver.config())
                .await
                .context("Failed to resolve cluster administrator principal")?;
            output::note(&format!(
                "granting {} and its sessions",
                grant.forms.role_arn
            ));
            output::print_json(&grant, pretty)
        }
        Commands::Render {
            identity,
            resolver,
            existing,
            pretty,
        } => {
            let config = resolver.config();
            let mut config_map = match existing {
                Some(path) => {
                    let json = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    AwsAuthConfigMap::parse(&json)
                        .with_context(|| format!("Invalid ConfigMap in {}", path.display()))?
                }
                None => AwsAuthConfigMap::default(),
            };
            let mut mapping = AuthorizationMapping::from_config_map(&config_map, config.conflict_mode)
                .context("Failed to load existing role mappings")?;

            let provider = identity.provider().await;
            let grant = register_cluster_admins(provider.as_ref(), &mut mapping, &config)
                .await
                .context("Failed to register cluster administrator principal")?;
            if let Some(outcome) = grant.registration {
                output::print_registration(&outcome);
            }

            mapping.write_config_map(&mut config_map)?;
            let json = config_map.to_json(pretty)?;
            output::print_document(&json);
            Ok(())
        }
        Commands::Context {
            file,
            cluster_name,
            vpc_id,
            oidc_issuer,
            architecture,
            account_id,
            partition,
            pretty,
        } => {
            let context = match file {
                Some(path) => DeploymentContext::load(&path)
                    .await
                    .with_context(|| format!("Invalid deployment context in {}", path.display()))?,
                None => {
                    let mut context = DeploymentContext::new(
                        cluster_name.context("--cluster-name or --file is required")?,
                    );
                    context.vpc_id = vpc_id;
                    context.oidc_issuer = oidc_issuer;
                    context.architecture = architecture.parse()?;
                    context.validated()?
                }
            };
            let provider_arn = account_id
                .as_deref()
                .and_then(|account| context.oidc_provider_arn(&partition, account));
            output::print_context(&context, provider_arn, pretty)
        }
    }
}

use anyhow::{Context, Result};
use eks_deployer_access_resolver::{DeploymentContext, RegistrationOutcome};
use log::debug;
use serde::Serialize;
use std::io::{self, Write};

pub(crate) fn note(msg: &str) {
    let _ = writeln!(io::stderr(), "eks-deployer-access: {}", msg);
}

pub(crate) fn error(err: &anyhow::Error) {
    let _ = writeln!(io::stderr(), "eks-deployer-access: {:#}", err);
}

pub(crate) fn print_registration(outcome: &RegistrationOutcome) {
    let _ = writeln!(
        io::stderr(),
        "Registered aws-auth entries: {} added, {} already present, {} replaced",
        outcome.inserted,
        outcome.unchanged,
        outcome.overwritten
    );
}

/// Write a rendered document to stdout
pub(crate) fn print_document(json: &str) {
    println!("{}", json);
}

/// Output any serializable value as JSON to stdout
pub(crate) fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    debug!("Formatting output as JSON (pretty: {})", pretty);

    let json_output = if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize output to pretty JSON")?
    } else {
        serde_json::to_string(value).context("Failed to serialize output to JSON")?
    };

    print_document(&json_output);
    Ok(())
}

/// Validated context plus the values derived from it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextOutput<'a> {
    #[serde(flatten)]
    context: &'a DeploymentContext,
    node_ami_type: &'static str,
    node_instance_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc_provider_arn: Option<String>,
}

pub(crate) fn print_context(
    context: &DeploymentContext,
    oidc_provider_arn: Option<String>,
    pretty: bool,
) -> Result<()> {
    print_json(
        &ContextOutput {
            context,
            node_ami_type: context.architecture.ami_type(),
            node_instance_type: context.architecture.default_instance_type(),
            oidc_provider_arn,
        },
        pretty,
    )
}

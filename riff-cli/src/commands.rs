use crate::cli::{Args, Command, Create, ResourceAction};
use anyhow::Context as _;
use riff::{
    applier::{self, Applier, Strategy},
    doctor::{self, KubeReviewer, RenderOptions},
    logs, race,
    resources::{self, RiffKind},
    wait,
};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// Error that was already reported to the user
#[derive(Debug)]
pub(crate) struct SilentError;

impl std::fmt::Display for SilentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("already reported")
    }
}

impl std::error::Error for SilentError {}

pub(crate) async fn run(args: Args, cancel: CancellationToken) -> anyhow::Result<ExitCode> {
    if let Some((kind, ResourceAction::Create(create))) = args.command.resource() {
        if create.dry_run {
            return print_manifest(kind, create).await;
        }
    }

    let client = riff::connect().await?;
    let ns = args
        .namespace
        .clone()
        .unwrap_or_else(|| client.default_namespace().to_string());

    match (&args.command, args.command.resource()) {
        (_, Some((kind, action))) => {
            run_resource(&client, &ns, kind, action, cancel).await?;
            Ok(ExitCode::SUCCESS)
        }
        (Command::Doctor(opts), None) => {
            let render = RenderOptions {
                color: !args.no_color,
            };
            run_doctor(client, &ns, opts.crds, render).await
        }
        (_, None) => anyhow::bail!("command does not address a resource kind"),
    }
}

async fn print_manifest(kind: RiffKind, create: &Create) -> anyhow::Result<ExitCode> {
    let obj = read_manifest(kind, create).await?;
    println!("{}", applier::render(&obj)?);
    Ok(ExitCode::SUCCESS)
}

async fn read_manifest(kind: RiffKind, create: &Create) -> anyhow::Result<kube::api::DynamicObject> {
    let manifest = tokio::fs::read_to_string(&create.file)
        .await
        .with_context(|| format!("failed to read {}", create.file.display()))?;
    applier::parse_manifest(kind, &manifest)
}

#[tracing::instrument(skip(client, render))]
async fn run_doctor(
    client: kube::Client,
    ns: &str,
    crds_only: bool,
    render: RenderOptions,
) -> anyhow::Result<ExitCode> {
    let reviewer = KubeReviewer::new(client);
    let checks = doctor::default_checks(ns);
    let healthy = if crds_only {
        let summary = doctor::compute_crd_summary(&reviewer, &checks).await?;
        println!("{}", render.crd_table(&summary));
        print!("{}", render.verdict(summary.is_healthy()));
        summary.is_healthy()
    } else {
        let diagnosis = doctor::diagnose(&reviewer, &doctor::REQUIRED_NAMESPACES, &checks).await?;
        print!("{}", render.diagnosis(&diagnosis));
        diagnosis.is_healthy()
    };
    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_resource(
    client: &kube::Client,
    ns: &str,
    kind: RiffKind,
    action: &ResourceAction,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    match action {
        ResourceAction::List { all_namespaces } => {
            let scope = if *all_namespaces { None } else { Some(ns) };
            let items = resources::list(client, kind, scope).await?;
            if items.is_empty() {
                println!("No {} found.", kind.plural());
            } else {
                println!("{}", resources::table(&items, *all_namespaces));
            }
        }
        ResourceAction::Create(create) => create_resource(client, ns, kind, create, cancel).await?,
        ResourceAction::Status(named) => {
            let obj = resources::api(client, kind, Some(ns))
                .get(&named.name)
                .await
                .with_context(|| format!("{} {} not found", kind, named.name))?;
            println!("{}", resources::table(&[obj], false));
        }
        ResourceAction::Tail(named) => {
            let selector = kind.pod_selector(&named.name);
            logs::tail(client, ns, &selector, tokio::io::stdout(), cancel).await?;
        }
        ResourceAction::Delete(named) => {
            riff::delete::delete(client, kind, ns, &named.name).await?;
            println!("Deleted {} \"{}\"", kind, named.name);
        }
    }
    Ok(())
}

async fn create_resource(
    client: &kube::Client,
    ns: &str,
    kind: RiffKind,
    create: &Create,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let obj = read_manifest(kind, create).await?;
    let strategy = match &create.field_manager {
        Some(field_manager) => Strategy::Apply {
            field_manager: field_manager.clone(),
        },
        None => Strategy::Create,
    };
    let created = Applier::new(client.clone(), ns, strategy).apply(kind, obj).await?;
    let name = kube::ResourceExt::name_any(&created);
    let ns = kube::ResourceExt::namespace(&created).unwrap_or_else(|| ns.to_string());
    println!("Created {} \"{}\"", kind, name);
    if !create.tail {
        return Ok(());
    }

    println!("Waiting for {} \"{}\" to become ready:", kind, name);
    let selector = kind.pod_selector(&name);
    let (name_ref, ns_ref, selector_ref) = (name.as_str(), ns.as_str(), selector.as_str());
    let res = race::run(
        &cancel,
        create.wait_timeout,
        move |token| wait::wait_ready(client, kind, ns_ref, name_ref, token),
        move |token| logs::tail(client, ns_ref, selector_ref, tokio::io::stdout(), token),
    )
    .await;
    match res {
        Ok(()) => {
            println!("{} \"{}\" is ready", kind, name);
            Ok(())
        }
        Err(err) if err.is_timeout() => {
            eprintln!("{} waiting for {} \"{}\" to become ready", err, kind, name);
            eprintln!(
                "To view status run: riff {} status {} --namespace {}",
                kind, name, ns
            );
            eprintln!(
                "To continue watching logs run: riff {} tail {} --namespace {}",
                kind, name, ns
            );
            Err(SilentError.into())
        }
        Err(err) => Err(err.into()),
    }
}
